//! On-disk layout of a mirror tree.
//!
//! ```text
//! root/{iOS,Android}/update/info.json                   version index
//! root/{iOS,Android}/update/{V}/info.json               scope manifest
//! root/{iOS,Android}/update/{V}/{n}.zip
//! root/{iOS,Android}/update.ticket.json                 pending update ticket
//! root/{iOS,Android}/package/info.json                  version index
//! root/{iOS,Android}/package/package_{type}.ticket.json pending batch ticket
//! root/{iOS,Android}/package/{V}/{type}/info.json       package id list
//! root/{iOS,Android}/package/{V}/{type}/{id}/info.json  scope manifest
//! root/{iOS,Android}/package/{V}/{type}/{id}/{n}.zip
//! root/{iOS,Android}/package/{V}/microdl_map.json       archive index
//! root/release_info.json
//! ```
//!
//! `dlmirror upgrade` adds the hashed generation of the tree:
//!
//! ```text
//! root/generation.json                                  layout generation
//! root/{iOS,Android}/update/infov2.json                 sorted version list
//! root/{iOS,Android}/.../infov2.json                    hashed scope manifest
//! root/{iOS,Android}/package/{V}/microdl/               extracted micro entries
//! root/{iOS,Android}/package/{V}/microdl/info.json      entry digests
//! root/{iOS,Android}/package/{V}/db/{name}.db_          decrypted databases
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MirrorError, MirrorResult};
use crate::manifest::VersionIndex;
use crate::version::{GameVersion, VersionParsePolicy};

/// Name of manifest, version index and package id list files.
pub const INFO_FILE: &str = "info.json";

/// Name of the archive index file inside a package version directory.
pub const ARCHIVE_INDEX_FILE: &str = "microdl_map.json";

/// Name of the release key file at the mirror root.
pub const RELEASE_INFO_FILE: &str = "release_info.json";

/// Name of the process lock sentinel at the mirror root.
pub const LOCK_FILE: &str = "inprogress.lock";

/// Name of the hashed manifest and sorted version list files.
pub const HASHED_INFO_FILE: &str = "infov2.json";

/// Name of the layout generation file at the mirror root.
pub const GENERATION_FILE: &str = "generation.json";

/// Client platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Ios,
    Android,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Ios, Platform::Android];

    /// Numeric id used by the DLAPI protocol.
    pub fn api_id(&self) -> u8 {
        match self {
            Platform::Ios => 1,
            Platform::Android => 2,
        }
    }

    /// Directory name under the mirror root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Android => "Android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Platform {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ios" | "1" => Ok(Platform::Ios),
            "android" | "2" => Ok(Platform::Android),
            _ => Err(MirrorError::InvalidConfig(format!("unknown platform '{}'", s))),
        }
    }
}

/// Content category of a package batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageType {
    Bootstrap,
    Live,
    Scenario,
    Subscenario,
    Micro,
    EventScenario,
    MultiUnitScenario,
}

impl PackageType {
    pub const ALL: [PackageType; 7] = [
        PackageType::Bootstrap,
        PackageType::Live,
        PackageType::Scenario,
        PackageType::Subscenario,
        PackageType::Micro,
        PackageType::EventScenario,
        PackageType::MultiUnitScenario,
    ];

    /// Numeric id used by the DLAPI protocol and as the directory name.
    pub fn id(&self) -> u8 {
        match self {
            PackageType::Bootstrap => 0,
            PackageType::Live => 1,
            PackageType::Scenario => 2,
            PackageType::Subscenario => 3,
            PackageType::Micro => 4,
            PackageType::EventScenario => 5,
            PackageType::MultiUnitScenario => 6,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageType::Bootstrap => "bootstrap",
            PackageType::Live => "live",
            PackageType::Scenario => "scenario",
            PackageType::Subscenario => "subscenario",
            PackageType::Micro => "micro",
            PackageType::EventScenario => "event scenario",
            PackageType::MultiUnitScenario => "multi-unit scenario",
        };
        f.write_str(name)
    }
}

/// Path arithmetic for a mirror tree rooted at one directory.
#[derive(Debug, Clone)]
pub struct MirrorLayout {
    root: PathBuf,
}

impl MirrorLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn platform_dir(&self, platform: Platform) -> PathBuf {
        self.root.join(platform.dir_name())
    }

    pub fn update_dir(&self, platform: Platform) -> PathBuf {
        self.platform_dir(platform).join("update")
    }

    pub fn update_index(&self, platform: Platform) -> PathBuf {
        self.update_dir(platform).join(INFO_FILE)
    }

    pub fn update_version_dir(&self, platform: Platform, version: &str) -> PathBuf {
        self.update_dir(platform).join(version)
    }

    pub fn update_ticket(&self, platform: Platform) -> PathBuf {
        self.platform_dir(platform).join("update.ticket.json")
    }

    pub fn package_dir(&self, platform: Platform) -> PathBuf {
        self.platform_dir(platform).join("package")
    }

    pub fn package_index(&self, platform: Platform) -> PathBuf {
        self.package_dir(platform).join(INFO_FILE)
    }

    pub fn package_version_dir(&self, platform: Platform, version: &str) -> PathBuf {
        self.package_dir(platform).join(version)
    }

    pub fn package_type_dir(&self, platform: Platform, version: &str, ty: PackageType) -> PathBuf {
        self.package_version_dir(platform, version)
            .join(ty.id().to_string())
    }

    /// Package id list of one package type.
    pub fn package_id_list(&self, platform: Platform, version: &str, ty: PackageType) -> PathBuf {
        self.package_type_dir(platform, version, ty).join(INFO_FILE)
    }

    pub fn package_id_dir(
        &self,
        platform: Platform,
        version: &str,
        ty: PackageType,
        package_id: u32,
    ) -> PathBuf {
        self.package_type_dir(platform, version, ty)
            .join(package_id.to_string())
    }

    pub fn batch_ticket(&self, platform: Platform, ty: PackageType) -> PathBuf {
        self.package_dir(platform)
            .join(format!("package_{}.ticket.json", ty.id()))
    }

    pub fn archive_index(&self, platform: Platform, version: &str) -> PathBuf {
        self.package_version_dir(platform, version)
            .join(ARCHIVE_INDEX_FILE)
    }

    pub fn release_info(&self) -> PathBuf {
        self.root.join(RELEASE_INFO_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn generation_file(&self) -> PathBuf {
        self.root.join(GENERATION_FILE)
    }

    /// Sorted list of every update version directory.
    pub fn sorted_update_index(&self, platform: Platform) -> PathBuf {
        self.update_dir(platform).join(HASHED_INFO_FILE)
    }

    /// Extracted micro download entries of one version.
    pub fn microdl_dir(&self, platform: Platform, version: &str) -> PathBuf {
        self.package_version_dir(platform, version).join("microdl")
    }

    /// Decrypted databases of one version.
    pub fn database_dir(&self, platform: Platform, version: &str) -> PathBuf {
        self.package_version_dir(platform, version).join("db")
    }

    /// Manifest path inside a scope directory.
    pub fn manifest_in(scope_dir: &Path) -> PathBuf {
        scope_dir.join(INFO_FILE)
    }

    /// Hashed manifest path inside a scope directory.
    pub fn hashed_manifest_in(scope_dir: &Path) -> PathBuf {
        scope_dir.join(HASHED_INFO_FILE)
    }

    /// Numbered archive path inside a scope directory (`1.zip`, `2.zip`, ...).
    pub fn archive_in(scope_dir: &Path, index: usize) -> PathBuf {
        scope_dir.join(archive_name(index))
    }

    /// Express a path under the root as a `/` separated relative string.
    pub fn relative(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Latest fully mirrored package version of one platform.
    pub fn latest_platform_version(
        &self,
        platform: Platform,
        policy: VersionParsePolicy,
    ) -> MirrorResult<Option<GameVersion>> {
        let index = VersionIndex::load(&self.package_index(platform))?;
        Ok(index.versions(policy)?.last().copied())
    }

    /// Latest fully mirrored version across the given platforms.
    ///
    /// Platforms that have never been mirrored are ignored. When both iOS and
    /// Android have a version they must agree.
    pub fn latest_synced_version(
        &self,
        platforms: &[Platform],
        policy: VersionParsePolicy,
    ) -> MirrorResult<Option<GameVersion>> {
        let mut ios = None;
        let mut android = None;
        for &platform in platforms {
            let latest = self.latest_platform_version(platform, policy)?;
            match platform {
                Platform::Ios => ios = latest,
                Platform::Android => android = latest,
            }
        }

        match (ios, android) {
            (Some(ios), Some(android)) if ios != android => {
                Err(MirrorError::VersionDiscrepancy { ios, android })
            }
            (Some(v), _) | (None, Some(v)) => Ok(Some(v)),
            (None, None) => Ok(None),
        }
    }

    /// Versions that have an update directory on disk, sorted ascending.
    pub fn scan_update_versions(
        &self,
        platform: Platform,
        policy: VersionParsePolicy,
    ) -> MirrorResult<Vec<GameVersion>> {
        let dir = self.update_dir(platform);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| MirrorError::io(&dir, e))? {
            let entry = entry.map_err(|e| MirrorError::io(&dir, e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        policy.parse_all(names.iter().map(String::as_str))
    }
}

/// File name of the `index`-th (1-based) archive in a scope.
pub fn archive_name(index: usize) -> String {
    format!("{}.zip", index)
}
