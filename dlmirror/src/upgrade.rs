//! In-place upgrade of a mirror tree to the current layout generation.
//!
//! Generation 1.1 adds, per platform:
//!
//! - `update/infov2.json`: every update version directory, sorted.
//! - `infov2.json` next to each scope manifest: archives in numeric order
//!   with their size, MD5 and SHA-256.
//! - `package/{V}/microdl/`: every micro package entry extracted, with the
//!   digests of each entry in `microdl/info.json`.
//! - `package/{V}/db/`: the decrypted databases of that version.
//!
//! `generation.json` is written last, so an interrupted upgrade is simply
//! run again.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive_index::{normalize_entry, read_files};
use crate::crypt::DecryptProvider;
use crate::error::{MirrorError, MirrorResult};
use crate::layout::{MirrorLayout, PackageType, Platform};
use crate::manifest::{PackageIdList, ScopeManifest, VersionIndex};
use crate::storage::{read_json_opt, write_atomic, write_json_atomic};
use crate::sync::checksum::{md5_hex, sha256_hex};
use crate::version::{GameVersion, Generation, VersionParsePolicy};

/// Size and digests of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub size: u64,
    pub md5: String,
    pub sha256: String,
}

impl FileDigest {
    pub fn of(data: &[u8]) -> Self {
        Self {
            size: data.len() as u64,
            md5: md5_hex(data),
            sha256: sha256_hex(data),
        }
    }
}

/// One entry of a hashed scope manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedArchive {
    pub name: String,
    /// Size recorded in the scope manifest.
    pub size: u64,
    pub md5: String,
    pub sha256: String,
}

/// What an upgrade run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Generation found before the run.
    pub from: Generation,
    /// `false` when the tree was already current and nothing was written.
    pub upgraded: bool,
    /// Platforms whose directory existed.
    pub platforms: Vec<Platform>,
    pub hashed_scopes: usize,
    pub extracted_entries: usize,
    pub databases: usize,
}

/// Rewrites a mirror tree into the current generation.
pub struct Upgrader<'a> {
    layout: &'a MirrorLayout,
    decrypter: Option<&'a dyn DecryptProvider>,
    policy: VersionParsePolicy,
    force: bool,
}

impl<'a> Upgrader<'a> {
    /// `decrypter` is only needed when the tree holds databases.
    pub fn new(layout: &'a MirrorLayout, decrypter: Option<&'a dyn DecryptProvider>) -> Self {
        Self {
            layout,
            decrypter,
            policy: VersionParsePolicy::default(),
            force: false,
        }
    }

    pub fn with_version_policy(mut self, policy: VersionParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Regenerate even when the tree is already current.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Generation recorded in the tree.
    pub fn current_generation(layout: &MirrorLayout) -> MirrorResult<Generation> {
        Ok(read_json_opt(&layout.generation_file())?.unwrap_or_default())
    }

    pub fn run(&self) -> MirrorResult<UpgradeReport> {
        let from = Self::current_generation(self.layout)?;
        if from > Generation::CURRENT {
            return Err(MirrorError::GenerationTooNew {
                found: from,
                supported: Generation::CURRENT,
            });
        }

        let mut report = UpgradeReport {
            from,
            upgraded: false,
            platforms: Vec::new(),
            hashed_scopes: 0,
            extracted_entries: 0,
            databases: 0,
        };
        if from == Generation::CURRENT && !self.force {
            tracing::info!(generation = %from, "Mirror layout is up to date");
            return Ok(report);
        }

        for platform in Platform::ALL {
            if !self.layout.platform_dir(platform).is_dir() {
                tracing::debug!(%platform, "No platform directory, skipping");
                continue;
            }
            self.upgrade_platform(platform, &mut report)?;
            report.platforms.push(platform);
        }

        write_json_atomic(&self.layout.generation_file(), &Generation::CURRENT)?;
        report.upgraded = true;
        tracing::info!(from = %from, to = %Generation::CURRENT, "Mirror layout upgraded");
        Ok(report)
    }

    fn upgrade_platform(&self, platform: Platform, report: &mut UpgradeReport) -> MirrorResult<()> {
        let versions = self.layout.scan_update_versions(platform, self.policy)?;
        let names: Vec<String> = versions.iter().map(ToString::to_string).collect();
        write_json_atomic(&self.layout.sorted_update_index(platform), &names)?;
        tracing::info!(%platform, versions = names.len(), "Sorted update index written");

        let mut updates = Vec::new();
        for (version, name) in versions.into_iter().zip(&names) {
            let dir = self.layout.update_version_dir(platform, name);
            if let Some(archives) = write_hashed_manifest(&dir)? {
                report.hashed_scopes += 1;
                updates.push((version, archives));
            }
        }

        let packages =
            VersionIndex::load(&self.layout.package_index(platform))?.versions(self.policy)?;
        for version in packages {
            self.upgrade_package_version(platform, version, &updates, report)?;
        }
        Ok(())
    }

    fn upgrade_package_version(
        &self,
        platform: Platform,
        version: GameVersion,
        updates: &[(GameVersion, Vec<PathBuf>)],
        report: &mut UpgradeReport,
    ) -> MirrorResult<()> {
        let name = version.to_string();
        tracing::info!(%platform, version = name.as_str(), "Upgrading package version");

        // Later archives replace databases of the same name.
        let mut databases = BTreeMap::new();
        for (_, archives) in updates.iter().filter(|(update, _)| *update <= version) {
            for archive in archives {
                collect_databases(archive, &mut databases)?;
            }
        }

        let mut micro_scopes = Vec::new();
        for ty in PackageType::ALL {
            let ids = PackageIdList::load(&self.layout.package_id_list(platform, &name, ty))?;
            for &id in ids.ids() {
                let dir = self.layout.package_id_dir(platform, &name, ty, id);
                let Some(archives) = write_hashed_manifest(&dir)? else {
                    continue;
                };
                report.hashed_scopes += 1;
                match ty {
                    PackageType::Bootstrap => {
                        for archive in &archives {
                            collect_databases(archive, &mut databases)?;
                        }
                    }
                    PackageType::Micro => micro_scopes.push(archives),
                    _ => {}
                }
            }
        }

        report.extracted_entries +=
            extract_micro_entries(&self.layout.microdl_dir(platform, &name), &micro_scopes)?;

        if databases.is_empty() {
            return Ok(());
        }
        let decrypter = self.decrypter.ok_or(MirrorError::NoDecryptProvider)?;
        let dir = self.layout.database_dir(platform, &name);
        for (basename, data) in &databases {
            tracing::debug!(database = basename.as_str(), "Writing decrypted database");
            let plain = decrypter.decrypt(basename, data)?;
            write_atomic(&dir.join(basename), &plain)?;
            report.databases += 1;
        }
        Ok(())
    }
}

/// Hash the archives of a synced scope and write its `infov2.json`.
///
/// Returns the archive paths in numeric order, or `None` for a scope that
/// was never fully synced.
fn write_hashed_manifest(dir: &Path) -> MirrorResult<Option<Vec<PathBuf>>> {
    let manifest_path = MirrorLayout::manifest_in(dir);
    if !ScopeManifest::exists(&manifest_path) {
        tracing::debug!(scope = %dir.display(), "Scope not synced, skipping");
        return Ok(None);
    }
    let manifest = ScopeManifest::load(&manifest_path)?;
    let mut entries = manifest.entries().to_vec();
    entries.sort_by(|(a, _), (b, _)| archive_order(a).cmp(&archive_order(b)));

    let mut hashed = Vec::with_capacity(entries.len());
    let mut archives = Vec::with_capacity(entries.len());
    for (name, size) in entries {
        let path = dir.join(&name);
        let data = fs::read(&path).map_err(|e| MirrorError::io(&path, e))?;
        let digest = FileDigest::of(&data);
        hashed.push(HashedArchive {
            name,
            size,
            md5: digest.md5,
            sha256: digest.sha256,
        });
        archives.push(path);
    }

    write_json_atomic(&MirrorLayout::hashed_manifest_in(dir), &hashed)?;
    tracing::debug!(scope = %dir.display(), archives = hashed.len(), "Hashed manifest written");
    Ok(Some(archives))
}

/// `2.zip` sorts before `10.zip`.
fn archive_order(name: &str) -> (u64, &str) {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    let number = name[..digits].parse().unwrap_or(u64::MAX);
    (number, name)
}

/// `db/unit.db_` -> `unit.db_`.
fn database_basename(entry: &str) -> Option<&str> {
    if entry.starts_with("db/") && entry.ends_with(".db_") {
        entry.rsplit('/').next()
    } else {
        None
    }
}

fn collect_databases(archive: &Path, databases: &mut BTreeMap<String, Vec<u8>>) -> MirrorResult<()> {
    for (entry, data) in read_files(archive, |name| database_basename(name).is_some())? {
        if let Some(basename) = database_basename(&entry) {
            tracing::debug!(archive = %archive.display(), database = basename, "Database found");
            databases.insert(basename.to_string(), data);
        }
    }
    Ok(())
}

/// Extract every micro package entry into `dest` and write the digest table.
///
/// Scopes are walked from the highest package id down and archives from the
/// last one back, so the first copy of an entry seen is the newest one.
fn extract_micro_entries(dest: &Path, scopes: &[Vec<PathBuf>]) -> MirrorResult<usize> {
    let mut digests: BTreeMap<String, FileDigest> = BTreeMap::new();
    for archive in scopes.iter().rev().flat_map(|archives| archives.iter().rev()) {
        let files = read_files(archive, |name| {
            !digests.contains_key(name.trim_start_matches('/'))
        })?;
        for (entry, data) in files {
            let entry = normalize_entry(&entry)?;
            if digests.contains_key(&entry) {
                continue;
            }
            write_atomic(&dest.join(&entry), &data)?;
            digests.insert(entry, FileDigest::of(&data));
        }
    }

    write_json_atomic(&dest.join(crate::layout::INFO_FILE), &digests)?;
    tracing::info!(dest = %dest.display(), entries = digests.len(), "Micro download entries extracted");
    Ok(digests.len())
}
