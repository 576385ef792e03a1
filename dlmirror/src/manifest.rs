//! Manifests and indexes stored in the mirror tree.
//!
//! - [`ScopeManifest`]: `filename -> size` map whose presence marks a scope
//!   (one update version or one package id) as fully synced.
//! - [`VersionIndex`]: append-only list of fully mirrored versions.
//! - [`PackageIdList`]: sorted package ids known for one package type.

use std::fmt;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MirrorResult;
use crate::storage::{read_json, read_json_opt, write_json_atomic};
use crate::version::{GameVersion, VersionParsePolicy};

/// Completion marker and file index of one scope.
///
/// Entries keep the order the server returned the links in, which is also
/// the order the archives must be applied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeManifest {
    entries: Vec<(String, u64)>,
}

impl ScopeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filename: impl Into<String>, size: u64) {
        self.entries.push((filename.into(), size));
    }

    pub fn entries(&self) -> &[(String, u64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|(_, size)| size).sum()
    }

    /// Whether a scope directory has been fully synced.
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    pub fn load(path: &Path) -> MirrorResult<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> MirrorResult<()> {
        write_json_atomic(path, self)
    }
}

impl Serialize for ScopeManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, size) in &self.entries {
            map.serialize_entry(name, size)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScopeManifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ManifestVisitor;

        impl<'de> Visitor<'de> for ManifestVisitor {
            type Value = ScopeManifest;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of file names to sizes")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut manifest = ScopeManifest::new();
                while let Some((name, size)) = access.next_entry::<String, u64>()? {
                    manifest.push(name, size);
                }
                Ok(manifest)
            }
        }

        deserializer.deserialize_map(ManifestVisitor)
    }
}

/// Ordered list of fully mirrored versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionIndex {
    versions: Vec<String>,
}

impl VersionIndex {
    /// Load an index, treating a missing file as empty.
    pub fn load(path: &Path) -> MirrorResult<Self> {
        Ok(read_json_opt(path)?.unwrap_or_default())
    }

    pub fn contains(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v == version)
    }

    /// Append a version, returning `false` when it was already present.
    pub fn append(&mut self, version: impl Into<String>) -> bool {
        let version = version.into();
        if self.contains(&version) {
            return false;
        }
        self.versions.push(version);
        true
    }

    pub fn raw(&self) -> &[String] {
        &self.versions
    }

    /// Parsed versions, sorted ascending.
    pub fn versions(&self, policy: VersionParsePolicy) -> MirrorResult<Vec<GameVersion>> {
        policy.parse_all(self.versions.iter().map(String::as_str))
    }

    pub fn save(&self, path: &Path) -> MirrorResult<()> {
        write_json_atomic(path, self)
    }

    /// Append `version` to the index at `path` when absent.
    pub fn append_to(path: &Path, version: &str) -> MirrorResult<bool> {
        let mut index = Self::load(path)?;
        if !index.append(version) {
            return Ok(false);
        }
        index.save(path)?;
        Ok(true)
    }
}

/// Sorted, deduplicated package ids of one package type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageIdList {
    ids: Vec<u32>,
}

impl PackageIdList {
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut ids: Vec<u32> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    pub fn load(path: &Path) -> MirrorResult<Self> {
        Ok(read_json_opt::<Vec<u32>>(path)?
            .map(Self::from_ids)
            .unwrap_or_default())
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Union with another id set.
    pub fn merged(&self, other: impl IntoIterator<Item = u32>) -> Self {
        Self::from_ids(self.ids.iter().copied().chain(other))
    }

    pub fn save(&self, path: &Path) -> MirrorResult<()> {
        write_json_atomic(path, self)
    }
}
