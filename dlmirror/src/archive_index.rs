//! Entry to archive lookup table for micro downloads.
//!
//! `microdl_map.json` maps every entry name found in the package type 4
//! archives of a version to the archive holding it, so a single asset can
//! be served without shipping the whole batch. Paths are relative to the
//! mirror root and `/` separated.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{MirrorError, MirrorResult};
use crate::layout::{MirrorLayout, PackageType, Platform};
use crate::manifest::{PackageIdList, ScopeManifest};
use crate::storage::{read_json, write_json_atomic};

/// Flat `entry -> archive` table of one platform version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveIndex {
    entries: BTreeMap<String, String>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entry` as found in `archive`. A later insert of the same
    /// entry replaces the earlier one.
    pub fn insert(&mut self, entry: impl Into<String>, archive: impl Into<String>) {
        self.entries.insert(entry.into(), archive.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive path (relative to the mirror root) holding `entry`.
    pub fn archive_for(&self, entry: &str) -> Option<&str> {
        self.entries.get(entry).map(String::as_str)
    }

    pub fn load(path: &Path) -> MirrorResult<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> MirrorResult<()> {
        write_json_atomic(path, self)
    }

    /// Read one entry out of the archive that holds it.
    pub fn extract(&self, root: &Path, entry: &str) -> MirrorResult<Vec<u8>> {
        let entry = normalize_entry(entry)?;
        let relative = self
            .archive_for(&entry)
            .ok_or_else(|| MirrorError::EntryNotFound(entry.clone()))?;
        let archive_path = resolve(root, relative)?;
        read_entry(&archive_path, &entry)
    }
}

/// Strip a leading `/` and reject names that climb out of the archive.
pub fn normalize_entry(name: &str) -> MirrorResult<String> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.split(&['/', '\\'][..]).any(|segment| segment == "..") {
        return Err(MirrorError::InvalidEntry(name.to_string()));
    }
    Ok(trimmed.to_string())
}

fn resolve(root: &Path, relative: &str) -> MirrorResult<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(MirrorError::InvalidEntry(relative.to_string()));
        }
        path.push(segment);
    }
    Ok(path)
}

fn open_archive(path: &Path) -> MirrorResult<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| MirrorError::io(path, e))?;
    ZipArchive::new(file).map_err(|e| archive_error(path, e))
}

fn archive_error(path: &Path, e: ZipError) -> MirrorError {
    MirrorError::Archive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Read one named entry of a zip archive.
pub(crate) fn read_entry(archive_path: &Path, entry: &str) -> MirrorResult<Vec<u8>> {
    let mut archive = open_archive(archive_path)?;
    let mut file = match archive.by_name(entry) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Err(MirrorError::EntryNotFound(entry.to_string())),
        Err(e) => return Err(archive_error(archive_path, e)),
    };
    let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
    file.read_to_end(&mut data)
        .map_err(|e| MirrorError::io(archive_path, e))?;
    Ok(data)
}

/// Entry names of a zip archive in central directory order.
pub(crate) fn entry_names(archive_path: &Path) -> MirrorResult<Vec<String>> {
    let archive = open_archive(archive_path)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Contents of the file entries of a zip archive whose name passes
/// `wanted`, in central directory order. Other entries are not decompressed.
pub(crate) fn read_files(
    archive_path: &Path,
    wanted: impl Fn(&str) -> bool,
) -> MirrorResult<Vec<(String, Vec<u8>)>> {
    let mut archive = open_archive(archive_path)?;
    let mut files = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| archive_error(archive_path, e))?;
        if file.is_dir() || !wanted(file.name()) {
            continue;
        }
        let name = file.name().to_string();
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data)
            .map_err(|e| MirrorError::io(archive_path, e))?;
        files.push((name, data));
    }
    Ok(files)
}

/// Scan every micro package archive of `version` and persist the index.
///
/// A version without micro packages gets an empty index.
pub fn build_archive_index(
    layout: &MirrorLayout,
    platform: Platform,
    version: &str,
) -> MirrorResult<ArchiveIndex> {
    let ids = PackageIdList::load(&layout.package_id_list(platform, version, PackageType::Micro))?;

    let mut index = ArchiveIndex::new();
    for &id in ids.ids() {
        let dir = layout.package_id_dir(platform, version, PackageType::Micro, id);
        let manifest = ScopeManifest::load(&MirrorLayout::manifest_in(&dir))?;
        for n in 1..=manifest.len() {
            let archive = MirrorLayout::archive_in(&dir, n);
            tracing::debug!(archive = %archive.display(), "Scanning archive");
            let relative = layout.relative(&archive);
            for name in entry_names(&archive)? {
                index.insert(name, relative.clone());
            }
        }
    }

    let path = layout.archive_index(platform, version);
    index.save(&path)?;
    tracing::info!(
        %platform,
        version,
        entries = index.len(),
        packages = ids.ids().len(),
        "Archive index written"
    );
    Ok(index)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    /// Write a zip archive holding `entries`.
    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Zip archive bytes holding `entries`.
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let temp = tempfile::NamedTempFile::new().unwrap();
        write_zip(temp.path(), entries);
        fs::read(temp.path()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::write_zip;
    use super::*;
    use tempfile::TempDir;

    fn micro_package(layout: &MirrorLayout, id: u32, archives: &[&[(&str, &[u8])]]) {
        let dir = layout.package_id_dir(Platform::Ios, "59.4", PackageType::Micro, id);
        let mut manifest = ScopeManifest::new();
        for (i, entries) in archives.iter().enumerate() {
            write_zip(&MirrorLayout::archive_in(&dir, i + 1), entries);
            manifest.push(crate::layout::archive_name(i + 1), 1);
        }
        manifest.save(&MirrorLayout::manifest_in(&dir)).unwrap();
    }

    #[test]
    fn test_duplicate_entry_maps_to_one_archive() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        micro_package(&layout, 1, &[&[("assets/a.png", b"png")]]);
        micro_package(&layout, 2, &[&[("assets/a.png", b"png"), ("assets/b.png", b"b")]]);
        PackageIdList::from_ids([1, 2])
            .save(&layout.package_id_list(Platform::Ios, "59.4", PackageType::Micro))
            .unwrap();

        let index = build_archive_index(&layout, Platform::Ios, "59.4").unwrap();
        assert_eq!(index.len(), 2);
        let holder = index.archive_for("assets/a.png").unwrap();
        assert!(
            holder == "iOS/package/59.4/4/1/1.zip" || holder == "iOS/package/59.4/4/2/1.zip",
            "unexpected holder {holder}"
        );

        let stored = ArchiveIndex::load(&layout.archive_index(Platform::Ios, "59.4")).unwrap();
        assert_eq!(stored, index);
    }

    #[test]
    fn test_every_numbered_archive_is_scanned() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        micro_package(
            &layout,
            7,
            &[&[("one.txt", b"1")], &[("two.txt", b"2")], &[("three.txt", b"3")]],
        );
        PackageIdList::from_ids([7])
            .save(&layout.package_id_list(Platform::Ios, "59.4", PackageType::Micro))
            .unwrap();

        let index = build_archive_index(&layout, Platform::Ios, "59.4").unwrap();
        assert_eq!(index.archive_for("three.txt"), Some("iOS/package/59.4/4/7/3.zip"));
    }

    #[test]
    fn test_no_micro_packages_gives_empty_index() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());

        let index = build_archive_index(&layout, Platform::Ios, "59.4").unwrap();
        assert!(index.is_empty());
        assert!(layout.archive_index(Platform::Ios, "59.4").is_file());
    }

    #[test]
    fn test_extract_entry() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        micro_package(&layout, 3, &[&[("assets/a.png", b"hello")]]);
        PackageIdList::from_ids([3])
            .save(&layout.package_id_list(Platform::Ios, "59.4", PackageType::Micro))
            .unwrap();
        let index = build_archive_index(&layout, Platform::Ios, "59.4").unwrap();

        assert_eq!(index.extract(temp.path(), "/assets/a.png").unwrap(), b"hello");
        assert!(matches!(
            index.extract(temp.path(), "assets/missing.png"),
            Err(MirrorError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_normalize_entry_rejects_traversal() {
        assert_eq!(normalize_entry("/a/b.png").unwrap(), "a/b.png");
        for bad in ["", "/", "../x", "a/../../x", "a\\..\\x"] {
            assert!(
                matches!(normalize_entry(bad), Err(MirrorError::InvalidEntry(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_read_files_filters_by_name() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("1.zip");
        write_zip(
            &archive,
            &[("db/unit.db_", b"u"), ("assets/a.png", b"a"), ("db/live.db_", b"l")],
        );

        let files = read_files(&archive, |name| name.starts_with("db/")).unwrap();
        assert_eq!(
            files,
            vec![
                ("db/unit.db_".to_string(), b"u".to_vec()),
                ("db/live.db_".to_string(), b"l".to_vec()),
            ]
        );
    }

    #[test]
    fn test_corrupt_archive_is_reported() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        let dir = layout.package_id_dir(Platform::Ios, "59.4", PackageType::Micro, 1);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("1.zip"), b"not a zip").unwrap();
        let mut manifest = ScopeManifest::new();
        manifest.push("1.zip", 9);
        manifest.save(&dir.join("info.json")).unwrap();
        PackageIdList::from_ids([1])
            .save(&layout.package_id_list(Platform::Ios, "59.4", PackageType::Micro))
            .unwrap();

        assert!(matches!(
            build_archive_index(&layout, Platform::Ios, "59.4"),
            Err(MirrorError::Archive { .. })
        ));
    }
}
