//! Lookup and decryption of `db/<name>.db_` files in mirrored archives.

use std::path::PathBuf;

use super::DecryptProvider;
use crate::archive_index::{entry_names, read_entry};
use crate::error::{MirrorError, MirrorResult};
use crate::layout::{MirrorLayout, PackageType, Platform};
use crate::manifest::ScopeManifest;
use crate::version::{GameVersion, VersionParsePolicy};

/// Finds a database in the archives of one version and decrypts it.
///
/// Search order: the bootstrap package (type 0, id 0) of the version, then
/// the update archives of the same major version. Within each group the
/// newest archive wins.
pub struct DatabaseExtractor<'a> {
    layout: &'a MirrorLayout,
    decrypter: &'a dyn DecryptProvider,
    policy: VersionParsePolicy,
}

impl<'a> DatabaseExtractor<'a> {
    pub fn new(layout: &'a MirrorLayout, decrypter: &'a dyn DecryptProvider) -> Self {
        Self {
            layout,
            decrypter,
            policy: VersionParsePolicy::default(),
        }
    }

    pub fn with_version_policy(mut self, policy: VersionParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decrypted content of database `name` (without extension).
    pub fn extract(
        &self,
        platform: Platform,
        version: GameVersion,
        name: &str,
    ) -> MirrorResult<Vec<u8>> {
        if name.is_empty() || name.contains(&['/', '\\'][..]) {
            return Err(MirrorError::InvalidEntry(name.to_string()));
        }
        let wanted = format!("db/{}.db_", name);

        for archive in self.candidate_archives(platform, version)? {
            let found = entry_names(&archive)?
                .into_iter()
                .find(|entry| database_name(entry) == Some(name));
            if let Some(entry) = found {
                tracing::info!(archive = %archive.display(), entry = entry.as_str(), "Database found");
                let data = read_entry(&archive, &entry)?;
                let basename = entry.rsplit('/').next().unwrap_or(&entry);
                return self.decrypter.decrypt(basename, &data);
            }
        }
        Err(MirrorError::EntryNotFound(wanted))
    }

    /// Archives to search, most preferred first.
    fn candidate_archives(
        &self,
        platform: Platform,
        version: GameVersion,
    ) -> MirrorResult<Vec<PathBuf>> {
        let mut archives = Vec::new();

        let bootstrap =
            self.layout
                .package_id_dir(platform, &version.to_string(), PackageType::Bootstrap, 0);
        push_newest_first(&mut archives, bootstrap)?;

        let mut updates: Vec<GameVersion> = self
            .layout
            .scan_update_versions(platform, self.policy)?
            .into_iter()
            .filter(|v| *v > GameVersion::new(version.major, 0) && *v <= version)
            .collect();
        updates.sort_by(|a, b| b.cmp(a));
        for update in updates {
            let dir = self
                .layout
                .update_version_dir(platform, &update.to_string());
            push_newest_first(&mut archives, dir)?;
        }

        Ok(archives)
    }
}

/// Archives of a synced scope, last one first. Unsynced scopes add nothing.
fn push_newest_first(archives: &mut Vec<PathBuf>, dir: PathBuf) -> MirrorResult<()> {
    let manifest_path = MirrorLayout::manifest_in(&dir);
    if !ScopeManifest::exists(&manifest_path) {
        return Ok(());
    }
    let manifest = ScopeManifest::load(&manifest_path)?;
    for n in (1..=manifest.len()).rev() {
        archives.push(MirrorLayout::archive_in(&dir, n));
    }
    Ok(())
}

/// `db/unit.db_` -> `unit`.
fn database_name(entry: &str) -> Option<&str> {
    entry.strip_prefix("db/")?.strip_suffix(".db_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive_index::fixtures::write_zip;
    use crate::crypt::testing::ReverseDecrypter;
    use std::path::Path;
    use tempfile::TempDir;

    fn synced_scope(dir: &Path, archives: &[&[(&str, &[u8])]]) {
        let mut manifest = ScopeManifest::new();
        for (i, entries) in archives.iter().enumerate() {
            write_zip(&MirrorLayout::archive_in(dir, i + 1), entries);
            manifest.push(crate::layout::archive_name(i + 1), 1);
        }
        manifest.save(&MirrorLayout::manifest_in(dir)).unwrap();
    }

    #[test]
    fn test_database_name() {
        assert_eq!(database_name("db/unit.db_"), Some("unit"));
        assert_eq!(database_name("db/unit.db"), None);
        assert_eq!(database_name("assets/db/unit.db_"), None);
    }

    #[test]
    fn test_bootstrap_newest_archive_wins() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        let dir = layout.package_id_dir(Platform::Ios, "59.4", PackageType::Bootstrap, 0);
        synced_scope(&dir, &[&[("db/unit.db_", b"old")], &[("db/unit.db_", b"new")]]);

        let decrypter = ReverseDecrypter { available: true };
        let extractor = DatabaseExtractor::new(&layout, &decrypter);
        let data = extractor
            .extract(Platform::Ios, GameVersion::new(59, 4), "unit")
            .unwrap();
        assert_eq!(data, b"wen");
    }

    #[test]
    fn test_falls_back_to_update_archives_of_same_major() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        synced_scope(
            &layout.update_version_dir(Platform::Android, "58.9"),
            &[&[("db/live.db_", b"other major")]],
        );
        synced_scope(
            &layout.update_version_dir(Platform::Android, "59.1"),
            &[&[("db/live.db_", b"older")]],
        );
        synced_scope(
            &layout.update_version_dir(Platform::Android, "59.3"),
            &[&[("db/live.db_", b"newest")], &[("assets/x.png", b"x")]],
        );
        synced_scope(
            &layout.update_version_dir(Platform::Android, "59.9"),
            &[&[("db/live.db_", b"future")]],
        );

        let decrypter = ReverseDecrypter { available: true };
        let extractor = DatabaseExtractor::new(&layout, &decrypter);
        let data = extractor
            .extract(Platform::Android, GameVersion::new(59, 4), "live")
            .unwrap();
        assert_eq!(data, b"tsewen");
    }

    #[test]
    fn test_major_base_update_is_not_searched() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        synced_scope(
            &layout.update_version_dir(Platform::Ios, "59.0"),
            &[&[("db/event.db_", b"base")]],
        );
        synced_scope(
            &layout.update_version_dir(Platform::Ios, "59.2"),
            &[&[("db/unit.db_", b"tinu")]],
        );

        let decrypter = ReverseDecrypter { available: true };
        let extractor = DatabaseExtractor::new(&layout, &decrypter);
        assert!(matches!(
            extractor.extract(Platform::Ios, GameVersion::new(59, 2), "event"),
            Err(MirrorError::EntryNotFound(_))
        ));
        assert_eq!(
            extractor
                .extract(Platform::Ios, GameVersion::new(59, 2), "unit")
                .unwrap(),
            b"unit"
        );
    }

    #[test]
    fn test_missing_database() {
        let temp = TempDir::new().unwrap();
        let layout = MirrorLayout::new(temp.path());
        let decrypter = ReverseDecrypter { available: true };
        let extractor = DatabaseExtractor::new(&layout, &decrypter);

        match extractor.extract(Platform::Ios, GameVersion::new(59, 4), "unit") {
            Err(MirrorError::EntryNotFound(entry)) => assert_eq!(entry, "db/unit.db_"),
            other => panic!("Expected EntryNotFound, got {:?}", other),
        }
        assert!(matches!(
            extractor.extract(Platform::Ios, GameVersion::new(59, 4), "../unit"),
            Err(MirrorError::InvalidEntry(_))
        ));
    }
}
