//! Crash-safe file helpers.
//!
//! Every file the mirror produces is written to a temporary file in the
//! destination directory and renamed into place, so a killed process never
//! leaves a truncated ticket, manifest or archive behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{MirrorError, MirrorResult};

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> MirrorResult<T> {
    let data = fs::read(path).map_err(|e| MirrorError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|source| MirrorError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a JSON file, returning `None` when it does not exist.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> MirrorResult<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Serialize `value` as JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> MirrorResult<()> {
    let data = serde_json::to_vec(value).map_err(|source| MirrorError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &data)
}

/// Atomically replace `path` with `data`, creating parent directories.
pub fn write_atomic(path: &Path, data: &[u8]) -> MirrorResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let tmp = NamedTempFile::new_in(parent).map_err(|e| MirrorError::io(parent, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        writer
            .write_all(data)
            .and_then(|_| writer.flush())
            .map_err(|e| MirrorError::io(tmp.path(), e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| MirrorError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| MirrorError::io(path, e.error))?;
    Ok(())
}

/// Create a directory and all of its parents.
pub fn ensure_dir(path: &Path) -> MirrorResult<()> {
    fs::create_dir_all(path).map_err(|e| MirrorError::io(path, e))
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> MirrorResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MirrorError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/info.json");

        write_json_atomic(&path, &vec!["59.3", "59.4"]).unwrap();

        let back: Vec<String> = read_json(&path).unwrap();
        assert_eq!(back, vec!["59.3", "59.4"]);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("info.json");

        write_json_atomic(&path, &vec![1, 2]).unwrap();
        write_json_atomic(&path, &vec![3]).unwrap();

        let back: Vec<u32> = read_json(&path).unwrap();
        assert_eq!(back, vec![3]);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        write_atomic(&temp.path().join("1.zip"), b"payload").unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("1.zip")]);
    }

    #[test]
    fn test_read_json_opt_missing() {
        let temp = TempDir::new().unwrap();
        let value: Option<Vec<u32>> = read_json_opt(&temp.path().join("missing.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_read_json_invalid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, b"{not json").unwrap();

        let result: MirrorResult<Vec<u32>> = read_json(&path);
        assert!(matches!(result, Err(MirrorError::Json { .. })));
    }

    #[test]
    fn test_remove_file_if_exists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ticket.json");
        fs::write(&path, b"{}").unwrap();

        remove_file_if_exists(&path).unwrap();
        assert!(!path.exists());
        remove_file_if_exists(&path).unwrap();
    }
}
