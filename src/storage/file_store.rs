// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem-backed key-value store.
//!
//! One file per key under the profile root. Writes go to a uniquely named
//! temp file first and are renamed into place, so a crash mid-write leaves
//! either the old value or the new one.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use super::{KeyValueStore, StorageError, StoragePaths, StorageResult};
use super::paths::{MAX_KEY_BYTES, VALUE_EXTENSION};

#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StoragePaths,
}

impl FileStore {
    /// Open a store rooted at `paths`, creating the directory if needed.
    pub fn open(paths: StoragePaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.root())?;
        Ok(Self { paths })
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    fn check_key(key: &str) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        if key.len() > MAX_KEY_BYTES {
            return Err(StorageError::InvalidKey(format!(
                "key longer than {MAX_KEY_BYTES} bytes"
            )));
        }
        Ok(())
    }

    fn write_file(path: &Path, value: &str) -> StorageResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(value.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Self::check_key(key)?;
        let mut file = match File::open(self.paths.value_file(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        Ok(Some(data))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        Self::check_key(key)?;
        let path = self.paths.value_file(key);

        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let result = Self::write_file(&temp_path, value)
            .and_then(|()| fs::rename(&temp_path, &path).map_err(StorageError::from));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Self::check_key(key)?;
        match fs::remove_file(self.paths.value_file(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(self.paths.root())? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(StoragePaths::key_from_stem)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(StoragePaths::new(dir.path())).expect("open store");
        (dir, store)
    }

    #[test]
    fn write_and_read_value() {
        let (_dir, store) = test_store();
        store.set("default/vault/vault", "{\"v\":1}").unwrap();
        assert_eq!(
            store.get("default/vault/vault").unwrap().as_deref(),
            Some("{\"v\":1}")
        );
    }

    #[test]
    fn overwrite_replaces_value_and_leaves_no_temp_files() {
        let (dir, store) = test_store();
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn keys_lists_every_stored_key() {
        let (_dir, store) = test_store();
        for key in ["p/sessions/session:a:0x1", "p/sessions/session:b:0x1", "p/vault/vault"] {
            store.set(key, "x").unwrap();
        }
        let keys = store.keys().unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&"p/sessions/session:a:0x1".to_string()));
    }

    #[test]
    fn missing_key_reads_as_none_and_removes_cleanly() {
        let (_dir, store) = test_store();
        assert_eq!(store.get("absent").unwrap(), None);
        store.remove("absent").unwrap();
    }

    #[test]
    fn empty_key_is_rejected() {
        let (_dir, store) = test_store();
        assert!(matches!(store.set("", "x"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn overlong_key_is_rejected() {
        let (_dir, store) = test_store();
        let key = "k".repeat(MAX_KEY_BYTES + 1);
        assert!(matches!(store.set(&key, "x"), Err(StorageError::InvalidKey(_))));
        store.set(&"k".repeat(MAX_KEY_BYTES), "x").unwrap();
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let (dir, store) = test_store();
        // A non-empty directory where the value file belongs blocks the rename
        let blocked = store.paths().value_file("blocked");
        fs::create_dir_all(blocked.join("inner")).unwrap();

        assert!(matches!(store.set("blocked", "x"), Err(StorageError::Io(_))));
        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(StoragePaths::new(dir.path())).unwrap();
            store.set("persist", "yes").unwrap();
        }
        let store = FileStore::open(StoragePaths::new(dir.path())).unwrap();
        assert_eq!(store.get("persist").unwrap().as_deref(), Some("yes"));
    }
}
