// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path utilities for the on-disk profile layout.

use std::path::{Path, PathBuf};

/// Default base directory for wallet profiles.
pub const DATA_ROOT: &str = "./relational-data";

/// Extension used for every stored value.
pub const VALUE_EXTENSION: &str = "json";

/// Longest key a file-backed store accepts. Hex encoding doubles it and the
/// temp-file suffix adds 37 bytes, which keeps names under the common
/// 255-byte filename limit.
pub const MAX_KEY_BYTES: usize = 105;

/// Storage path utilities for [`super::FileStore`].
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all stored data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    ///
    /// Keys are hex-encoded so that `:` and `/` inside keys never leak into
    /// the filesystem hierarchy.
    pub fn value_file(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{VALUE_EXTENSION}", alloy::hex::encode(key.as_bytes())))
    }

    /// Recover the key from a value file stem.
    pub fn key_from_stem(stem: &str) -> Option<String> {
        let bytes = alloy::hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_file_round_trips_key() {
        let paths = StoragePaths::new("/tmp/profile");
        let key = "default/sessions/session:app:0xabc";
        let file = paths.value_file(key);

        assert_eq!(file.parent(), Some(Path::new("/tmp/profile")));
        assert_eq!(file.extension().and_then(|e| e.to_str()), Some("json"));

        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap();
        assert_eq!(StoragePaths::key_from_stem(stem).as_deref(), Some(key));
    }

    #[test]
    fn garbage_stem_is_rejected() {
        assert_eq!(StoragePaths::key_from_stem("zz-not-hex"), None);
    }
}
