// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Scoped Key-Value Storage
//!
//! Persistence for the vault document and session credentials. Everything
//! goes through the [`KeyValueStore`] trait so the same code runs against
//! an on-disk profile directory or an in-memory map.
//!
//! ## Security Model
//!
//! The store itself is **not** encrypted. Only the vault secrets (mnemonic,
//! account keys) and session private keys are encrypted before they reach
//! this layer. Metadata (addresses, names, expiry windows) is stored in the
//! clear.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   {profile}/
//!     vault/          # KeyVault document
//!     sessions/       # session:{app}:{wallet}, session_index:{wallet}
//! ```

pub mod file_store;
pub mod memory;
pub mod paths;

use std::io;
use std::sync::Arc;

pub use file_store::FileStore;
pub use memory::MemoryStore;
pub use paths::StoragePaths;

/// Error type for key-value storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations
    Io(io::Error),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// Key is not a valid storage key
    InvalidKey(String),
    /// Stored record could not be interpreted
    Corrupted(String),
    /// Backing lock was poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Json(e) => write!(f, "JSON error: {e}"),
            StorageError::InvalidKey(key) => write!(f, "Invalid storage key: {key}"),
            StorageError::Corrupted(msg) => write!(f, "Corrupted record: {msg}"),
            StorageError::Poisoned => write!(f, "Storage lock poisoned"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// String-keyed store of string values.
///
/// Implementations must make `set` atomic per key: a reader sees either the
/// previous value or the new one, never a torn write.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// View of a [`KeyValueStore`] restricted to one namespace.
///
/// Keys are transparently prefixed with `{namespace}/`; `keys()` returns the
/// unprefixed names of entries inside the namespace only.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            inner,
            prefix: format!("{namespace}/"),
        }
    }

    /// Nested namespace, e.g. `profile/sessions`.
    pub fn scope(&self, namespace: &str) -> Self {
        Self {
            inner: self.inner.clone(),
            prefix: format!("{}{namespace}/", self.prefix),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(&self.full_key(key))
    }

    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.inner.set(&self.full_key(key), value)
    }

    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.inner.remove(&self.full_key(key))
    }

    pub fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .inner
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    /// Read a JSON value.
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write a JSON value.
    pub fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_keys_are_isolated() {
        let backing: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let alice = ScopedStore::new(backing.clone(), "alice");
        let bob = ScopedStore::new(backing.clone(), "bob");

        alice.set("vault", "a").unwrap();
        bob.set("vault", "b").unwrap();

        assert_eq!(alice.get("vault").unwrap().as_deref(), Some("a"));
        assert_eq!(bob.get("vault").unwrap().as_deref(), Some("b"));
        assert_eq!(alice.keys().unwrap(), vec!["vault".to_string()]);
        assert_eq!(backing.keys().unwrap().len(), 2);
    }

    #[test]
    fn nested_scope_prefixes_both_levels() {
        let backing: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let sessions = ScopedStore::new(backing.clone(), "default").scope("sessions");
        sessions.set("k", "v").unwrap();

        assert_eq!(
            backing.get("default/sessions/k").unwrap().as_deref(),
            Some("v")
        );
    }

    #[test]
    fn json_helpers_round_trip_and_report_corruption() {
        let backing: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let scope = ScopedStore::new(backing, "p");

        scope.set_json("n", &vec![1u32, 2, 3]).unwrap();
        let n: Option<Vec<u32>> = scope.get_json("n").unwrap();
        assert_eq!(n, Some(vec![1, 2, 3]));

        scope.set("bad", "{not json").unwrap();
        let bad: StorageResult<Option<Vec<u32>>> = scope.get_json("bad");
        assert!(matches!(bad, Err(StorageError::Json(_))));

        let missing: Option<Vec<u32>> = scope.get_json("missing").unwrap();
        assert!(missing.is_none());
    }
}
