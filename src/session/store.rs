// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Credential Store
//!
//! Persists at most one session credential per `(app_id, smart_wallet)`.
//!
//! ## Storage Layout
//!
//! ```text
//! {profile}/sessions/
//!   session_store_key                  # random 32-byte key, hex
//!   session:{app_id}:{wallet}          # StoredSession JSON
//!   session_index:{wallet}             # ["app-a", "app-b"]
//! ```
//!
//! The ephemeral private key is sealed with AES-256-GCM under the profile's
//! random store key before it is written. Window and permission metadata stay
//! in the clear so expiry can be checked without decrypting.
//!
//! Expired records are deleted when read (lazy GC). Records whose window has
//! not opened yet are kept but not returned by [`SessionStore::find_all`].

use std::collections::BTreeSet;

use alloy::primitives::{Address, Bytes, FixedBytes};
use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::permissions;
use crate::error::{WalletError, WalletResult};
use crate::storage::{ScopedStore, StorageError};
use crate::vault::crypto::{self, IV_LEN, KEY_LEN};
use crate::vault::hd;

/// Upper bound on `valid_until - valid_after`, in seconds (30 days).
pub const MAX_SESSION_SECS: i64 = 30 * 24 * 60 * 60;

const STORE_KEY: &str = "session_store_key";

/// An ephemeral signing credential registered for one smart wallet.
#[derive(Clone)]
pub struct SessionCredential {
    pub signer: PrivateKeySigner,
    pub signer_address: Address,
    pub smart_wallet: Address,
    pub permissions: u32,
    pub valid_after: i64,
    pub valid_until: i64,
    pub app_id: String,
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("signer", &"<redacted>")
            .field("signer_address", &self.signer_address)
            .field("smart_wallet", &self.smart_wallet)
            .field("permissions", &self.permissions)
            .field("valid_after", &self.valid_after)
            .field("valid_until", &self.valid_until)
            .field("app_id", &self.app_id)
            .finish()
    }
}

impl SessionCredential {
    pub fn new(
        signer: PrivateKeySigner,
        smart_wallet: Address,
        permissions: u32,
        valid_after: i64,
        valid_until: i64,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            signer_address: signer.address(),
            signer,
            smart_wallet,
            permissions,
            valid_after,
            valid_until,
            app_id: app_id.into(),
        }
    }

    /// Check the invariants the session registry enforces on-chain.
    pub fn validate(&self) -> WalletResult<()> {
        if self.valid_until <= self.valid_after {
            return Err(WalletError::validation(
                "session validUntil must be after validAfter",
            ));
        }
        if self.valid_until - self.valid_after > MAX_SESSION_SECS {
            return Err(WalletError::validation(format!(
                "session span exceeds {MAX_SESSION_SECS} seconds"
            )));
        }
        if !permissions::is_valid_mask(self.permissions) {
            return Err(WalletError::validation(format!(
                "permission mask {:#x} out of range",
                self.permissions
            )));
        }
        if self.signer.address() != self.signer_address {
            return Err(WalletError::validation("session signer address mismatch"));
        }
        if self.app_id.is_empty() || self.app_id.contains(':') {
            return Err(WalletError::validation("app id must be non-empty and contain no ':'"));
        }
        Ok(())
    }

    /// `now ∈ [valid_after, valid_until]`.
    pub fn is_active_at(&self, now: i64) -> bool {
        self.valid_after <= now && now <= self.valid_until
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.valid_until
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedKey {
    ciphertext: Bytes,
    iv: FixedBytes<IV_LEN>,
}

/// On-disk form of a [`SessionCredential`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    app_id: String,
    smart_wallet: Address,
    signer_address: Address,
    permissions: u32,
    valid_after: i64,
    valid_until: i64,
    sealed_key: SealedKey,
}

fn session_key(app_id: &str, wallet: Address) -> String {
    format!("session:{app_id}:{wallet:#x}")
}

fn index_key(wallet: Address) -> String {
    format!("session_index:{wallet:#x}")
}

/// Session persistence over one profile namespace.
#[derive(Clone)]
pub struct SessionStore {
    store: ScopedStore,
}

impl SessionStore {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Load the profile store key, generating it on first use.
    fn store_key(&self) -> WalletResult<Zeroizing<[u8; KEY_LEN]>> {
        if let Some(raw) = self.store.get(STORE_KEY)? {
            let bytes = Zeroizing::new(alloy::hex::decode(raw.trim()).map_err(|e| {
                StorageError::Corrupted(format!("session store key: {e}"))
            })?);
            let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                StorageError::Corrupted("session store key has wrong length".to_string())
            })?;
            return Ok(Zeroizing::new(key));
        }

        let key = Zeroizing::new(crypto::random_bytes::<KEY_LEN>());
        let encoded = Zeroizing::new(alloy::hex::encode(key.as_slice()));
        self.store.set(STORE_KEY, &encoded)?;
        debug!("Session store key generated");
        Ok(key)
    }

    /// Persist `credential`, replacing any previous one for the same pair.
    pub fn save(&self, credential: &SessionCredential) -> WalletResult<()> {
        credential.validate()?;

        let key = self.store_key()?;
        let iv = crypto::random_bytes::<IV_LEN>();
        let plaintext = hd::signer_key_bytes(&credential.signer);
        let ciphertext = crypto::seal(&key, &iv, plaintext.as_slice())?;

        let stored = StoredSession {
            app_id: credential.app_id.clone(),
            smart_wallet: credential.smart_wallet,
            signer_address: credential.signer_address,
            permissions: credential.permissions,
            valid_after: credential.valid_after,
            valid_until: credential.valid_until,
            sealed_key: SealedKey {
                ciphertext: ciphertext.into(),
                iv: FixedBytes::from(iv),
            },
        };
        self.store.set_json(
            &session_key(&credential.app_id, credential.smart_wallet),
            &stored,
        )?;

        let mut apps = self.index(credential.smart_wallet)?;
        if apps.insert(credential.app_id.clone()) {
            self.write_index(credential.smart_wallet, &apps)?;
        }
        Ok(())
    }

    /// Load the credential for `(app_id, wallet)`.
    ///
    /// An expired or unreadable record is deleted and reported as absent.
    pub fn load(&self, app_id: &str, wallet: Address, now: i64) -> WalletResult<Option<SessionCredential>> {
        let key = session_key(app_id, wallet);
        let stored: Option<StoredSession> = match self.store.get_json(&key) {
            Ok(stored) => stored,
            Err(StorageError::Json(e)) => {
                warn!(app_id, wallet = %wallet, error = %e, "Dropping unreadable session record");
                self.remove(app_id, wallet)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let Some(stored) = stored else {
            return Ok(None);
        };

        if now > stored.valid_until {
            debug!(app_id, wallet = %wallet, "Removing expired session");
            self.remove(app_id, wallet)?;
            return Ok(None);
        }

        match self.unseal(stored) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(app_id, wallet = %wallet, error = %e, "Dropping undecryptable session record");
                self.remove(app_id, wallet)?;
                Ok(None)
            }
        }
    }

    fn unseal(&self, stored: StoredSession) -> WalletResult<SessionCredential> {
        let key = self.store_key()?;
        let plaintext = crypto::open(&key, &stored.sealed_key.iv.0, &stored.sealed_key.ciphertext)?;
        let signer = hd::signer_from_bytes(&plaintext)?;

        let credential = SessionCredential {
            signer,
            signer_address: stored.signer_address,
            smart_wallet: stored.smart_wallet,
            permissions: stored.permissions,
            valid_after: stored.valid_after,
            valid_until: stored.valid_until,
            app_id: stored.app_id,
        };
        credential.validate()?;
        Ok(credential)
    }

    /// Delete the credential for `(app_id, wallet)`. Absent is not an error.
    pub fn remove(&self, app_id: &str, wallet: Address) -> WalletResult<()> {
        self.store.remove(&session_key(app_id, wallet))?;

        let mut apps = self.index(wallet)?;
        if apps.remove(app_id) {
            self.write_index(wallet, &apps)?;
        }
        Ok(())
    }

    /// Every currently valid credential, from any app, for `wallet`.
    pub fn find_all(&self, wallet: Address, now: i64) -> WalletResult<Vec<SessionCredential>> {
        let mut found = Vec::new();
        for app_id in self.index(wallet)? {
            if let Some(credential) = self.load(&app_id, wallet, now)? {
                if credential.is_active_at(now) {
                    found.push(credential);
                }
            }
        }
        Ok(found)
    }

    fn index(&self, wallet: Address) -> WalletResult<BTreeSet<String>> {
        match self.store.get_json(&index_key(wallet)) {
            Ok(apps) => Ok(apps.unwrap_or_default()),
            Err(StorageError::Json(e)) => {
                warn!(wallet = %wallet, error = %e, "Rebuilding unreadable session index");
                Ok(self.scan_index(wallet)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rebuild the app set for `wallet` from the record keys.
    fn scan_index(&self, wallet: Address) -> WalletResult<BTreeSet<String>> {
        let suffix = format!(":{wallet:#x}");
        let apps = self
            .store
            .keys()?
            .into_iter()
            .filter_map(|k| {
                k.strip_prefix("session:")
                    .and_then(|rest| rest.strip_suffix(&suffix))
                    .map(str::to_string)
            })
            .collect();
        self.write_index(wallet, &apps)?;
        Ok(apps)
    }

    fn write_index(&self, wallet: Address, apps: &BTreeSet<String>) -> WalletResult<()> {
        let key = index_key(wallet);
        if apps.is_empty() {
            self.store.remove(&key)?;
        } else {
            self.store.set_json(&key, apps)?;
        }
        Ok(())
    }
}
