// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault document persistence.
//!
//! ## Storage Layout
//!
//! The whole vault is one JSON document under `{profile}/vault/wallet_vault`:
//! ```text
//! {
//!   "encrypted_mnemonic": { ciphertext, iv, salt } | null,
//!   "accounts": [ { address, name, derivation_path, index,
//!                   encrypted_key, created_at } ],
//!   "active_address": "0x..." | null,
//!   "next_index": 1
//! }
//! ```
//!
//! ## Security
//!
//! - Only ciphertext is written; plaintext keys never reach storage
//! - Every mutation is a full read-modify-write of the document

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::crypto::EncryptedSecret;
use crate::storage::{ScopedStore, StorageResult};

const VAULT_KEY: &str = "wallet_vault";

/// `derivation_path` of accounts imported from a raw private key.
pub const IMPORTED_PATH: &str = "imported";

/// `index` of accounts imported from a raw private key.
pub const IMPORTED_INDEX: i64 = -1;

/// One account held by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAccount {
    pub address: Address,
    pub name: String,
    /// `m/44'/60'/0'/0/{index}`, or `imported`
    pub derivation_path: String,
    /// HD index, or [`IMPORTED_INDEX`]
    pub index: i64,
    pub encrypted_key: EncryptedSecret,
    pub created_at: DateTime<Utc>,
}

impl DerivedAccount {
    pub fn is_imported(&self) -> bool {
        self.index == IMPORTED_INDEX
    }
}

/// Account view returned to callers (never includes key material).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub address: Address,
    pub name: String,
    pub derivation_path: String,
    pub index: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&DerivedAccount> for AccountSummary {
    fn from(account: &DerivedAccount) -> Self {
        Self {
            address: account.address,
            name: account.name.clone(),
            derivation_path: account.derivation_path.clone(),
            index: account.index,
            created_at: account.created_at,
        }
    }
}

/// The persisted vault document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletVault {
    pub encrypted_mnemonic: Option<EncryptedSecret>,
    pub accounts: Vec<DerivedAccount>,
    pub active_address: Option<Address>,
    /// Next HD index handed out by `derive_next_account`.
    pub next_index: u32,
}

impl WalletVault {
    pub fn account(&self, address: Address) -> Option<&DerivedAccount> {
        self.accounts.iter().find(|a| a.address == address)
    }

    pub fn account_mut(&mut self, address: Address) -> Option<&mut DerivedAccount> {
        self.accounts.iter_mut().find(|a| a.address == address)
    }

    pub fn contains(&self, address: Address) -> bool {
        self.account(address).is_some()
    }

    pub fn has_index(&self, index: i64) -> bool {
        index != IMPORTED_INDEX && self.accounts.iter().any(|a| a.index == index)
    }

    pub fn active_account(&self) -> Option<&DerivedAccount> {
        self.active_address.and_then(|address| self.account(address))
    }
}

/// Repository for the vault document.
#[derive(Clone)]
pub struct VaultRepository {
    store: ScopedStore,
}

impl VaultRepository {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Load the vault, or an empty one if none was saved yet.
    pub fn load(&self) -> StorageResult<WalletVault> {
        Ok(self.store.get_json(VAULT_KEY)?.unwrap_or_default())
    }

    pub fn save(&self, vault: &WalletVault) -> StorageResult<()> {
        self.store.set_json(VAULT_KEY, vault)
    }
}
