// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Vault
//!
//! PIN-encrypted storage of the wallet mnemonic and the account keys
//! derived from it (or imported next to it).
//!
//! ## Security Model
//!
//! - The mnemonic and every account key are encrypted independently, each
//!   with its own salt and IV (see [`crypto`])
//! - Plaintext key material only lives in [`zeroize::Zeroizing`] buffers for
//!   the duration of one call; nothing is cached here
//! - Wrong PIN and corrupted ciphertext are the same error
//!
//! Mutating operations are read-modify-write over one document and are not
//! safe to call concurrently on the same profile.

pub mod crypto;
pub mod hd;
pub mod repository;
pub mod unlock;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use tracing::info;
use zeroize::Zeroizing;

pub use repository::{
    AccountSummary, DerivedAccount, VaultRepository, WalletVault, IMPORTED_INDEX, IMPORTED_PATH,
};
pub use unlock::{LockState, UnlockManager};

use crate::error::{WalletError, WalletResult};
use crate::storage::ScopedStore;

/// Result of [`KeyVault::create`]. The caller must show the phrase to the
/// user for backup; it is not retrievable without the PIN afterwards.
pub struct CreatedWallet {
    pub mnemonic: Zeroizing<String>,
    pub account: AccountSummary,
}

impl std::fmt::Debug for CreatedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedWallet")
            .field("mnemonic", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

/// Encrypted HD key vault for one profile.
#[derive(Clone)]
pub struct KeyVault {
    repo: VaultRepository,
}

impl KeyVault {
    pub fn new(store: ScopedStore) -> Self {
        Self {
            repo: VaultRepository::new(store),
        }
    }

    /// Snapshot of the persisted vault document.
    pub fn load(&self) -> WalletResult<WalletVault> {
        Ok(self.repo.load()?)
    }

    /// `true` once the vault holds at least one account.
    pub fn is_initialized(&self) -> WalletResult<bool> {
        Ok(!self.load()?.accounts.is_empty())
    }

    pub fn has_mnemonic(&self) -> WalletResult<bool> {
        Ok(self.load()?.encrypted_mnemonic.is_some())
    }

    pub fn accounts(&self) -> WalletResult<Vec<AccountSummary>> {
        Ok(self.load()?.accounts.iter().map(AccountSummary::from).collect())
    }

    pub fn active_account(&self) -> WalletResult<Option<AccountSummary>> {
        Ok(self.load()?.active_account().map(AccountSummary::from))
    }

    /// Generate a new mnemonic and its first account.
    pub fn create(&self, pin: &str) -> WalletResult<CreatedWallet> {
        crypto::validate_pin(pin)?;
        let mnemonic = hd::generate_mnemonic()?;
        let account = self.store_mnemonic(&mnemonic, pin)?;

        info!(address = %account.address, "Vault created");
        Ok(CreatedWallet { mnemonic, account })
    }

    /// Restore a vault from an existing phrase.
    ///
    /// Unlike a plain import of the same key, an address that is already in
    /// the vault is rejected with [`WalletError::DuplicateAccount`].
    pub fn import_from_mnemonic(&self, phrase: &str, pin: &str) -> WalletResult<AccountSummary> {
        crypto::validate_pin(pin)?;
        let mnemonic = hd::normalize_mnemonic(phrase)?;
        let account = self.store_mnemonic(&mnemonic, pin)?;

        info!(address = %account.address, "Vault imported from mnemonic");
        Ok(account)
    }

    fn store_mnemonic(&self, mnemonic: &str, pin: &str) -> WalletResult<AccountSummary> {
        let mut vault = self.load()?;
        if vault.encrypted_mnemonic.is_some() {
            return Err(WalletError::AlreadyInitialized);
        }

        let signer = hd::derive_signer(mnemonic, 0)?;
        if vault.contains(signer.address()) {
            return Err(WalletError::DuplicateAccount(signer.address()));
        }

        let encrypted_mnemonic = crypto::encrypt(mnemonic.as_bytes(), pin)?;
        let account = Self::seal_account(&signer, pin, default_name(&vault), 0)?;

        vault.encrypted_mnemonic = Some(encrypted_mnemonic);
        vault.active_address = Some(account.address);
        vault.next_index = 1;
        let summary = AccountSummary::from(&account);
        vault.accounts.push(account);
        self.repo.save(&vault)?;

        Ok(summary)
    }

    /// Add an account from a raw hex private key.
    pub fn import_from_private_key(
        &self,
        private_key: &str,
        pin: &str,
        name: Option<&str>,
    ) -> WalletResult<AccountSummary> {
        crypto::validate_pin(pin)?;
        let signer = hd::signer_from_hex(private_key)?;

        let mut vault = self.load()?;
        if vault.contains(signer.address()) {
            return Err(WalletError::DuplicateAccount(signer.address()));
        }

        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Imported {}", vault.accounts.len() + 1));
        let account = Self::seal_account(&signer, pin, name, IMPORTED_INDEX)?;
        let summary = AccountSummary::from(&account);

        if vault.accounts.is_empty() {
            vault.active_address = Some(account.address);
        }
        vault.accounts.push(account);
        self.repo.save(&vault)?;

        info!(address = %summary.address, "Private key imported into vault");
        Ok(summary)
    }

    /// Derive the account at the next unused HD index and make it active.
    pub fn derive_next_account(&self, pin: &str, name: Option<&str>) -> WalletResult<AccountSummary> {
        let mut vault = self.load()?;
        let encrypted = vault
            .encrypted_mnemonic
            .as_ref()
            .ok_or(WalletError::NoMnemonic)?;
        let mnemonic = crypto::decrypt_string(encrypted, pin)?;

        // Indices already held, or whose key was imported raw, are skipped
        let mut index = vault.next_index;
        let signer = loop {
            if !vault.has_index(i64::from(index)) {
                let candidate = hd::derive_signer(&mnemonic, index)?;
                if !vault.contains(candidate.address()) {
                    break candidate;
                }
            }
            index = index
                .checked_add(1)
                .ok_or_else(|| WalletError::validation("derivation index exhausted"))?;
        };

        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| default_name(&vault));
        let account = Self::seal_account(&signer, pin, name, i64::from(index))?;
        let summary = AccountSummary::from(&account);

        vault.active_address = Some(account.address);
        vault.accounts.push(account);
        vault.next_index = index + 1;
        self.repo.save(&vault)?;

        info!(address = %summary.address, index, "Vault account derived");
        Ok(summary)
    }

    /// Decrypt the mnemonic for backup display.
    pub fn export_mnemonic(&self, pin: &str) -> WalletResult<Zeroizing<String>> {
        let vault = self.load()?;
        let encrypted = vault
            .encrypted_mnemonic
            .as_ref()
            .ok_or(WalletError::NoMnemonic)?;
        crypto::decrypt_string(encrypted, pin)
    }

    /// Decrypt one account key as `0x`-prefixed hex.
    pub fn export_private_key(&self, address: Address, pin: &str) -> WalletResult<Zeroizing<String>> {
        let vault = self.load()?;
        let account = vault
            .account(address)
            .ok_or_else(|| WalletError::NotFound(format!("Account {address}")))?;
        let signer = Self::open_account(account, pin)?;
        Ok(hd::signer_key_hex(&signer))
    }

    pub fn set_active_account(&self, address: Address) -> WalletResult<()> {
        let mut vault = self.load()?;
        if !vault.contains(address) {
            return Err(WalletError::NotFound(format!("Account {address}")));
        }
        vault.active_address = Some(address);
        self.repo.save(&vault)?;
        info!(address = %address, "Active account switched");
        Ok(())
    }

    /// Remove an account. Returns the active address afterwards.
    ///
    /// Deleting the active account promotes the first remaining account.
    pub fn delete_account(&self, address: Address) -> WalletResult<Option<Address>> {
        let mut vault = self.load()?;
        if !vault.contains(address) {
            return Err(WalletError::NotFound(format!("Account {address}")));
        }

        vault.accounts.retain(|a| a.address != address);
        if vault.active_address == Some(address) {
            vault.active_address = vault.accounts.first().map(|a| a.address);
        }
        self.repo.save(&vault)?;

        info!(address = %address, "Vault account deleted");
        Ok(vault.active_address)
    }

    pub fn rename_account(&self, address: Address, name: &str) -> WalletResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WalletError::validation("account name must not be empty"));
        }
        let mut vault = self.load()?;
        let account = vault
            .account_mut(address)
            .ok_or_else(|| WalletError::NotFound(format!("Account {address}")))?;
        account.name = name.to_string();
        self.repo.save(&vault)?;
        Ok(())
    }

    /// Re-encrypt every secret under `new_pin`.
    ///
    /// Everything is decrypted before anything is written, so a wrong
    /// `old_pin` leaves the stored vault untouched.
    pub fn change_pin(&self, old_pin: &str, new_pin: &str) -> WalletResult<()> {
        crypto::validate_pin(new_pin)?;
        let mut vault = self.load()?;

        let mnemonic = match &vault.encrypted_mnemonic {
            Some(encrypted) => Some(crypto::decrypt_string(encrypted, old_pin)?),
            None => None,
        };
        let signers = vault
            .accounts
            .iter()
            .map(|account| Self::open_account(account, old_pin))
            .collect::<WalletResult<Vec<_>>>()?;

        if let Some(mnemonic) = &mnemonic {
            vault.encrypted_mnemonic = Some(crypto::encrypt(mnemonic.as_bytes(), new_pin)?);
        }
        for (account, signer) in vault.accounts.iter_mut().zip(&signers) {
            account.encrypted_key =
                crypto::encrypt(hd::signer_key_bytes(signer).as_slice(), new_pin)?;
        }
        self.repo.save(&vault)?;

        info!(accounts = vault.accounts.len(), "Vault PIN changed");
        Ok(())
    }

    /// Decrypt the active account key.
    pub fn decrypt_active_private_key(&self, pin: &str) -> WalletResult<PrivateKeySigner> {
        let vault = self.load()?;
        let account = vault
            .active_account()
            .ok_or_else(|| WalletError::NotFound("active account".to_string()))?;
        Self::open_account(account, pin)
    }

    fn seal_account(
        signer: &PrivateKeySigner,
        pin: &str,
        name: String,
        index: i64,
    ) -> WalletResult<DerivedAccount> {
        let encrypted_key = crypto::encrypt(hd::signer_key_bytes(signer).as_slice(), pin)?;
        let derivation_path = if index == IMPORTED_INDEX {
            IMPORTED_PATH.to_string()
        } else {
            hd::derivation_path(index as u32)
        };

        Ok(DerivedAccount {
            address: signer.address(),
            name,
            derivation_path,
            index,
            encrypted_key,
            created_at: Utc::now(),
        })
    }

    fn open_account(account: &DerivedAccount, pin: &str) -> WalletResult<PrivateKeySigner> {
        let key = crypto::decrypt(&account.encrypted_key, pin)?;
        let signer = hd::signer_from_bytes(&key)?;
        if signer.address() != account.address {
            return Err(WalletError::InvalidPin);
        }
        Ok(signer)
    }
}

fn default_name(vault: &WalletVault) -> String {
    format!("Account {}", vault.accounts.len() + 1)
}
