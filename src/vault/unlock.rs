// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Unlock State Machine
//!
//! Holds the decrypted key of the active vault account while the vault is
//! unlocked, and drops it again on lock or when the auto-lock timer fires.
//!
//! ```text
//! Locked --unlock(pin)--> Unlocked --lock() / timer--> Locked
//! ```
//!
//! The timer is a spawned task per unlock, stopped through a
//! `tokio_util::sync::CancellationToken`. A generation counter makes a timer
//! that lost the race against `lock()` + `unlock()` a no-op.
//!
//! State changes are published on a `tokio::sync::watch` channel so the
//! vault-backed signing authority can emit account notifications.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{AccountSummary, KeyVault};
use crate::error::{WalletError, WalletResult};

/// Default auto-lock delay.
pub const DEFAULT_AUTO_LOCK: Duration = Duration::from_secs(15 * 60);

/// Observable lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked { address: Address },
}

impl LockState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, LockState::Unlocked { .. })
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            LockState::Locked => None,
            LockState::Unlocked { address } => Some(*address),
        }
    }
}

/// Plaintext material held while unlocked.
struct Resident {
    signer: PrivateKeySigner,
    pin: Zeroizing<String>,
    timer: CancellationToken,
}

#[derive(Default)]
struct Inner {
    resident: Option<Resident>,
    generation: u64,
}

impl Inner {
    fn clear(&mut self) {
        if let Some(resident) = self.resident.take() {
            resident.timer.cancel();
        }
    }
}

/// Owner of the resident plaintext key.
#[derive(Clone)]
pub struct UnlockManager {
    vault: KeyVault,
    auto_lock: Duration,
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<LockState>>,
}

impl UnlockManager {
    pub fn new(vault: KeyVault, auto_lock: Duration) -> Self {
        let (state, _) = watch::channel(LockState::Locked);
        Self {
            vault,
            auto_lock,
            inner: Arc::new(Mutex::new(Inner::default())),
            state: Arc::new(state),
        }
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    pub fn auto_lock(&self) -> Duration {
        self.auto_lock
    }

    pub fn state(&self) -> LockState {
        *self.state.borrow()
    }

    /// Receiver that observes every lock state transition.
    pub fn watch(&self) -> watch::Receiver<LockState> {
        self.state.subscribe()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state().is_unlocked()
    }

    pub fn active_address(&self) -> Option<Address> {
        self.state().address()
    }

    /// Unlock with the configured auto-lock delay.
    pub async fn unlock(&self, pin: &str) -> WalletResult<Address> {
        let state = self.unlock_with_timeout(pin, self.auto_lock).await?;
        state
            .address()
            .ok_or_else(|| WalletError::NotFound("active account".to_string()))
    }

    /// Decrypt the active account under `pin` and arm a timer of `timeout`.
    ///
    /// Unlocking while already unlocked re-arms the timer.
    pub async fn unlock_with_timeout(&self, pin: &str, timeout: Duration) -> WalletResult<LockState> {
        let signer = self.vault.decrypt_active_private_key(pin)?;
        let address = signer.address();

        let mut inner = self.inner.lock().await;
        inner.clear();
        inner.generation += 1;

        let timer = CancellationToken::new();
        self.spawn_auto_lock(inner.generation, timer.clone(), timeout);
        inner.resident = Some(Resident {
            signer,
            pin: Zeroizing::new(pin.to_string()),
            timer,
        });
        drop(inner);

        let state = LockState::Unlocked { address };
        self.state.send_replace(state);
        info!(address = %address, timeout_secs = timeout.as_secs(), "Vault unlocked");
        Ok(state)
    }

    fn spawn_auto_lock(&self, generation: u64, timer: CancellationToken, timeout: Duration) {
        let inner = Arc::downgrade(&self.inner);
        let state = Arc::downgrade(&self.state);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {},
                _ = timer.cancelled() => return,
            }

            let (Some(inner), Some(state)) = (inner.upgrade(), state.upgrade()) else {
                return;
            };
            let mut guard = inner.lock().await;
            if guard.generation != generation {
                return;
            }
            guard.clear();
            drop(guard);

            state.send_replace(LockState::Locked);
            info!("Vault auto-locked");
        });
    }

    /// Drop the resident key and cancel the timer.
    pub async fn lock(&self) {
        let mut inner = self.inner.lock().await;
        let was_unlocked = inner.resident.is_some();
        inner.clear();
        inner.generation += 1;
        drop(inner);

        if was_unlocked {
            self.state.send_replace(LockState::Locked);
            info!("Vault locked");
        }
    }

    /// The resident signer of the active account.
    pub async fn signer(&self) -> WalletResult<PrivateKeySigner> {
        let inner = self.inner.lock().await;
        inner
            .resident
            .as_ref()
            .map(|r| r.signer.clone())
            .ok_or(WalletError::VaultLocked)
    }

    /// Make `address` active; re-derives the resident key when unlocked.
    pub async fn switch_account(&self, address: Address) -> WalletResult<()> {
        self.vault.set_active_account(address)?;
        self.refresh_resident().await
    }

    /// Delete an account; re-derives the resident key when unlocked.
    ///
    /// Deleting the last account locks the vault.
    pub async fn delete_account(&self, address: Address) -> WalletResult<Option<Address>> {
        let active = self.vault.delete_account(address)?;
        self.refresh_resident().await?;
        Ok(active)
    }

    /// Derive the next HD account using the resident PIN.
    pub async fn derive_next_account(&self, name: Option<&str>) -> WalletResult<AccountSummary> {
        let pin = {
            let inner = self.inner.lock().await;
            let resident = inner.resident.as_ref().ok_or(WalletError::VaultLocked)?;
            resident.pin.clone()
        };
        let account = self.vault.derive_next_account(&pin, name)?;
        self.refresh_resident().await?;
        Ok(account)
    }

    async fn refresh_resident(&self) -> WalletResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(resident) = inner.resident.as_mut() else {
            return Ok(());
        };

        let next = match self.vault.active_account()? {
            Some(_) => Some(self.vault.decrypt_active_private_key(&resident.pin)?),
            None => None,
        };

        let state = match next {
            Some(signer) => {
                let address = signer.address();
                resident.signer = signer;
                debug!(address = %address, "Resident key re-derived");
                LockState::Unlocked { address }
            }
            None => {
                inner.clear();
                inner.generation += 1;
                LockState::Locked
            }
        };
        drop(inner);

        self.state.send_replace(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, ScopedStore};

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_manager(auto_lock: Duration) -> (UnlockManager, Address) {
        let backing: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let vault = KeyVault::new(ScopedStore::new(backing, "vault"));
        let created = vault.create("1234").unwrap();
        (UnlockManager::new(vault, auto_lock), created.account.address)
    }

    #[tokio::test]
    async fn unlock_and_lock() {
        let (manager, address) = test_manager(DEFAULT_AUTO_LOCK);
        assert_eq!(manager.state(), LockState::Locked);
        assert!(matches!(manager.signer().await, Err(WalletError::VaultLocked)));

        assert!(matches!(manager.unlock("0000").await, Err(WalletError::InvalidPin)));
        assert!(!manager.is_unlocked());

        assert_eq!(manager.unlock("1234").await.unwrap(), address);
        assert_eq!(manager.signer().await.unwrap().address(), address);

        manager.lock().await;
        assert_eq!(manager.state(), LockState::Locked);
        assert!(matches!(manager.signer().await, Err(WalletError::VaultLocked)));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_lock_fires_after_timeout() {
        let (manager, _) = test_manager(Duration::from_secs(60));
        manager.unlock("1234").await.unwrap();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(manager.is_unlocked());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!manager.is_unlocked());
        assert!(matches!(manager.signer().await, Err(WalletError::VaultLocked)));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_lock_new_unlock() {
        let (manager, _) = test_manager(Duration::from_secs(60));
        manager.unlock("1234").await.unwrap();
        tokio::time::sleep(Duration::from_secs(50)).await;

        manager.lock().await;
        manager.unlock("1234").await.unwrap();

        // First timer would have fired at t=60
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(manager.is_unlocked());

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert!(!manager.is_unlocked());
    }

    #[tokio::test]
    async fn switching_account_rederives_resident_key() {
        let (manager, first) = test_manager(DEFAULT_AUTO_LOCK);
        let imported = manager
            .vault()
            .import_from_private_key(ANVIL_KEY, "1234", None)
            .unwrap();
        manager.unlock("1234").await.unwrap();
        let mut watch = manager.watch();

        manager.switch_account(imported.address).await.unwrap();
        assert_eq!(manager.signer().await.unwrap().address(), imported.address);
        assert!(watch.has_changed().unwrap());
        assert_eq!(watch.borrow_and_update().address(), Some(imported.address));

        manager.delete_account(imported.address).await.unwrap();
        assert_eq!(manager.signer().await.unwrap().address(), first);
    }

    #[tokio::test]
    async fn deleting_last_account_locks() {
        let (manager, address) = test_manager(DEFAULT_AUTO_LOCK);
        manager.unlock("1234").await.unwrap();
        assert_eq!(manager.delete_account(address).await.unwrap(), None);
        assert_eq!(manager.state(), LockState::Locked);
    }

    #[tokio::test]
    async fn derive_uses_resident_pin() {
        let (manager, _) = test_manager(DEFAULT_AUTO_LOCK);
        assert!(matches!(
            manager.derive_next_account(None).await,
            Err(WalletError::VaultLocked)
        ));

        manager.unlock("1234").await.unwrap();
        let derived = manager.derive_next_account(Some("Second")).await.unwrap();
        assert_eq!(derived.index, 1);
        assert_eq!(manager.active_address(), Some(derived.address));
        assert_eq!(manager.signer().await.unwrap().address(), derived.address);
    }
}
