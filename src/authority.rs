// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Signing Authority
//!
//! The account provider the client connects through: an injected
//! EIP-1193-style provider in a browser host, or the local vault here.
//! Only the handful of JSON-RPC methods the connect flow needs are modelled.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{parse_address, WalletError, WalletResult};
use crate::session::DigestSigner;
use crate::vault::UnlockManager;

const NOTIFICATION_CAPACITY: usize = 16;

/// Account and chain change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityNotification {
    /// New account list; empty means the user disconnected or locked.
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnected,
}

#[async_trait]
pub trait SigningAuthority: Send + Sync {
    /// JSON-RPC style request.
    async fn request(&self, method: &str, params: Value) -> WalletResult<Value>;

    fn subscribe(&self) -> broadcast::Receiver<AuthorityNotification>;

    /// Local owner key, for authorities that hold one. Authorities that sign
    /// transactions themselves (injected providers) return `None`.
    async fn account_signer(&self) -> WalletResult<Option<DigestSigner>> {
        Ok(None)
    }
}

/// `eth_requestAccounts`, parsed.
pub async fn request_accounts(authority: &dyn SigningAuthority) -> WalletResult<Vec<Address>> {
    let value = authority.request("eth_requestAccounts", json!([])).await?;
    parse_accounts(&value)
}

/// `eth_chainId`, parsed from a hex quantity or a plain number.
pub async fn request_chain_id(authority: &dyn SigningAuthority) -> WalletResult<u64> {
    let value = authority.request("eth_chainId", json!([])).await?;
    parse_chain_id(&value)
}

pub fn parse_accounts(value: &Value) -> WalletResult<Vec<Address>> {
    let items = value
        .as_array()
        .ok_or_else(|| WalletError::Provider(format!("expected account array, got {value}")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| WalletError::Provider(format!("expected address string, got {item}")))
                .and_then(parse_address)
        })
        .collect()
}

pub fn parse_chain_id(value: &Value) -> WalletResult<u64> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let raw = value
        .as_str()
        .ok_or_else(|| WalletError::Provider(format!("expected chain id, got {value}")))?;
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse::<u64>(),
    };
    parsed.map_err(|e| WalletError::Provider(format!("invalid chain id {raw}: {e}")))
}

/// Authority backed by the local vault's unlock state.
///
/// Exposes the active account only while unlocked. Lock state changes are
/// forwarded as [`AuthorityNotification::AccountsChanged`].
pub struct VaultAuthority {
    unlock: UnlockManager,
    chain_id: AtomicU64,
    notifications: broadcast::Sender<AuthorityNotification>,
}

impl VaultAuthority {
    /// Create the authority and start forwarding lock state changes.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(unlock: UnlockManager, chain_id: u64) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let mut state = unlock.watch();
        let forward = notifications.clone();
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let accounts: Vec<Address> = state.borrow_and_update().address().into_iter().collect();
                debug!(accounts = accounts.len(), "Forwarding account change");
                // No subscribers is fine
                let _ = forward.send(AuthorityNotification::AccountsChanged(accounts));
            }
        });

        Self {
            unlock,
            chain_id: AtomicU64::new(chain_id),
            notifications,
        }
    }

    pub fn unlock_manager(&self) -> &UnlockManager {
        &self.unlock
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    /// Point the authority at another chain and notify subscribers.
    pub fn switch_chain(&self, chain_id: u64) {
        if self.chain_id.swap(chain_id, Ordering::SeqCst) != chain_id {
            let _ = self.notifications.send(AuthorityNotification::ChainChanged(chain_id));
        }
    }

    /// Tell subscribers the authority is going away.
    pub fn disconnect(&self) {
        let _ = self.notifications.send(AuthorityNotification::Disconnected);
    }

    fn accounts(&self) -> Vec<Value> {
        self.unlock
            .active_address()
            .map(|a| vec![json!(format!("{a:#x}"))])
            .unwrap_or_default()
    }
}

#[async_trait]
impl SigningAuthority for VaultAuthority {
    async fn request(&self, method: &str, _params: Value) -> WalletResult<Value> {
        match method {
            "eth_requestAccounts" => {
                if !self.unlock.is_unlocked() {
                    return Err(WalletError::VaultLocked);
                }
                Ok(Value::Array(self.accounts()))
            }
            "eth_accounts" => Ok(Value::Array(self.accounts())),
            "eth_chainId" => Ok(json!(format!("{:#x}", self.chain_id()))),
            other => Err(WalletError::Provider(format!("unsupported method: {other}"))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthorityNotification> {
        self.notifications.subscribe()
    }

    /// The resident unlocked key; [`WalletError::VaultLocked`] when locked.
    async fn account_signer(&self) -> WalletResult<Option<DigestSigner>> {
        Ok(Some(DigestSigner::Account(self.unlock.signer().await?)))
    }
}
