// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Key Manager
//!
//! Creates, restores and applies the session key of one application for one
//! smart wallet.
//!
//! ```text
//! NoSession --restore/create--> Active --time--> Expired
//!                                 |                 |
//!                              revoke            clear/restore
//!                                 v                 v
//!                              Revoked ---------> NoSession
//! ```
//!
//! Restoration prefers the app's own stored credential and falls back to any
//! other app's still-valid credential for the same wallet whose permissions
//! cover what this app requires (cross-app single sign-on).

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolCall;
use serde::Serialize;
use tracing::{debug, info};

use super::digest::ExecuteRequest;
use super::permissions::{self, Permission};
use super::signing::DigestSigner;
use super::store::{SessionCredential, SessionStore, MAX_SESSION_SECS};
use crate::chain::contracts::ISessionRegistry;
use crate::chain::{CallRequest, ChainGateway};
use crate::clock::Clock;
use crate::error::{WalletError, WalletResult};

/// Session length used when none is configured.
pub const DEFAULT_SESSION_SECS: u64 = 24 * 60 * 60;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NoSession,
    Active,
    Expired,
    Revoked,
}

/// Public view of the current session. Never includes the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub app_id: String,
    pub signer_address: Address,
    pub smart_wallet: Address,
    pub permissions: Vec<Permission>,
    pub valid_after: i64,
    pub valid_until: i64,
    pub status: SessionStatus,
}

/// Outcome of [`SessionKeyManager::create_session`].
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub info: SessionInfo,
    pub tx_hash: TxHash,
}

/// Clamp a configured duration to `(0, 30 days]`; zero means the default.
pub fn effective_duration(configured_secs: u64) -> i64 {
    let secs = if configured_secs == 0 {
        DEFAULT_SESSION_SECS
    } else {
        configured_secs
    };
    i64::try_from(secs).unwrap_or(MAX_SESSION_SECS).min(MAX_SESSION_SECS)
}

fn timestamp(secs: i64) -> WalletResult<U256> {
    u64::try_from(secs)
        .map(U256::from)
        .map_err(|_| WalletError::validation(format!("negative timestamp {secs}")))
}

pub struct SessionKeyManager {
    app_id: String,
    required_permissions: u32,
    duration_secs: i64,
    session_registry: Address,
    store: SessionStore,
    gateway: Arc<dyn ChainGateway>,
    clock: Arc<dyn Clock>,
    current: Option<SessionCredential>,
    revoked: bool,
}

impl SessionKeyManager {
    pub fn new(
        app_id: impl Into<String>,
        required_permissions: u32,
        duration_secs: u64,
        session_registry: Address,
        store: SessionStore,
        gateway: Arc<dyn ChainGateway>,
        clock: Arc<dyn Clock>,
    ) -> WalletResult<Self> {
        if !permissions::is_valid_mask(required_permissions) {
            return Err(WalletError::validation(format!(
                "required permission mask {required_permissions:#x} out of range"
            )));
        }
        Ok(Self {
            app_id: app_id.into(),
            required_permissions,
            duration_secs: effective_duration(duration_secs),
            session_registry,
            store,
            gateway,
            clock,
            current: None,
            revoked: false,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn required_permissions(&self) -> u32 {
        self.required_permissions
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration_secs
    }

    pub fn status(&self) -> SessionStatus {
        match &self.current {
            _ if self.revoked => SessionStatus::Revoked,
            None => SessionStatus::NoSession,
            Some(c) if c.is_active_at(self.clock.now()) => SessionStatus::Active,
            Some(_) => SessionStatus::Expired,
        }
    }

    /// `now ∈ [valid_after, valid_until]` for the adopted credential.
    pub fn is_active(&self) -> bool {
        self.status() == SessionStatus::Active
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.current.as_ref().map(|c| SessionInfo {
            app_id: c.app_id.clone(),
            signer_address: c.signer_address,
            smart_wallet: c.smart_wallet,
            permissions: permissions::decode(c.permissions),
            valid_after: c.valid_after,
            valid_until: c.valid_until,
            status: self.status(),
        })
    }

    /// Seconds until the adopted credential expires, zero once it has.
    pub fn time_remaining(&self) -> Option<i64> {
        self.current
            .as_ref()
            .map(|c| (c.valid_until - self.clock.now()).max(0))
    }

    fn adopt(&mut self, credential: SessionCredential) {
        self.current = Some(credential);
        self.revoked = false;
    }

    /// Adopt a stored credential for `wallet`. Returns whether one was found.
    pub fn restore_session(&mut self, wallet: Address) -> WalletResult<bool> {
        let now = self.clock.now();

        if let Some(own) = self.store.load(&self.app_id, wallet, now)? {
            if own.is_active_at(now) && permissions::satisfies(own.permissions, self.required_permissions) {
                info!(
                    app_id = %self.app_id,
                    wallet = %wallet,
                    signer = %own.signer_address,
                    "Session restored"
                );
                self.adopt(own);
                return Ok(true);
            }
        }

        let shared = self
            .store
            .find_all(wallet, now)?
            .into_iter()
            .find(|c| permissions::satisfies(c.permissions, self.required_permissions));

        match shared {
            Some(credential) => {
                info!(
                    app_id = %self.app_id,
                    from_app = %credential.app_id,
                    wallet = %wallet,
                    signer = %credential.signer_address,
                    "Session restored from another app"
                );
                self.adopt(credential);
                Ok(true)
            }
            None => {
                debug!(app_id = %self.app_id, wallet = %wallet, "No restorable session");
                self.current = None;
                Ok(false)
            }
        }
    }

    /// Generate a session key and register it on-chain from `owner`.
    ///
    /// Submits exactly one `registerSession` transaction. The credential is
    /// persisted only after the node accepted it.
    pub async fn create_session(&mut self, owner: Address, wallet: Address) -> WalletResult<CreatedSession> {
        let signer = PrivateKeySigner::random();
        let valid_after = self.clock.now();
        let valid_until = valid_after + self.duration_secs;
        let credential = SessionCredential::new(
            signer,
            wallet,
            self.required_permissions,
            valid_after,
            valid_until,
            self.app_id.clone(),
        );
        credential.validate()?;

        let call = ISessionRegistry::registerSessionCall {
            wallet,
            signer: credential.signer_address,
            validAfter: timestamp(valid_after)?,
            validUntil: timestamp(valid_until)?,
            permissions: U256::from(self.required_permissions),
        };
        let tx_hash = self
            .gateway
            .send_transaction(&CallRequest::new(owner, self.session_registry, call.abi_encode()))
            .await?;

        self.store.save(&credential)?;
        info!(
            app_id = %self.app_id,
            wallet = %wallet,
            signer = %credential.signer_address,
            valid_until,
            tx_hash = %tx_hash,
            "Session created"
        );

        self.adopt(credential);
        let info = self
            .session_info()
            .ok_or(WalletError::SessionNotFound)?;
        Ok(CreatedSession { info, tx_hash })
    }

    /// The adopted credential, if it may sign now.
    fn usable_credential(&self) -> WalletResult<&SessionCredential> {
        let credential = match (&self.current, self.revoked) {
            (Some(c), false) => c,
            _ => return Err(WalletError::SessionNotFound),
        };
        if !credential.is_active_at(self.clock.now()) {
            return Err(WalletError::SessionExpired);
        }
        let required = Permission::Execute.bit();
        if !permissions::satisfies(credential.permissions, required) {
            return Err(WalletError::InsufficientPermissions {
                required,
                granted: credential.permissions,
            });
        }
        Ok(credential)
    }

    /// Session signer for the adopted credential.
    pub fn signer(&self) -> WalletResult<DigestSigner> {
        Ok(DigestSigner::Session(self.usable_credential()?.signer.clone()))
    }

    /// Sign the `Execute` digest of `request` with the session key.
    pub fn sign_execute_digest(&self, domain_separator: B256, request: &ExecuteRequest) -> WalletResult<Bytes> {
        self.signer()?.sign_execute(domain_separator, request)
    }

    /// Like [`Self::sign_execute_digest`], reading the domain separator from
    /// the wallet contract.
    pub async fn sign_execute(&self, request: &ExecuteRequest) -> WalletResult<Bytes> {
        let signer = self.signer()?;
        let wallet = self.usable_credential()?.smart_wallet;
        let domain_separator = self.gateway.domain_separator(wallet).await?;
        signer.sign_execute(domain_separator, request)
    }

    /// Forget the session for `wallet` locally.
    pub fn clear_session(&mut self, wallet: Address) -> WalletResult<()> {
        self.store.remove(&self.app_id, wallet)?;
        self.current = None;
        self.revoked = false;
        info!(app_id = %self.app_id, wallet = %wallet, "Session cleared");
        Ok(())
    }

    /// Drop the adopted credential without touching the store.
    pub fn detach(&mut self) {
        self.current = None;
        self.revoked = false;
    }

    /// Revoke the adopted signer on-chain from `owner`, then forget it.
    pub async fn revoke_session(&mut self, owner: Address) -> WalletResult<TxHash> {
        let credential = self.current.as_ref().ok_or(WalletError::SessionNotFound)?;
        let wallet = credential.smart_wallet;
        let call = ISessionRegistry::revokeSessionCall {
            wallet,
            signer: credential.signer_address,
        };
        let tx_hash = self
            .gateway
            .send_transaction(&CallRequest::new(owner, self.session_registry, call.abi_encode()))
            .await?;

        // Another app's credential is removed under its own key.
        let app_id = credential.app_id.clone();
        self.store.remove(&app_id, wallet)?;
        self.current = None;
        self.revoked = true;

        info!(app_id = %app_id, wallet = %wallet, tx_hash = %tx_hash, "Session revoked");
        Ok(tx_hash)
    }
}
