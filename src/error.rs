// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unified error type for the vault, session and transaction layers.
//!
//! Lower layers keep their own error enums ([`StorageError`],
//! [`GatewayError`]) and convert into [`WalletError`] at the boundary.
//! Callers that need to decide on retry or UX treatment should match on
//! [`WalletError::kind`] rather than on individual variants.

use alloy::primitives::{Address, U256};

use crate::chain::GatewayError;
use crate::storage::StorageError;

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input (PIN length, malformed mnemonic/address). Never retried.
    Validation,
    /// Wrong PIN or corrupted ciphertext. Intentionally not distinguished.
    Authentication,
    /// Precondition violation (not connected, no session, already initialized).
    State,
    /// Session permissions do not cover the request.
    Permission,
    /// Local balance check failed before submission.
    Funds,
    /// Provider, chain id or RPC failure. Retry policy belongs to the transport.
    Network,
    /// Local persistence failure.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid mnemonic phrase")]
    InvalidMnemonic,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(Address),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vault has no mnemonic to derive from")]
    NoMnemonic,

    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// Wrong PIN and tampered ciphertext both surface as this variant.
    #[error("Invalid PIN or corrupted vault data")]
    InvalidPin,

    #[error("Vault is locked")]
    VaultLocked,

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("No session key for this wallet")]
    SessionNotFound,

    #[error("Session key expired")]
    SessionExpired,

    #[error("Already initialized")]
    AlreadyInitialized,

    #[error("No smart wallet provisioned for owner {0}")]
    SmartWalletNotFound(Address),

    #[error("Insufficient permissions: required {required:#x}, granted {granted:#x}")]
    InsufficientPermissions { required: u32, granted: u32 },

    #[error("Insufficient balance: required {required} wei, available {available} wei")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Chain mismatch: expected {expected}, connected to {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("RPC error: {0}")]
    Rpc(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl WalletError {
    /// Category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::Validation(_)
            | WalletError::InvalidMnemonic
            | WalletError::InvalidAddress(_)
            | WalletError::DuplicateAccount(_)
            | WalletError::NotFound(_)
            | WalletError::NoMnemonic
            | WalletError::UnknownPermission(_) => ErrorKind::Validation,
            WalletError::InvalidPin => ErrorKind::Authentication,
            WalletError::VaultLocked
            | WalletError::WalletNotConnected
            | WalletError::SessionNotFound
            | WalletError::SessionExpired
            | WalletError::AlreadyInitialized
            | WalletError::SmartWalletNotFound(_) => ErrorKind::State,
            WalletError::InsufficientPermissions { .. } => ErrorKind::Permission,
            WalletError::InsufficientBalance { .. } => ErrorKind::Funds,
            WalletError::Provider(_) | WalletError::ChainMismatch { .. } | WalletError::Rpc(_) => {
                ErrorKind::Network
            }
            WalletError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WalletError::Validation(message.into())
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

/// Parse an EVM address in any letter case.
pub fn parse_address(raw: &str) -> WalletResult<Address> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| WalletError::InvalidAddress(format!("{raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_categories() {
        assert_eq!(WalletError::validation("pin").kind(), ErrorKind::Validation);
        assert_eq!(WalletError::InvalidPin.kind(), ErrorKind::Authentication);
        assert_eq!(WalletError::SessionExpired.kind(), ErrorKind::State);
        assert_eq!(
            WalletError::InsufficientPermissions {
                required: 1,
                granted: 0
            }
            .kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            WalletError::InsufficientBalance {
                required: U256::from(2),
                available: U256::from(1)
            }
            .kind(),
            ErrorKind::Funds
        );
        assert_eq!(
            WalletError::ChainMismatch {
                expected: 43113,
                actual: 1
            }
            .kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn invalid_pin_message_is_generic() {
        let message = WalletError::InvalidPin.to_string();
        assert!(!message.to_lowercase().contains("tag"));
        assert!(!message.to_lowercase().contains("wrong pin"));
    }

    #[test]
    fn parse_address_ignores_case() {
        let lower = parse_address("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266").unwrap();
        let upper = parse_address("0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266").unwrap();
        assert_eq!(lower, upper);
        assert!(matches!(
            parse_address("0x1234"),
            Err(WalletError::InvalidAddress(_))
        ));
    }
}
