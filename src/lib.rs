// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Smart Wallet - Session-Key Authorization Core
//!
//! PIN-encrypted HD key vault and delegated session keys for smart-contract
//! wallets on Avalanche C-Chain. Applications obtain one owner approval to
//! register a short-lived session key, then submit EIP-712 signed
//! meta-transactions without further prompts.
//!
//! ## Modules
//!
//! - `vault` - Encrypted mnemonic and account storage, unlock and auto-lock
//! - `authority` - The signing authority seam and the vault-backed provider
//! - `session` - Permissions, EIP-712 digests, session keys and their store
//! - `router` - Meta-transaction, direct and batch routing
//! - `client` - The application-facing facade
//! - `chain` - Contract ABIs and the alloy JSON-RPC gateway
//! - `storage` - Namespaced key-value persistence

pub mod authority;
pub mod chain;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod funding;
pub mod router;
pub mod session;
pub mod storage;
pub mod vault;

#[cfg(test)]
mod testing;

pub use client::{ConnectionInfo, WalletClient};
pub use config::ClientConfig;
pub use error::{ErrorKind, WalletError, WalletResult};
