// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Keys
//!
//! Ephemeral signing credentials registered on-chain so an application can
//! submit wallet calls without an owner approval per call.
//!
//! - [`permissions`]: capability bitmask shared with the session registry
//! - [`digest`]: EIP-712 `Execute` hashing, matching the wallet verifier
//! - [`signing`]: raw digest signing for account and session keys
//! - [`store`]: per-profile credential persistence
//! - [`manager`]: create / restore / sign / clear lifecycle

pub mod digest;
pub mod manager;
pub mod permissions;
pub mod signing;
pub mod store;

pub use manager::{CreatedSession, SessionInfo, SessionKeyManager, SessionStatus};
pub use permissions::{Permission, ALL_PERMISSIONS};
pub use signing::DigestSigner;
pub use store::{SessionCredential, SessionStore, MAX_SESSION_SECS};
