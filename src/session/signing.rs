// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing capability shared by the vault account and the session key.
//!
//! Both variants sign the raw 32-byte EIP-712 digest (no `personal_sign`
//! prefix) and return the 65-byte `r || s || v` form, `v ∈ {27, 28}`, which
//! is what `executeWithSignature` recovers from.

use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use super::digest::{digest_for, ExecuteRequest};
use crate::error::{WalletError, WalletResult};

/// A local key able to authorize `Execute` digests.
#[derive(Clone)]
pub enum DigestSigner {
    /// Decrypted vault account (the wallet owner).
    Account(PrivateKeySigner),
    /// Ephemeral session key registered on-chain.
    Session(PrivateKeySigner),
}

impl std::fmt::Debug for DigestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DigestSigner::Account(s) => f.debug_tuple("Account").field(&s.address()).finish(),
            DigestSigner::Session(s) => f.debug_tuple("Session").field(&s.address()).finish(),
        }
    }
}

impl DigestSigner {
    fn inner(&self) -> &PrivateKeySigner {
        match self {
            DigestSigner::Account(signer) | DigestSigner::Session(signer) => signer,
        }
    }

    pub fn address(&self) -> Address {
        self.inner().address()
    }

    pub fn is_session(&self) -> bool {
        matches!(self, DigestSigner::Session(_))
    }

    /// The owner key for transaction signing. Session keys never sign
    /// transactions, only digests.
    pub fn into_account_key(self) -> Option<PrivateKeySigner> {
        match self {
            DigestSigner::Account(signer) => Some(signer),
            DigestSigner::Session(_) => None,
        }
    }

    /// Sign a precomputed digest.
    pub fn sign_digest(&self, digest: &B256) -> WalletResult<Bytes> {
        let signature = self
            .inner()
            .sign_hash_sync(digest)
            .map_err(|e| WalletError::Provider(format!("signing failed: {e}")))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }

    /// Build the `Execute` digest for `request` and sign it.
    pub fn sign_execute(&self, domain_separator: B256, request: &ExecuteRequest) -> WalletResult<Bytes> {
        self.sign_digest(&digest_for(domain_separator, request))
    }
}
