// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BIP-39 mnemonics and BIP-44 Ethereum account derivation.

use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use bip39::{Language, Mnemonic};
use zeroize::Zeroizing;

use super::crypto::random_bytes;
use crate::error::WalletError;

/// BIP-44 prefix for Ethereum accounts; the account index is appended.
pub const ETH_PATH_PREFIX: &str = "m/44'/60'/0'/0";

/// 128 bits of entropy, i.e. a 12-word phrase.
const ENTROPY_BYTES: usize = 16;

/// Derivation path for account `index`.
pub fn derivation_path(index: u32) -> String {
    format!("{ETH_PATH_PREFIX}/{index}")
}

/// Generate a fresh 12-word English mnemonic.
pub fn generate_mnemonic() -> Result<Zeroizing<String>, WalletError> {
    let entropy = Zeroizing::new(random_bytes::<ENTROPY_BYTES>());
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy.as_slice())
        .map_err(|e| WalletError::validation(format!("mnemonic generation failed: {e}")))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Validate wordlist and checksum, returning the normalized phrase.
pub fn normalize_mnemonic(phrase: &str) -> Result<Zeroizing<String>, WalletError> {
    let collapsed = phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, &collapsed)
        .map_err(|_| WalletError::InvalidMnemonic)?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Derive the signer at `m/44'/60'/0'/0/{index}`.
pub fn derive_signer(phrase: &str, index: u32) -> Result<PrivateKeySigner, WalletError> {
    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .derivation_path(derivation_path(index))
        .map_err(|e| WalletError::validation(format!("invalid derivation path: {e}")))?
        .build()
        .map_err(|_| WalletError::InvalidMnemonic)
}

/// Parse a hex private key with or without a `0x` prefix.
pub fn signer_from_hex(raw: &str) -> Result<PrivateKeySigner, WalletError> {
    let trimmed = raw.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.len() != 64 {
        return Err(WalletError::validation(
            "private key must be 32 bytes of hex",
        ));
    }

    let key_bytes = Zeroizing::new(
        alloy::hex::decode(hex)
            .map_err(|e| WalletError::validation(format!("invalid private key hex: {e}")))?,
    );

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| WalletError::validation(format!("invalid private key: {e}")))
}

/// Raw private key bytes of `signer`.
pub fn signer_key_bytes(signer: &PrivateKeySigner) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(signer.to_bytes().0)
}

/// `0x`-prefixed lowercase hex of the private key.
pub fn signer_key_hex(signer: &PrivateKeySigner) -> Zeroizing<String> {
    Zeroizing::new(format!("0x{}", alloy::hex::encode(signer_key_bytes(signer).as_slice())))
}

/// Rebuild a signer from decrypted key bytes.
///
/// Bytes that are not a valid scalar can only come from a corrupted vault,
/// so the failure is reported the same way as any other decryption failure.
pub fn signer_from_bytes(key: &[u8]) -> Result<PrivateKeySigner, WalletError> {
    PrivateKeySigner::from_slice(key).map_err(|_| WalletError::InvalidPin)
}
