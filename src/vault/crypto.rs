// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PIN-based envelope encryption for vault secrets.
//!
//! Every secret gets its own random 16-byte salt and 12-byte IV. The key is
//! PBKDF2-HMAC-SHA-256 (100,000 rounds) over the PIN, the cipher is
//! AES-256-GCM. Decryption failures are reported as [`WalletError::InvalidPin`]
//! whether the PIN was wrong or the ciphertext was altered.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use alloy::primitives::{Bytes, FixedBytes};
use hmac::Hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::WalletError;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const MIN_PIN_LEN: usize = 4;

/// A secret encrypted under a PIN-derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub ciphertext: Bytes,
    pub iv: FixedBytes<IV_LEN>,
    pub salt: FixedBytes<SALT_LEN>,
}

/// Reject PINs shorter than [`MIN_PIN_LEN`] characters.
pub fn validate_pin(pin: &str) -> Result<(), WalletError> {
    if pin.chars().count() < MIN_PIN_LEN {
        return Err(WalletError::validation(format!(
            "PIN must be at least {MIN_PIN_LEN} characters"
        )));
    }
    Ok(())
}

fn derive_key(pin: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, WalletError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(pin.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key[..])
        .map_err(|e| WalletError::validation(format!("key derivation failed: {e}")))?;
    Ok(key)
}

/// Random bytes from the OS generator.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// AES-256-GCM seal under a raw 32-byte key.
pub fn seal(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| WalletError::validation(format!("cipher init failed: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|_| WalletError::validation("encryption failed"))
}

/// AES-256-GCM open under a raw 32-byte key.
pub fn open(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| WalletError::InvalidPin)?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| WalletError::InvalidPin)
}

/// Encrypt `plaintext` under `pin` with a fresh salt and IV.
pub fn encrypt(plaintext: &[u8], pin: &str) -> Result<EncryptedSecret, WalletError> {
    validate_pin(pin)?;
    let salt = random_bytes::<SALT_LEN>();
    let iv = random_bytes::<IV_LEN>();
    let key = derive_key(pin, &salt)?;
    let ciphertext = seal(&key, &iv, plaintext)?;

    Ok(EncryptedSecret {
        ciphertext: ciphertext.into(),
        iv: FixedBytes::from(iv),
        salt: FixedBytes::from(salt),
    })
}

/// Decrypt a secret produced by [`encrypt`].
pub fn decrypt(secret: &EncryptedSecret, pin: &str) -> Result<Zeroizing<Vec<u8>>, WalletError> {
    let key = derive_key(pin, secret.salt.as_slice())?;
    open(&key, &secret.iv.0, &secret.ciphertext)
}

/// Decrypt a secret that holds UTF-8 text.
pub fn decrypt_string(secret: &EncryptedSecret, pin: &str) -> Result<Zeroizing<String>, WalletError> {
    let bytes = decrypt(secret, pin)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| WalletError::InvalidPin)?;
    Ok(Zeroizing::new(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_recovers_plaintext() {
        for plaintext in [&b""[..], b"x", b"legal winner thank year wave sausage worth useful"] {
            let secret = encrypt(plaintext, "1234").unwrap();
            let recovered = decrypt(&secret, "1234").unwrap();
            assert_eq!(recovered.as_slice(), plaintext);
        }
    }

    #[test]
    fn wrong_pin_fails() {
        let secret = encrypt(b"secret", "1234").unwrap();
        assert!(matches!(decrypt(&secret, "4321"), Err(WalletError::InvalidPin)));
    }

    #[test]
    fn tampering_fails_like_wrong_pin() {
        let secret = encrypt(b"secret", "1234").unwrap();

        let mut ciphertext = secret.ciphertext.to_vec();
        ciphertext[0] ^= 0x01;
        let flipped = EncryptedSecret {
            ciphertext: ciphertext.into(),
            ..secret.clone()
        };
        let tampered_iv = EncryptedSecret {
            iv: FixedBytes::from([0u8; IV_LEN]),
            ..secret.clone()
        };
        let tampered_salt = EncryptedSecret {
            salt: FixedBytes::from([0u8; SALT_LEN]),
            ..secret.clone()
        };

        for bad in [flipped, tampered_iv, tampered_salt] {
            let err = decrypt(&bad, "1234").unwrap_err();
            assert!(matches!(err, WalletError::InvalidPin));
            assert_eq!(
                err.to_string(),
                decrypt(&secret, "0000").unwrap_err().to_string()
            );
        }
    }

    #[test]
    fn salts_and_ivs_are_fresh() {
        let a = encrypt(b"same", "1234").unwrap();
        let b = encrypt(b"same", "1234").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn short_pin_is_rejected() {
        assert!(matches!(encrypt(b"x", "123"), Err(WalletError::Validation(_))));
        assert!(validate_pin("1234").is_ok());
    }

    #[test]
    fn serialized_form_is_hex() {
        let secret = encrypt(b"x", "1234").unwrap();
        let json = serde_json::to_value(&secret).unwrap();
        assert!(json["salt"].as_str().unwrap().starts_with("0x"));
        assert!(json["iv"].as_str().unwrap().starts_with("0x"));
        let back: EncryptedSecret = serde_json::from_value(json).unwrap();
        assert_eq!(back, secret);
    }
}
