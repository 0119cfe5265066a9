//! AES-256-GCM authenticated encryption, used both to unwrap the envelope's
//! inner AES key and to decrypt the ledger payload itself.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::SettlementError;

const IV_LEN: usize = 12;

/// Decrypt `ciphertext` (tag appended, as `Aes256Gcm` expects) under `key`
/// and `iv`. Any failure — wrong key, tampered ciphertext, tampered tag, or
/// a malformed IV length — collapses to
/// [`SettlementError::DecryptFailed`], deliberately without detail: the
/// caller must not be able to distinguish "wrong key" from "tampered
/// ciphertext" from the error alone.
pub fn aes_gcm_decrypt(key: &[u8; 32], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SettlementError> {
    if iv.len() != IV_LEN {
        return Err(SettlementError::DecryptFailed);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| SettlementError::DecryptFailed)
}

/// Encrypt `plaintext` under `key` with the given `iv`, returning ciphertext
/// with the 16-byte GCM tag appended. Used by tests and by any deployment
/// tooling that needs to construct envelopes, not by the settlement path
/// itself (which only ever decrypts).
pub fn aes_gcm_encrypt(key: &[u8; 32], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, SettlementError> {
    if iv.len() != IV_LEN {
        return Err(SettlementError::DecryptFailed);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);
    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &[],
            },
        )
        .map_err(|_| SettlementError::DecryptFailed)
}
