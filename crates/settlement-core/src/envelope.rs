//! Envelope codec: unwraps an AES-GCM-encrypted ledger submission into the
//! plaintext [`PlainLedger`] it carries.
//!
//! The wire format layers two independent AES-GCM operations:
//!
//! 1. **Key wrapping** — `encrypted_aes_key` is `wrapping_iv (12 bytes) ||
//!    ciphertext`, where the wrapping key is HKDF-SHA256 over the ECDH
//!    shared secret between the bank's static key and the envelope's
//!    `receiver_public_key` (the merchant backend's ephemeral ECDH peer
//!    key — "receiver" names who the envelope is addressed to, not whose
//!    key this is). Decrypting it yields the 32-byte inner AES key.
//! 2. **Payload encryption** — `encrypted_payload` is AES-GCM ciphertext
//!    under the inner key and the envelope's own `iv`, containing the
//!    UTF-8 JSON-encoded [`PlainLedger`].
//!
//! Both layers fold every possible failure into
//! [`SettlementError::DecryptFailed`] — a wrong key, a tampered tag, and a
//! corrupt wrapping all look identical from the outside.

use base64::Engine;

use crate::crypto::{aes_gcm_decrypt, hkdf_sha256, Jwk, AES_KEY_WRAPPING_INFO};
use crate::error::SettlementError;
use crate::types::{Envelope, PlainLedger};

const WRAPPING_IV_LEN: usize = 12;

/// Boundary for agreeing on a shared secret with an envelope's peer,
/// implemented by whatever holds the bank's ECDH private key. Kept opaque
/// here so this crate never needs to know how (or where) that key is
/// stored.
pub trait EnvelopeKeyAgreement {
    fn agree(&self, peer_public_key: &Jwk) -> Result<[u8; 32], SettlementError>;
}

fn base64_decode(field: &str, value: &str) -> Result<Vec<u8>, SettlementError> {
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|e| SettlementError::EnvelopeMalformed(format!("{field} is not valid base64: {e}")))
}

/// Unwrap an envelope into the [`PlainLedger`] it encrypts.
pub fn unwrap_envelope(
    envelope: &Envelope,
    key_agreement: &dyn EnvelopeKeyAgreement,
) -> Result<PlainLedger, SettlementError> {
    let wrapped = base64_decode("encrypted_aes_key", &envelope.encrypted_aes_key)?;
    if wrapped.len() <= WRAPPING_IV_LEN {
        return Err(SettlementError::EnvelopeMalformed(
            "encrypted_aes_key is too short to contain an IV and ciphertext".to_string(),
        ));
    }
    let (wrapping_iv, wrapped_key_ciphertext) = wrapped.split_at(WRAPPING_IV_LEN);

    let shared_secret = key_agreement.agree(&envelope.receiver_public_key)?;
    let wrapping_key_bytes = hkdf_sha256(&shared_secret, AES_KEY_WRAPPING_INFO, 32);
    let wrapping_key: [u8; 32] = wrapping_key_bytes
        .try_into()
        .map_err(|_| SettlementError::Internal("HKDF did not yield 32 bytes".to_string()))?;

    let inner_key_bytes = aes_gcm_decrypt(&wrapping_key, wrapping_iv, wrapped_key_ciphertext)?;
    let inner_key: [u8; 32] = inner_key_bytes
        .try_into()
        .map_err(|_| SettlementError::DecryptFailed)?;

    let payload_iv = base64_decode("iv", &envelope.iv)?;
    let payload_ciphertext = base64_decode("encrypted_payload", &envelope.encrypted_payload)?;
    let plaintext = aes_gcm_decrypt(&inner_key, &payload_iv, &payload_ciphertext)?;

    let json = String::from_utf8(plaintext)
        .map_err(|e| SettlementError::EnvelopeMalformed(format!("decrypted payload is not UTF-8: {e}")))?;
    let ledger: PlainLedger = serde_json::from_str(&json)?;
    Ok(ledger)
}
