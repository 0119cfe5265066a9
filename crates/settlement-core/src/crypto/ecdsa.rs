//! ECDSA-P256 signature verification.
//!
//! Signatures must be the IEEE-P1363 concatenation `r || s` (64 bytes,
//! big-endian, zero-padded) — the shape `window.crypto.subtle.sign` produces.
//! DER-encoded signatures are rejected by construction: `Signature::from_slice`
//! only accepts the fixed 64-byte concatenated form, so a DER blob (which is
//! ASN.1-tagged and variable-length) fails to parse and this function returns
//! `false` rather than attempting any DER fallback.

use super::Jwk;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::PublicKey;

/// Verify a raw P1363 signature over a pre-hashed digest.
///
/// Returns `false` (never an error) for a malformed JWK, a malformed
/// signature, or a signature that fails to verify — the caller (the ledger
/// verifier) is responsible for turning a `false` into a
/// [`crate::error::SettlementError::SignatureInvalid`] at the right
/// granularity (ledger-level vs per-transaction).
pub fn ecdsa_verify(jwk_public_key: &Jwk, signature_bytes: &[u8], digest_bytes: &[u8]) -> bool {
    if signature_bytes.len() != 64 {
        return false;
    }
    let public_key = match PublicKey::from_jwk(jwk_public_key) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let verifying_key = VerifyingKey::from(public_key);
    let signature = match Signature::from_slice(signature_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };
    verifying_key
        .verify_prehash(digest_bytes, &signature)
        .is_ok()
}

/// Convenience wrapper: verify a base64-encoded signature over a digest.
pub fn ecdsa_verify_hex_jwk_sig(
    jwk_public_key: &Jwk,
    signature_base64: &str,
    digest_bytes: &[u8],
) -> bool {
    let Ok(sig_bytes) =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_base64)
    else {
        return false;
    };
    ecdsa_verify(jwk_public_key, &sig_bytes, digest_bytes)
}
