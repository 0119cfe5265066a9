//! Cryptographic primitives: hashing, ECDSA verification, ECDH key
//! agreement, HKDF key derivation, and AES-GCM encryption.
//!
//! Every public-key value that crosses this module's boundary is a JWK
//! ([`Jwk`]); internally keys are opaque `p256` types. A signature-verify
//! failure and a GCM tag failure are distinct, deliberately: see
//! [`crate::error::SettlementError::SignatureInvalid`] vs
//! [`crate::error::SettlementError::DecryptFailed`].

mod aead;
mod ecdh;
mod ecdsa;
mod hash;
mod hkdf_wrap;

pub use aead::{aes_gcm_decrypt, aes_gcm_encrypt};
pub use ecdh::{ecdh_derive_bits, public_key_from_jwk};
pub use ecdsa::{ecdsa_verify, ecdsa_verify_hex_jwk_sig};
pub use hash::{sha256, sha256_hex};
pub use hkdf_wrap::hkdf_sha256;

/// A P-256 key in JWK form, the only shape public-key material takes at this
/// module's boundary (interoperable with browser `window.crypto.subtle`).
pub type Jwk = elliptic_curve::JwkEcKey;

/// Info string used for the envelope's AES-key-wrapping HKDF step.
pub const AES_KEY_WRAPPING_INFO: &[u8] = b"aes-key-wrapping";
