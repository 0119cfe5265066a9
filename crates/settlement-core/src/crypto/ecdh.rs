//! ECDH-P256 key agreement.

use super::Jwk;
use p256::ecdh::diffie_hellman;
use p256::{NonZeroScalar, PublicKey};

/// Derive the raw shared secret (the X coordinate of the agreed point) from
/// a local private key and a peer's public key.
///
/// This is the raw ECDH output, not yet a symmetric key — it must still be
/// passed through HKDF ([`super::hkdf_sha256`]) before use, matching what
/// `window.crypto.subtle.deriveBits({ name: "ECDH" }, ...)` produces.
pub fn ecdh_derive_bits(
    local_private_key: &NonZeroScalar,
    peer_public_key: &PublicKey,
) -> [u8; 32] {
    let shared = diffie_hellman(local_private_key, peer_public_key.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    out
}

/// Parse a peer's public key from its JWK representation.
pub fn public_key_from_jwk(jwk: &Jwk) -> Result<PublicKey, String> {
    PublicKey::from_jwk(jwk).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;
    use rand::rngs::OsRng;

    #[test]
    fn both_sides_derive_the_same_secret() {
        let alice = SecretKey::random(&mut OsRng);
        let bob = SecretKey::random(&mut OsRng);

        let alice_shared = ecdh_derive_bits(&alice.to_nonzero_scalar(), &bob.public_key());
        let bob_shared = ecdh_derive_bits(&bob.to_nonzero_scalar(), &alice.public_key());
        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn different_peers_derive_different_secrets() {
        let alice = SecretKey::random(&mut OsRng);
        let bob = SecretKey::random(&mut OsRng);
        let carol = SecretKey::random(&mut OsRng);

        let with_bob = ecdh_derive_bits(&alice.to_nonzero_scalar(), &bob.public_key());
        let with_carol = ecdh_derive_bits(&alice.to_nonzero_scalar(), &carol.public_key());
        assert_ne!(with_bob, with_carol);
    }

    #[test]
    fn public_key_from_jwk_round_trips() {
        let key = SecretKey::random(&mut OsRng);
        let jwk = key.public_key().to_jwk();
        let parsed = public_key_from_jwk(&jwk).unwrap();
        assert_eq!(parsed, key.public_key());
    }
}
