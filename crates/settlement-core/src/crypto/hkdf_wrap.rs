//! HKDF-SHA256 key derivation.

use hkdf::Hkdf;
use sha2::Sha256;

/// Derive `output_len` bytes from `ikm` using HKDF-SHA256 with an empty salt
/// and the given `info` string.
///
/// An empty salt is equivalent to HKDF's "salt not provided" default (HMAC
/// zero-pads a short key to the block size either way), passed explicitly
/// here to document the choice rather than rely on the library default.
pub fn hkdf_sha256(ikm: &[u8], info: &[u8], output_len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(Some(&[]), ikm);
    let mut okm = vec![0u8; output_len];
    hk.expand(info, &mut okm)
        .expect("HKDF-SHA256 output length within 255*HashLen");
    okm
}
