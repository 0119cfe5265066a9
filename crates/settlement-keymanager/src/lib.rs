//! Bank key lifecycle: generates, persists, and exposes the bank's
//! long-lived ECDH-P256 keypair used to unwrap encrypted ledger envelopes.
//!
//! Kept as its own crate so a hardware-backed provider (an HSM, a cloud KMS)
//! can be substituted for [`BankIdentity`] without touching `settlement-core`
//! — anything implementing [`settlement_core::envelope::EnvelopeKeyAgreement`]
//! works at the envelope-codec boundary.

use std::path::Path;

use chrono::{DateTime, Utc};
use p256::SecretKey;
use serde::{Deserialize, Serialize};
use settlement_core::crypto::{ecdh_derive_bits, public_key_from_jwk, Jwk};
use settlement_core::envelope::EnvelopeKeyAgreement;
use settlement_core::error::SettlementError;

#[derive(Debug, thiserror::Error)]
pub enum KeyManagerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed key file: {0}")]
    Parse(String),
}

/// On-disk representation. The private half is a JWK so it round-trips
/// through `p256::SecretKey::from_jwk`/`to_jwk` without a custom encoding.
#[derive(Serialize, Deserialize)]
struct PersistedBankKey {
    private_jwk: Jwk,
    created_at: String,
}

/// The bank's ECDH-P256 keypair, loaded once at process start and held for
/// the lifetime of the server.
///
/// `Debug` is intentionally not derived: the private key must never end up
/// in a log line by accident, the same discipline this codebase already
/// applies to other long-lived secrets.
pub struct BankIdentity {
    private_key: SecretKey,
    public_jwk: Jwk,
    created_at: DateTime<Utc>,
}

impl BankIdentity {
    /// Load the bank keypair from `path`, generating and persisting a new
    /// one if the file doesn't exist yet.
    pub fn load_or_generate(path: &str) -> Result<Self, KeyManagerError> {
        let file_path = Path::new(path);

        if file_path.exists() {
            tracing::info!("loading existing bank key from {}", path);
            let data = std::fs::read_to_string(file_path)?;
            let persisted: PersistedBankKey = serde_json::from_str(&data)
                .map_err(|e| KeyManagerError::Parse(format!("invalid key JSON: {e}")))?;
            let private_key = SecretKey::from_jwk(&persisted.private_jwk)
                .map_err(|e| KeyManagerError::Parse(format!("invalid JWK: {e}")))?;
            let created_at = DateTime::parse_from_rfc3339(&persisted.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| KeyManagerError::Parse(format!("invalid created_at: {e}")))?;
            let public_jwk = private_key.public_key().to_jwk();
            return Ok(Self {
                private_key,
                public_jwk,
                created_at,
            });
        }

        tracing::info!("generating new bank key at {}", path);
        let private_key = SecretKey::random(&mut rand::rngs::OsRng);
        let public_jwk = private_key.public_key().to_jwk();
        let created_at = Utc::now();

        if let Some(parent_dir) = file_path.parent() {
            if !parent_dir.as_os_str().is_empty() {
                std::fs::create_dir_all(parent_dir)?;
            }
        }

        let persisted = PersistedBankKey {
            private_jwk: private_key.to_jwk(),
            created_at: created_at.to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| KeyManagerError::Parse(format!("serialize failed: {e}")))?;
        std::fs::write(file_path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file_path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!("bank key generated");
        Ok(Self {
            private_key,
            public_jwk,
            created_at,
        })
    }

    /// The bank's public key in JWK form, safe to expose over HTTP.
    pub fn public_jwk(&self) -> &Jwk {
        &self.public_jwk
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl EnvelopeKeyAgreement for BankIdentity {
    fn agree(&self, peer_public_key: &Jwk) -> Result<[u8; 32], SettlementError> {
        let peer = public_key_from_jwk(peer_public_key)
            .map_err(SettlementError::EnvelopeMalformed)?;
        Ok(ecdh_derive_bits(&self.private_key.to_nonzero_scalar(), &peer))
    }
}
