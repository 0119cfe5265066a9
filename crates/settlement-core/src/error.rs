//! Error taxonomy for the settlement core.
//!
//! [`SettlementError`] covers every failure mode surfaced by this crate:
//! envelope/crypto failures that reject a whole submission, per-entry ledger
//! failures that are collected without aborting the walk, wallet-validation
//! failures, the idempotent "already settled" condition, and
//! internal/database errors.

use thiserror::Error;

/// Errors returned by settlement-core operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The envelope is missing required fields or its base64/JSON is malformed.
    #[error("envelope malformed: {0}")]
    EnvelopeMalformed(String),

    /// An AES-GCM tag check failed, for either the wrapped key or the payload.
    /// Key-mismatch and payload-corruption are deliberately not distinguished.
    #[error("envelope decryption failed")]
    DecryptFailed,

    /// A transaction is missing a required canonical-encoding field.
    #[error("canonical form error: {0}")]
    CanonicalFormError(String),

    /// A transaction's stored `hash` does not match its recomputed hash.
    #[error("transaction hash mismatch at entry {entry_index}")]
    HashMismatch { entry_index: u64 },

    /// A ledger entry's `hash` does not equal SHA256(prev || transaction.hash).
    #[error("ledger hash mismatch at entry {entry_index}")]
    ChainMismatch { entry_index: u64 },

    /// An ECDSA signature (ledger-level or transaction-level) failed to verify.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// A wallet failed validation during settlement.
    #[error("wallet invalid: {reason}")]
    WalletInvalid { reason: WalletInvalidReason },

    /// Soft condition: the transaction was already settled. Not an error from
    /// the client's perspective — the caller should report it idempotently.
    #[error("already settled")]
    AlreadySettled,

    /// Database error, storage IO error, or any other failure that requires
    /// rolling back the enclosing transaction.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Sub-reasons for [`SettlementError::WalletInvalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletInvalidReason {
    NotFound,
    NotApproved,
    InsufficientBalance,
}

impl std::fmt::Display for WalletInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletInvalidReason::NotFound => "not_found",
            WalletInvalidReason::NotApproved => "not_approved",
            WalletInvalidReason::InsufficientBalance => "insufficient_balance",
        };
        f.write_str(s)
    }
}

impl From<rusqlite::Error> for SettlementError {
    fn from(e: rusqlite::Error) -> Self {
        SettlementError::Internal(format!("database error: {e}"))
    }
}

impl From<serde_json::Error> for SettlementError {
    fn from(e: serde_json::Error) -> Self {
        SettlementError::EnvelopeMalformed(format!("invalid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_invalid_reason_displays_snake_case() {
        assert_eq!(WalletInvalidReason::NotFound.to_string(), "not_found");
        assert_eq!(WalletInvalidReason::NotApproved.to_string(), "not_approved");
        assert_eq!(
            WalletInvalidReason::InsufficientBalance.to_string(),
            "insufficient_balance"
        );
    }
}
