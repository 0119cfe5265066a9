//! Wire and domain types shared across the envelope codec, ledger verifier,
//! settlement engine, and audit log. Modeled as concrete record types per
//! field, not duck-typed maps — unknown fields are rejected at parse time
//! rather than silently dropped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::crypto::Jwk;

/// The atomic payment intent: produced by the customer, consumed by the
/// merchant and then by the bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transaction {
    pub txn_id: String,
    pub from_id: String,
    pub to_id: String,
    pub amount: Decimal,
    pub timestamp: String,
    /// Empty string or hex SHA-256 of the transaction this one's canonical
    /// encoding claims came before it.
    pub prev_hash: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wallet_id: Option<String>,
    /// Hex SHA-256 of this transaction's canonical encoding.
    pub hash: String,
    /// Base64 raw P1363 ECDSA signature over the raw bytes of `hash`.
    pub signature: String,
    pub sender_public_key: Jwk,
}

/// One entry in what the merchant accumulated offline: a transaction plus
/// the chain hash linking it to the entry before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerEntry {
    /// Strictly monotonic within one ledger, starting at 0.
    pub ledger_index: u64,
    pub transaction: Transaction,
    /// Hex SHA-256 of `prev_entry.hash || transaction.hash` (the literal
    /// string `GENESIS` standing in for `prev_entry.hash` at index 0).
    pub hash: String,
    /// The merchant's own local verdict for this entry. Not trusted by the
    /// verifier — it recomputes its own verdict from scratch — but carried
    /// on the wire because the merchant's offline bookkeeping produces it.
    #[serde(default)]
    pub status: EntryStatus,
}

/// Per-entry verdict produced by [`crate::ledger::verify_ledger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Valid,
    Invalid,
}

/// One entry's verification outcome, keyed by both its position and its
/// transaction id so callers can report either.
#[derive(Debug, Clone)]
pub struct VerifiedEntry {
    pub ledger_index: u64,
    pub txn_id: String,
    pub status: VerificationStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Verified,
    Rejected,
}

/// A ledger as submitted: an ordered list of entries plus one merchant-level
/// signature over the whole thing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlainLedger {
    pub entries: Vec<LedgerEntry>,
    /// Base64 raw P1363 signature over the canonical ledger bytes, made by
    /// the merchant's signing key.
    pub ledger_signature: String,
    pub merchant_public_key: Jwk,
}

/// An AES-GCM-wrapped ledger submission: the payload the merchant's backend
/// actually posts when the deployment is wired for envelope encryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Base64: 12-byte wrapping IV followed by the GCM-wrapped inner AES key.
    pub encrypted_aes_key: String,
    /// Base64-encoded 12-byte IV for the payload ciphertext.
    pub iv: String,
    /// Base64-encoded AES-GCM ciphertext of the UTF-8 JSON-encoded
    /// [`PlainLedger`].
    pub encrypted_payload: String,
    /// The merchant backend's ephemeral ECDH public key.
    pub receiver_public_key: Jwk,
}

/// What a settlement submission request actually is: either a plaintext
/// ledger or an encrypted envelope wrapping one. Distinguished by the
/// presence of `encrypted_payload` rather than a discriminant tag, matching
/// how the two shapes differ structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmissionInput {
    Envelope(Envelope),
    Plain(PlainLedger),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

/// A customer's escrowed spending allowance, as held in storage.
///
/// Invariant (enforced by [`crate::db::repo::SettlementStore`] on every
/// debit): `used_amount + current_balance == approved_limit` and
/// `current_balance >= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: String,
    pub user_id: String,
    pub approved_limit: Decimal,
    pub current_balance: Decimal,
    pub used_amount: Decimal,
    pub locked_amount: Decimal,
    pub status: WalletStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A sender or receiver user record, per §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Sender,
    Receiver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub full_name: String,
    pub email_or_phone: String,
    pub role: UserRole,
    /// The user-visible bank identifier used as `from_id`/`to_id` in a
    /// [`Transaction`].
    pub bank_id: String,
    pub public_key: Jwk,
    pub kyc_status: KycStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// A single entry's verification or settlement failure, keyed by its
/// position in the submitted ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryError {
    pub ledger_index: u64,
    pub reason: String,
}

/// A transaction that has been durably settled against a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledTransaction {
    pub txn_id: String,
    pub wallet_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    /// The bank identifier of the merchant/device that submitted the
    /// ledger this entry settled from. Mirrors `to_user_id` in this
    /// deployment, since the wire format does not carry a separate
    /// merchant-device identifier on the ledger envelope (see DESIGN.md).
    pub receiver_id: String,
    pub amount: Decimal,
    pub ledger_index: u64,
    pub settled_at: String,
}

/// An immutable row in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub created_at: String,
}
