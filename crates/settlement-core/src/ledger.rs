//! Ledger verification: hash-chain integrity, per-transaction signatures,
//! and the merchant's ledger-level signature.
//!
//! Every check runs to completion and every failure is collected — a
//! caller never sees verification stop at the first bad entry, and the
//! ledger signature is checked whether the submission arrived as an
//! [`crate::types::Envelope`] or a bare [`PlainLedger`]; there is no code
//! path that skips it.

use std::collections::HashSet;

use base64::Engine;

use crate::canonical::{self, CanonicalFields, CanonicalVariant};
use crate::crypto::{ecdsa_verify, ecdsa_verify_hex_jwk_sig, sha256_hex};
use crate::types::{EntryError, PlainLedger, VerificationStatus, VerifiedEntry};

/// Sentinel `prev_hash` value for the first entry in a ledger.
pub const GENESIS: &str = "GENESIS";

/// Outcome of verifying a whole ledger submission.
#[derive(Debug, Clone)]
pub struct LedgerVerification {
    pub valid: bool,
    pub verified_entries: Vec<VerifiedEntry>,
    /// Submission-level problems (bad merchant signature) that are not
    /// attributable to one entry.
    pub errors: Vec<EntryError>,
}

impl LedgerVerification {
    pub fn verified_transaction_ids(&self) -> Vec<String> {
        self.verified_entries
            .iter()
            .filter(|e| e.status == VerificationStatus::Valid)
            .map(|e| e.txn_id.clone())
            .collect()
    }
}

/// The merchant signs over the concatenation of every entry's hash, in
/// order. This is a deployment decision (spec.md §4.5 leaves "canonicalize
/// the ledger bytes exactly as the merchant did" to the implementer); since
/// each entry's hash already transitively covers everything before it, the
/// final entry's hash alone would suffice, but signing the full join keeps
/// an empty ledger's digest well-defined too. See DESIGN.md.
fn ledger_signature_digest(entries: &[crate::types::LedgerEntry]) -> [u8; 32] {
    let joined: String = entries.iter().map(|e| e.hash.as_str()).collect();
    crate::crypto::sha256(joined.as_bytes())
}

fn verify_ledger_signature(ledger: &PlainLedger) -> bool {
    let digest = ledger_signature_digest(&ledger.entries);
    ecdsa_verify_hex_jwk_sig(&ledger.merchant_public_key, &ledger.ledger_signature, &digest)
}

/// Verify one entry's transaction hash, chain hash, and signature.
///
/// Returns the canonical entry hash this entry *should* chain to — built
/// from the recomputed transaction hash, not the entry's own claimed one —
/// alongside the first failure reason, if any. The caller always advances
/// the rolling hash using this recomputed value rather than the entry's
/// claim, so a single tampered transaction breaks the chain for every entry
/// after it even when the attacker left the tampered entry's own `hash`
/// field untouched: that entry reports a plain transaction-hash mismatch,
/// and only the *next* entry's chain check fails, matching spec.md §8's
/// tamper scenario.
fn verify_entry(
    variant: CanonicalVariant,
    entry: &crate::types::LedgerEntry,
    expected_prev_entry_hash: &str,
    expected_ledger_index: u64,
) -> (String, Result<(), String>) {
    let transaction = &entry.transaction;

    let fields = CanonicalFields {
        txn_id: &transaction.txn_id,
        from_id: &transaction.from_id,
        to_id: &transaction.to_id,
        amount: transaction.amount,
        timestamp: &transaction.timestamp,
        prev_hash: &transaction.prev_hash,
        wallet_id: transaction.wallet_id.as_deref(),
    };
    let recomputed_txn_hash = match canonical::encode(variant, &fields) {
        Ok(encoded) => sha256_hex(&encoded),
        Err(e) => {
            let fallback = sha256_hex(format!("{expected_prev_entry_hash}{}", transaction.hash).as_bytes());
            return (fallback, Err(e.to_string()));
        }
    };

    let expected_entry_hash =
        sha256_hex(format!("{expected_prev_entry_hash}{recomputed_txn_hash}").as_bytes());

    let result = (|| {
        if recomputed_txn_hash != transaction.hash {
            return Err(format!(
                "transaction hash mismatch: recomputed {recomputed_txn_hash}, claimed {}",
                transaction.hash
            ));
        }

        if expected_entry_hash != entry.hash {
            return Err(format!(
                "ledger hash mismatch: recomputed {expected_entry_hash}, claimed {}",
                entry.hash
            ));
        }

        if entry.ledger_index != expected_ledger_index {
            return Err(format!(
                "index gap: expected {expected_ledger_index}, got {}",
                entry.ledger_index
            ));
        }

        let digest_bytes =
            hex::decode(&transaction.hash).map_err(|e| format!("malformed hash hex: {e}"))?;
        let signature_bytes = base64::engine::general_purpose::STANDARD
            .decode(&transaction.signature)
            .map_err(|e| format!("malformed signature base64: {e}"))?;
        if digest_bytes.len() != 32
            || !ecdsa_verify(&transaction.sender_public_key, &signature_bytes, &digest_bytes)
        {
            return Err("signature invalid".to_string());
        }

        Ok(())
    })();

    (expected_entry_hash, result)
}

/// Verify a whole ledger: the merchant's ledger-level signature, the
/// hash chain linking entries in order, and each transaction's own
/// signature. `variant` selects which canonical-encoding rule the
/// deployment signs under.
///
/// A single entry's failure never stops the walk — every entry is
/// examined and every error collected, per spec.md §4.5's policy, so a
/// client can repair its whole ledger in one round trip.
pub fn verify_ledger(ledger: &PlainLedger, variant: CanonicalVariant) -> LedgerVerification {
    let mut submission_errors = Vec::new();

    let ledger_signature_valid = verify_ledger_signature(ledger);
    if !ledger_signature_valid {
        submission_errors.push(EntryError {
            ledger_index: 0,
            reason: "ledger signature invalid".to_string(),
        });
    }

    let mut seen_txn_ids = HashSet::new();
    let mut verified_entries = Vec::with_capacity(ledger.entries.len());
    let mut all_entries_valid = true;
    let mut prev_entry_hash = GENESIS.to_string();

    for (position, entry) in ledger.entries.iter().enumerate() {
        let txn_id = entry.transaction.txn_id.clone();
        let is_duplicate = !seen_txn_ids.insert(txn_id.clone());

        let (canonical_entry_hash, outcome) =
            verify_entry(variant, entry, &prev_entry_hash, position as u64);
        let outcome = if is_duplicate {
            Err("duplicate txn in submission".to_string())
        } else {
            outcome
        };
        match outcome {
            Ok(()) => verified_entries.push(VerifiedEntry {
                ledger_index: entry.ledger_index,
                txn_id,
                status: VerificationStatus::Valid,
                error: None,
            }),
            Err(reason) => {
                all_entries_valid = false;
                verified_entries.push(VerifiedEntry {
                    ledger_index: entry.ledger_index,
                    txn_id,
                    status: VerificationStatus::Invalid,
                    error: Some(reason),
                });
            }
        }

        prev_entry_hash = canonical_entry_hash;
    }

    let errors = submission_errors
        .into_iter()
        .chain(verified_entries.iter().filter_map(|e| {
            e.error.as_ref().map(|reason| EntryError {
                ledger_index: e.ledger_index,
                reason: reason.clone(),
            })
        }))
        .collect();

    LedgerVerification {
        valid: ledger_signature_valid && all_entries_valid,
        verified_entries,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256_hex as hash_hex;
    use crate::types::{LedgerEntry, Transaction};
    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use p256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use rust_decimal_macros::dec;

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn build_transaction(
        signer: &SigningKey,
        txn_id: &str,
        prev_hash: &str,
        amount: rust_decimal::Decimal,
    ) -> Transaction {
        let public_key = p256::PublicKey::from(*signer.verifying_key());
        let fields = CanonicalFields {
            txn_id,
            from_id: "alice",
            to_id: "bob",
            amount,
            timestamp: "2026-07-27T00:00:00Z",
            prev_hash,
            wallet_id: None,
        };
        let encoded = canonical::encode(CanonicalVariant::Extended, &fields).unwrap();
        let hash = hash_hex(&encoded);
        let digest = hex::decode(&hash).unwrap();
        let signature: p256::ecdsa::Signature = signer.sign_prehash(&digest).unwrap();

        Transaction {
            txn_id: txn_id.to_string(),
            from_id: "alice".to_string(),
            to_id: "bob".to_string(),
            amount,
            timestamp: "2026-07-27T00:00:00Z".to_string(),
            prev_hash: prev_hash.to_string(),
            hash,
            signature: b64(signature.to_bytes().as_slice()),
            sender_public_key: public_key.to_jwk(),
            wallet_id: None,
        }
    }

    fn build_entry(ledger_index: u64, transaction: Transaction, prev_entry_hash: &str) -> LedgerEntry {
        let hash = hash_hex(format!("{prev_entry_hash}{}", transaction.hash).as_bytes());
        LedgerEntry {
            ledger_index,
            transaction,
            hash,
            status: Default::default(),
        }
    }

    fn build_ledger(entries: Vec<LedgerEntry>, merchant: &SigningKey) -> PlainLedger {
        let digest = ledger_signature_digest(&entries);
        let signature: p256::ecdsa::Signature = merchant.sign_prehash(&digest).unwrap();
        PlainLedger {
            entries,
            ledger_signature: b64(signature.to_bytes().as_slice()),
            merchant_public_key: p256::PublicKey::from(*merchant.verifying_key()).to_jwk(),
        }
    }

    #[test]
    fn an_empty_ledger_verifies_trivially() {
        let merchant = SigningKey::random(&mut OsRng);
        let ledger = build_ledger(vec![], &merchant);
        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.verified_entries.is_empty());
    }

    #[test]
    fn a_well_formed_chain_verifies() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let e1 = build_entry(0, t1.clone(), GENESIS);
        let t2 = build_transaction(&customer, "T2", &t1.hash, dec!(5.00));
        let e2 = build_entry(1, t2, &e1.hash);
        let ledger = build_ledger(vec![e1, e2], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert_eq!(result.verified_entries.len(), 2);
        assert!(result
            .verified_entries
            .iter()
            .all(|v| v.status == VerificationStatus::Valid));
    }

    #[test]
    fn tampered_amount_breaks_the_transaction_hash() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let mut e1 = build_entry(0, t1, GENESIS);
        e1.transaction.amount = dec!(999.00);
        let ledger = build_ledger(vec![e1], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert_eq!(result.verified_entries[0].status, VerificationStatus::Invalid);
        assert!(result.errors[0].reason.contains("transaction hash mismatch"));
    }

    #[test]
    fn tampered_entry_hash_breaks_the_chain() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let mut e1 = build_entry(0, t1, GENESIS);
        e1.hash = "0".repeat(64);
        let ledger = build_ledger(vec![e1], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.reason.contains("ledger hash mismatch")));
    }

    #[test]
    fn a_gap_in_ledger_index_is_detected() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let mut e1 = build_entry(0, t1, GENESIS);
        e1.ledger_index = 5;
        let ledger = build_ledger(vec![e1], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.reason.contains("index gap")));
    }

    #[test]
    fn duplicate_txn_id_is_rejected() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let e1 = build_entry(0, t1.clone(), GENESIS);
        let t2 = build_transaction(&customer, "T1", &t1.hash, dec!(5.00));
        let e2 = build_entry(1, t2, &e1.hash);
        let ledger = build_ledger(vec![e1, e2], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert_eq!(result.verified_entries[1].status, VerificationStatus::Invalid);
        assert!(result.errors.iter().any(|e| e.reason.contains("duplicate")));
    }

    #[test]
    fn a_tampered_amount_also_breaks_the_chain_for_later_entries() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let mut e1 = build_entry(0, t1.clone(), GENESIS);
        let t2 = build_transaction(&customer, "T2", &t1.hash, dec!(5.00));
        let e2 = build_entry(1, t2, &e1.hash);
        // Tamper only the amount after the chain was built; hash/entry.hash
        // fields are left as the merchant originally computed them.
        e1.transaction.amount = dec!(999.00);
        let ledger = build_ledger(vec![e1, e2], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert_eq!(result.verified_entries[0].status, VerificationStatus::Invalid);
        assert!(result.errors[0].reason.contains("transaction hash mismatch"));
        assert_eq!(result.verified_entries[1].status, VerificationStatus::Invalid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.ledger_index == 1 && e.reason.contains("ledger hash mismatch")));
    }

    #[test]
    fn tampered_ledger_signature_is_detected_even_when_entries_are_valid() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let other_merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let e1 = build_entry(0, t1, GENESIS);
        let mut ledger = build_ledger(vec![e1], &merchant);
        ledger.merchant_public_key = p256::PublicKey::from(*other_merchant.verifying_key()).to_jwk();

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.reason.contains("ledger signature")));
        assert!(result
            .verified_entries
            .iter()
            .all(|v| v.status == VerificationStatus::Valid));
    }

    #[test]
    fn a_tampered_tail_entry_still_lets_earlier_entries_verify() {
        let customer = SigningKey::random(&mut OsRng);
        let merchant = SigningKey::random(&mut OsRng);
        let t1 = build_transaction(&customer, "T1", GENESIS, dec!(10.00));
        let e1 = build_entry(0, t1.clone(), GENESIS);
        let t2 = build_transaction(&customer, "T2", &t1.hash, dec!(5.00));
        let mut e2 = build_entry(1, t2, &e1.hash);
        e2.transaction.signature = b64(&[0u8; 64]);
        let ledger = build_ledger(vec![e1, e2], &merchant);

        let result = verify_ledger(&ledger, CanonicalVariant::Extended);
        assert!(!result.valid);
        assert_eq!(result.verified_entries[0].status, VerificationStatus::Valid);
        assert_eq!(result.verified_entries[1].status, VerificationStatus::Invalid);
    }
}
