//! Settlement engine: turns a verified ledger into wallet debits, guarding
//! against double-spend and rejecting transactions against wallets that
//! don't exist, aren't approved, or can't cover the amount.
//!
//! Each entry moves through one of these terminal states: `rejected`
//! (failed ledger verification), `already_settled` (idempotent replay of a
//! `txn_id` seen before), `wallet_invalid` (wallet missing, not approved,
//! or insufficient balance), or `settled`. Every state transition produces
//! exactly one audit row (spec.md §4.6, §4.7).

use crate::audit::AuditLog;
use crate::db::SettlementStore;
use crate::error::SettlementError;
use crate::ledger::LedgerVerification;
use crate::types::{EntryError, LedgerEntry, PlainLedger, VerificationStatus};

/// Outcome of settling an entire verified ledger.
///
/// `already_settled` is kept apart from `errors`: replaying a `txn_id` that
/// already settled is idempotent, not a failure, from the client's
/// perspective (spec.md §4.6 step 1, §7, §8 scenario 2) — it is neither a
/// fresh settlement nor a genuine error.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub settled_transactions: Vec<String>,
    pub already_settled: Vec<String>,
    pub errors: Vec<EntryError>,
    pub audit_log_ids: Vec<i64>,
}

impl SettlementOutcome {
    /// Whether the ledger settled with no genuine failures. Entries that
    /// were already settled on a prior submission do not count against this.
    pub fn settled(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Resolve the wallet a transaction settles against: by `wallet_id` when
/// present, falling back to the sender's bank-visible `from_id` otherwise
/// (spec.md §4.6 step 2).
fn resolve_wallet(
    store: &SettlementStore,
    entry: &LedgerEntry,
) -> Result<Option<crate::types::Wallet>, SettlementError> {
    let transaction = &entry.transaction;
    match transaction.wallet_id.as_deref().filter(|id| !id.is_empty()) {
        Some(wallet_id) => store.find_wallet(wallet_id),
        None => store.find_wallet_by_bank_id(&transaction.from_id),
    }
}

fn settle_one(store: &SettlementStore, entry: &LedgerEntry) -> Result<i64, SettlementError> {
    let transaction = &entry.transaction;

    if store.is_already_settled(&transaction.txn_id)? {
        return Err(SettlementError::AlreadySettled);
    }

    let wallet = resolve_wallet(store, entry)?.ok_or(SettlementError::WalletInvalid {
        reason: crate::error::WalletInvalidReason::NotFound,
    })?;
    if wallet.status != crate::types::WalletStatus::Approved {
        return Err(SettlementError::WalletInvalid {
            reason: crate::error::WalletInvalidReason::NotApproved,
        });
    }
    if wallet.current_balance < transaction.amount {
        return Err(SettlementError::WalletInvalid {
            reason: crate::error::WalletInvalidReason::InsufficientBalance,
        });
    }

    store.settle_transaction(
        &transaction.txn_id,
        &wallet.wallet_id,
        &transaction.from_id,
        &transaction.to_id,
        &transaction.to_id,
        transaction.amount,
        entry.ledger_index,
    )
}

/// Settle every entry in `ledger` whose verification passed, under a
/// single logical pass: each entry's database work is its own atomic
/// transaction (see [`SettlementStore::settle_transaction`]), so one
/// entry's failure never blocks its siblings from settling — but the
/// response as a whole reports `settled=false` (via a non-empty `errors`)
/// whenever any entry genuinely failed, per spec.md §8 scenario 5. A
/// `txn_id` that was already settled by a prior submission is reported in
/// `already_settled`, not `errors` (spec.md §4.6 step 1, §7).
pub fn settle_ledger(
    store: &SettlementStore,
    ledger: &PlainLedger,
    verification: &LedgerVerification,
) -> SettlementOutcome {
    let audit = AuditLog::new(store);
    let mut outcome = SettlementOutcome {
        settled_transactions: Vec::new(),
        already_settled: Vec::new(),
        errors: Vec::new(),
        audit_log_ids: Vec::new(),
    };

    for (entry, verified) in ledger.entries.iter().zip(verification.verified_entries.iter()) {
        debug_assert_eq!(entry.transaction.txn_id, verified.txn_id);

        if verified.status != VerificationStatus::Valid {
            let reason = verified.error.clone().unwrap_or_else(|| "invalid".to_string());
            let audit_id = audit
                .record(
                    "bank",
                    "reject",
                    Some(&entry.transaction.txn_id),
                    "error",
                    Some(&reason),
                )
                .unwrap_or(-1);
            outcome.audit_log_ids.push(audit_id);
            outcome.errors.push(EntryError {
                ledger_index: entry.ledger_index,
                reason,
            });
            continue;
        }

        match settle_one(store, entry) {
            Ok(audit_id) => {
                outcome.audit_log_ids.push(audit_id);
                outcome.settled_transactions.push(entry.transaction.txn_id.clone());
            }
            Err(SettlementError::AlreadySettled) => {
                let audit_id = audit
                    .record(
                        "bank",
                        "settle",
                        Some(&entry.transaction.txn_id),
                        "success",
                        Some("already_settled"),
                    )
                    .unwrap_or(-1);
                outcome.audit_log_ids.push(audit_id);
                outcome.already_settled.push(entry.transaction.txn_id.clone());
            }
            Err(SettlementError::WalletInvalid { reason }) => {
                let detail = reason.to_string();
                let audit_id = audit
                    .record(
                        "bank",
                        "settle",
                        Some(&entry.transaction.txn_id),
                        "error",
                        Some(&detail),
                    )
                    .unwrap_or(-1);
                outcome.audit_log_ids.push(audit_id);
                outcome.errors.push(EntryError {
                    ledger_index: entry.ledger_index,
                    reason: format!("wallet_invalid: {detail}"),
                });
            }
            Err(other) => {
                let detail = other.to_string();
                let audit_id = audit
                    .record(
                        "bank",
                        "settle",
                        Some(&entry.transaction.txn_id),
                        "error",
                        Some(&detail),
                    )
                    .unwrap_or(-1);
                outcome.audit_log_ids.push(audit_id);
                outcome.errors.push(EntryError {
                    ledger_index: entry.ledger_index,
                    reason: detail,
                });
            }
        }
    }

    outcome
}
