//! Audit trail: an append-only record of every settlement decision.
//!
//! Rows for a successful settlement are written inside the settlement's own
//! database transaction ([`crate::db::repo::SettlementStore::settle_transaction`])
//! so they roll back together with the debit if anything downstream fails.
//! Rejection and failure rows are written in their own short transaction via
//! [`AuditLog::record`] and are always durable, independent of whatever else
//! is happening in the request.

use crate::db::SettlementStore;
use crate::error::SettlementError;
use crate::types::AuditLogEntry;

pub struct AuditLog<'a> {
    store: &'a SettlementStore,
}

impl<'a> AuditLog<'a> {
    pub fn new(store: &'a SettlementStore) -> Self {
        Self { store }
    }

    /// Append a standalone audit row, outside of any settlement transaction.
    pub fn record(
        &self,
        actor: &str,
        action: &str,
        txn_id: Option<&str>,
        status: &str,
        details: Option<&str>,
    ) -> Result<i64, SettlementError> {
        self.store.append_audit(actor, action, txn_id, status, details)
    }

    /// List the most recent entries, newest first.
    pub fn list(&self, limit: i64, offset: i64) -> Result<Vec<AuditLogEntry>, SettlementError> {
        self.store.list_audit(limit, offset)
    }
}
