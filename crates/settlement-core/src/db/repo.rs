//! SQLite-backed storage for users, wallets, settled transactions, and the
//! audit log. One `Mutex<Connection>` guards the whole database, the same
//! granularity used elsewhere in this codebase for a single-writer
//! embedded SQLite file.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::crypto::Jwk;
use crate::db::decimal::Money;
use crate::db::schema;
use crate::error::{SettlementError, WalletInvalidReason};
use crate::types::{AuditLogEntry, KycStatus, SettledTransaction, User, UserRole, Wallet, WalletStatus};

pub struct SettlementStore {
    conn: Mutex<Connection>,
}

fn wallet_status_str(status: WalletStatus) -> &'static str {
    match status {
        WalletStatus::Pending => "pending",
        WalletStatus::Approved => "approved",
        WalletStatus::Rejected => "rejected",
        WalletStatus::Suspended => "suspended",
    }
}

fn wallet_status_from_str(s: &str) -> Result<WalletStatus, SettlementError> {
    match s {
        "pending" => Ok(WalletStatus::Pending),
        "approved" => Ok(WalletStatus::Approved),
        "rejected" => Ok(WalletStatus::Rejected),
        "suspended" => Ok(WalletStatus::Suspended),
        other => Err(SettlementError::Internal(format!("unknown wallet status {other}"))),
    }
}

fn user_role_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Sender => "sender",
        UserRole::Receiver => "receiver",
    }
}

fn kyc_status_str(status: KycStatus) -> &'static str {
    match status {
        KycStatus::Pending => "pending",
        KycStatus::Verified => "verified",
        KycStatus::Rejected => "rejected",
    }
}

fn row_to_wallet(row: &rusqlite::Row<'_>) -> rusqlite::Result<Wallet> {
    let approved_limit: Money = row.get(2)?;
    let current_balance: Money = row.get(3)?;
    let used_amount: Money = row.get(4)?;
    let locked_amount: Money = row.get(5)?;
    let status_str: String = row.get(6)?;
    Ok(Wallet {
        wallet_id: row.get(0)?,
        user_id: row.get(1)?,
        approved_limit: approved_limit.0,
        current_balance: current_balance.0,
        used_amount: used_amount.0,
        locked_amount: locked_amount.0,
        status: wallet_status_from_str(&status_str).unwrap_or(WalletStatus::Suspended),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const WALLET_COLUMNS: &str =
    "wallet_id, user_id, approved_limit, current_balance, used_amount, locked_amount, status, created_at, updated_at";

impl SettlementStore {
    /// Open (or create) the settlement database at `path` and apply the
    /// schema.
    pub fn open(path: &str) -> Result<Self, SettlementError> {
        let conn = Connection::open(path)?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, SettlementError> {
        let conn = Connection::open_in_memory()?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn upsert_user(&self, user: &User) -> Result<(), SettlementError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (user_id, full_name, email_or_phone, role, bank_id, public_key, kyc_status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(user_id) DO UPDATE SET
                full_name = excluded.full_name,
                email_or_phone = excluded.email_or_phone,
                role = excluded.role,
                bank_id = excluded.bank_id,
                public_key = excluded.public_key,
                kyc_status = excluded.kyc_status,
                updated_at = excluded.updated_at",
            params![
                user.user_id,
                user.full_name,
                user.email_or_phone,
                user_role_str(user.role),
                user.bank_id,
                serde_json::to_string(&user.public_key)
                    .map_err(|e| SettlementError::Internal(e.to_string()))?,
                kyc_status_str(user.kyc_status),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn parse_public_key(text: &str) -> Result<Jwk, SettlementError> {
        serde_json::from_str(text).map_err(|e| SettlementError::Internal(e.to_string()))
    }

    pub fn find_user_by_bank_id(&self, bank_id: &str) -> Result<Option<User>, SettlementError> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT user_id, full_name, email_or_phone, role, bank_id, public_key, kyc_status, created_at, updated_at
                 FROM users WHERE bank_id = ?1",
                params![bank_id],
                |row| {
                    let role: String = row.get(3)?;
                    let public_key: String = row.get(5)?;
                    let kyc: String = row.get(6)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        role,
                        row.get::<_, String>(4)?,
                        public_key,
                        kyc,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;
        let Some((user_id, full_name, email_or_phone, role, bank_id, public_key, kyc, created_at, updated_at)) =
            found
        else {
            return Ok(None);
        };
        Ok(Some(User {
            user_id,
            full_name,
            email_or_phone,
            role: if role == "sender" { UserRole::Sender } else { UserRole::Receiver },
            bank_id,
            public_key: Self::parse_public_key(&public_key)?,
            kyc_status: match kyc.as_str() {
                "verified" => KycStatus::Verified,
                "rejected" => KycStatus::Rejected,
                _ => KycStatus::Pending,
            },
            created_at,
            updated_at,
        }))
    }

    pub fn find_wallet(&self, wallet_id: &str) -> Result<Option<Wallet>, SettlementError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE wallet_id = ?1");
        let wallet = conn.query_row(&sql, params![wallet_id], row_to_wallet).optional()?;
        Ok(wallet)
    }

    /// Resolve a wallet the way the settlement engine does: directly by
    /// `wallet_id` when present, or by the owning user's bank-visible
    /// identifier otherwise (spec.md §4.6 step 2).
    pub fn find_wallet_by_bank_id(&self, bank_id: &str) -> Result<Option<Wallet>, SettlementError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets
             JOIN users ON users.user_id = wallets.user_id
             WHERE users.bank_id = ?1"
        );
        let wallet = conn.query_row(&sql, params![bank_id], row_to_wallet).optional()?;
        Ok(wallet)
    }

    pub fn upsert_wallet(&self, wallet: &Wallet) -> Result<(), SettlementError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO wallets (wallet_id, user_id, approved_limit, current_balance, used_amount, locked_amount, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(wallet_id) DO UPDATE SET
                user_id = excluded.user_id,
                approved_limit = excluded.approved_limit,
                current_balance = excluded.current_balance,
                used_amount = excluded.used_amount,
                locked_amount = excluded.locked_amount,
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![
                wallet.wallet_id,
                wallet.user_id,
                Money(wallet.approved_limit),
                Money(wallet.current_balance),
                Money(wallet.used_amount),
                Money(wallet.locked_amount),
                wallet_status_str(wallet.status),
                now,
            ],
        )?;
        Ok(())
    }

    pub fn is_already_settled(&self, txn_id: &str) -> Result<bool, SettlementError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM settled_transactions WHERE txn_id = ?1",
            params![txn_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Debit `wallet_id` by `amount`, credit its `used_amount`, record the
    /// settled transaction, and append a `settle/success` audit row, all
    /// inside one SQLite transaction. Any failure — including a
    /// `UNIQUE(txn_id)` violation from a concurrent settlement of the same
    /// transaction, or the wallet no longer covering the amount — rolls
    /// everything back, including the audit row: a settlement is either
    /// fully visible or not visible at all (spec.md §4.6 step 5, §4.7).
    pub fn settle_transaction(
        &self,
        txn_id: &str,
        wallet_id: &str,
        from_user_id: &str,
        to_user_id: &str,
        receiver_id: &str,
        amount: Decimal,
        ledger_index: u64,
    ) -> Result<i64, SettlementError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let claimed = tx.execute(
            "INSERT INTO settled_transactions (txn_id, wallet_id, from_user_id, to_user_id, receiver_id, amount, ledger_index, settled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                txn_id,
                wallet_id,
                from_user_id,
                to_user_id,
                receiver_id,
                Money(amount),
                ledger_index as i64,
                Utc::now().to_rfc3339(),
            ],
        );
        if let Err(rusqlite::Error::SqliteFailure(e, _)) = &claimed {
            if e.code == rusqlite::ErrorCode::ConstraintViolation {
                return Err(SettlementError::AlreadySettled);
            }
        }
        claimed?;

        // `current_balance` is stored as TEXT so money never passes through a
        // float. That means SQL-side comparisons like `current_balance >= ?1`
        // would compare the column lexicographically, not numerically — so
        // the balance check happens here, in Rust, against the freshly-read
        // row, and the UPDATE below writes the computed amounts unconditionally
        // by primary key instead of re-deriving them in SQL.
        let wallet = row_to_wallet_opt(&tx, wallet_id)?;
        let reason = match &wallet {
            None => Some(WalletInvalidReason::NotFound),
            Some(w) if w.status != WalletStatus::Approved => Some(WalletInvalidReason::NotApproved),
            Some(w) if w.current_balance < amount => Some(WalletInvalidReason::InsufficientBalance),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(SettlementError::WalletInvalid { reason });
        }
        let wallet = wallet.expect("validated above");

        tx.execute(
            "UPDATE wallets
             SET current_balance = ?1, used_amount = ?2, updated_at = ?3
             WHERE wallet_id = ?4",
            params![
                Money(wallet.current_balance - amount),
                Money(wallet.used_amount + amount),
                Utc::now().to_rfc3339(),
                wallet_id,
            ],
        )?;

        let audit_id = append_audit_row(&tx, "bank", "settle", Some(txn_id), "success", None)?;
        tx.commit()?;
        Ok(audit_id)
    }

    pub fn append_audit(
        &self,
        actor: &str,
        action: &str,
        txn_id: Option<&str>,
        status: &str,
        details: Option<&str>,
    ) -> Result<i64, SettlementError> {
        let conn = self.conn.lock().unwrap();
        append_audit_row(&conn, actor, action, txn_id, status, details)
    }

    pub fn list_audit(&self, limit: i64, offset: i64) -> Result<Vec<AuditLogEntry>, SettlementError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, actor, action, txn_id, status, details, created_at
             FROM audit_logs ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit, offset], |row| {
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    actor: row.get(1)?,
                    action: row.get(2)?,
                    txn_id: row.get(3)?,
                    status: row.get(4)?,
                    details: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn find_settled_transaction(
        &self,
        txn_id: &str,
    ) -> Result<Option<SettledTransaction>, SettlementError> {
        let conn = self.conn.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT txn_id, wallet_id, from_user_id, to_user_id, receiver_id, amount, ledger_index, settled_at
                 FROM settled_transactions WHERE txn_id = ?1",
                params![txn_id],
                |row| {
                    let amount: Money = row.get(5)?;
                    Ok(SettledTransaction {
                        txn_id: row.get(0)?,
                        wallet_id: row.get(1)?,
                        from_user_id: row.get(2)?,
                        to_user_id: row.get(3)?,
                        receiver_id: row.get(4)?,
                        amount: amount.0,
                        ledger_index: row.get::<_, i64>(6)? as u64,
                        settled_at: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }
}

fn row_to_wallet_opt(conn: &Connection, wallet_id: &str) -> Result<Option<Wallet>, SettlementError> {
    let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE wallet_id = ?1");
    let wallet = conn.query_row(&sql, params![wallet_id], row_to_wallet).optional()?;
    Ok(wallet)
}

fn append_audit_row(
    conn: &Connection,
    actor: &str,
    action: &str,
    txn_id: Option<&str>,
    status: &str,
    details: Option<&str>,
) -> Result<i64, SettlementError> {
    conn.execute(
        "INSERT INTO audit_logs (actor, action, txn_id, status, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![actor, action, txn_id, status, details, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_jwk() -> Jwk {
        serde_json::from_value(serde_json::json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "MKBCTNIcKUSDii11ySs3526iDZ8AiTo7Tu6KPAqv7D4",
            "y": "4Etl6SRW2YiLUrN5vfvVHuhp7x8PxltmWWlbbM4IFGM"
        }))
        .unwrap()
    }

    fn seed_user(store: &SettlementStore, user_id: &str, bank_id: &str) {
        store
            .upsert_user(&User {
                user_id: user_id.to_string(),
                full_name: "Test User".to_string(),
                email_or_phone: format!("{user_id}@example.com"),
                role: UserRole::Sender,
                bank_id: bank_id.to_string(),
                public_key: sample_jwk(),
                kyc_status: KycStatus::Verified,
                created_at: String::new(),
                updated_at: String::new(),
            })
            .unwrap();
    }

    fn seed_wallet(store: &SettlementStore, wallet_id: &str, user_id: &str, balance: Decimal) {
        store
            .upsert_wallet(&Wallet {
                wallet_id: wallet_id.to_string(),
                user_id: user_id.to_string(),
                approved_limit: balance,
                current_balance: balance,
                used_amount: dec!(0.00),
                locked_amount: dec!(0.00),
                status: WalletStatus::Approved,
                created_at: String::new(),
                updated_at: String::new(),
            })
            .unwrap();
    }

    #[test]
    fn wallet_round_trips() {
        let store = SettlementStore::open_in_memory().unwrap();
        seed_user(&store, "alice", "alice-bank");
        seed_wallet(&store, "W1", "alice", dec!(100.00));
        let wallet = store.find_wallet("W1").unwrap().unwrap();
        assert_eq!(wallet.current_balance, dec!(100.00));
        assert_eq!(wallet.status, WalletStatus::Approved);
    }

    #[test]
    fn wallet_resolves_by_owners_bank_id() {
        let store = SettlementStore::open_in_memory().unwrap();
        seed_user(&store, "alice", "alice-bank");
        seed_wallet(&store, "W1", "alice", dec!(100.00));
        let wallet = store.find_wallet_by_bank_id("alice-bank").unwrap().unwrap();
        assert_eq!(wallet.wallet_id, "W1");
    }

    #[test]
    fn missing_wallet_is_none() {
        let store = SettlementStore::open_in_memory().unwrap();
        assert!(store.find_wallet("nope").unwrap().is_none());
    }

    #[test]
    fn settlement_debits_balance_credits_used_amount_and_records_audit() {
        let store = SettlementStore::open_in_memory().unwrap();
        seed_user(&store, "alice", "alice-bank");
        seed_wallet(&store, "W1", "alice", dec!(100.00));
        store
            .settle_transaction("T1", "W1", "alice", "bob", "bob", dec!(40.00), 0)
            .unwrap();

        let wallet = store.find_wallet("W1").unwrap().unwrap();
        assert_eq!(wallet.current_balance, dec!(60.00));
        assert_eq!(wallet.used_amount, dec!(40.00));
        assert_eq!(wallet.used_amount + wallet.current_balance, wallet.approved_limit);
        assert!(store.is_already_settled("T1").unwrap());

        let audit = store.list_audit(10, 0).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, "success");
        assert_eq!(audit[0].actor, "bank");
    }

    #[test]
    fn double_spend_is_rejected_by_uniqueness() {
        let store = SettlementStore::open_in_memory().unwrap();
        seed_user(&store, "alice", "alice-bank");
        seed_wallet(&store, "W1", "alice", dec!(100.00));
        store
            .settle_transaction("T1", "W1", "alice", "bob", "bob", dec!(10.00), 0)
            .unwrap();

        let second = store.settle_transaction("T1", "W1", "alice", "bob", "bob", dec!(10.00), 0);
        assert!(matches!(second, Err(SettlementError::AlreadySettled)));

        let wallet = store.find_wallet("W1").unwrap().unwrap();
        assert_eq!(wallet.current_balance, dec!(90.00), "rejected double-spend must not debit again");
    }

    #[test]
    fn insufficient_balance_rolls_back_with_no_partial_effects() {
        let store = SettlementStore::open_in_memory().unwrap();
        seed_user(&store, "alice", "alice-bank");
        seed_wallet(&store, "W1", "alice", dec!(5.00));

        let result = store.settle_transaction("T1", "W1", "alice", "bob", "bob", dec!(40.00), 0);
        assert!(matches!(
            result,
            Err(SettlementError::WalletInvalid {
                reason: WalletInvalidReason::InsufficientBalance
            })
        ));
        assert!(!store.is_already_settled("T1").unwrap());
        let wallet = store.find_wallet("W1").unwrap().unwrap();
        assert_eq!(wallet.current_balance, dec!(5.00));
    }

    #[test]
    fn unapproved_wallet_is_rejected() {
        let store = SettlementStore::open_in_memory().unwrap();
        seed_user(&store, "alice", "alice-bank");
        store
            .upsert_wallet(&Wallet {
                wallet_id: "W1".to_string(),
                user_id: "alice".to_string(),
                approved_limit: dec!(100.00),
                current_balance: dec!(100.00),
                used_amount: dec!(0.00),
                locked_amount: dec!(0.00),
                status: WalletStatus::Pending,
                created_at: String::new(),
                updated_at: String::new(),
            })
            .unwrap();

        let result = store.settle_transaction("T1", "W1", "alice", "bob", "bob", dec!(10.00), 0);
        assert!(matches!(
            result,
            Err(SettlementError::WalletInvalid {
                reason: WalletInvalidReason::NotApproved
            })
        ));
    }

    #[test]
    fn audit_log_lists_newest_first() {
        let store = SettlementStore::open_in_memory().unwrap();
        store.append_audit("bank", "a1", None, "success", None).unwrap();
        store.append_audit("bank", "a2", None, "success", None).unwrap();
        let entries = store.list_audit(10, 0).unwrap();
        assert_eq!(entries[0].action, "a2");
        assert_eq!(entries[1].action, "a1");
    }
}
