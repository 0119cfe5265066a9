//! Table definitions and migration entry point.
//!
//! Four tables per spec.md §4.8: `users`, `wallets`, `settled_transactions`,
//! and `audit_logs`. Monetary columns are `TEXT` holding exact decimal
//! strings ([`super::decimal::Money`]) — `REAL` is never used for money.

use rusqlite::Connection;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    email_or_phone TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('sender', 'receiver')),
    bank_id TEXT NOT NULL,
    public_key TEXT NOT NULL,
    kyc_status TEXT NOT NULL DEFAULT 'pending' CHECK (kyc_status IN ('pending', 'verified', 'rejected')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (email_or_phone, role),
    UNIQUE (bank_id, role)
);

CREATE TABLE IF NOT EXISTS wallets (
    wallet_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users (user_id) ON DELETE RESTRICT,
    approved_limit TEXT NOT NULL,
    current_balance TEXT NOT NULL,
    used_amount TEXT NOT NULL,
    locked_amount TEXT NOT NULL DEFAULT '0',
    status TEXT NOT NULL CHECK (status IN ('pending', 'approved', 'rejected', 'suspended')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wallets_user_id ON wallets (user_id);

CREATE TABLE IF NOT EXISTS settled_transactions (
    txn_id TEXT PRIMARY KEY,
    wallet_id TEXT NOT NULL REFERENCES wallets (wallet_id) ON DELETE RESTRICT,
    from_user_id TEXT NOT NULL REFERENCES users (user_id) ON DELETE RESTRICT,
    to_user_id TEXT NOT NULL REFERENCES users (user_id) ON DELETE RESTRICT,
    receiver_id TEXT NOT NULL,
    amount TEXT NOT NULL,
    ledger_index INTEGER NOT NULL,
    settled_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor TEXT NOT NULL CHECK (actor IN ('bank', 'sender', 'receiver')),
    action TEXT NOT NULL,
    txn_id TEXT,
    status TEXT NOT NULL CHECK (status IN ('success', 'error')),
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs (created_at DESC);
"#;

/// Apply the schema. Idempotent: safe to call on every process start.
pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
