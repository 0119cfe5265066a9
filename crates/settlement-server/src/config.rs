//! Process configuration, sourced from the environment (spec.md §6).
//!
//! Only `DATABASE_PATH` is required; everything else has a default. There is
//! deliberately no in-memory fallback for the database path — an operator
//! who forgets to set it should get a loud startup failure, not a server
//! that silently loses every settlement on restart.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file backing `settlement-core`'s wallets, settled
    /// transactions, and audit log.
    pub database_path: String,
    /// On-disk JSON file holding the bank's ECDH-P256 keypair.
    pub bank_key_path: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Config {
    /// Read configuration from the process environment, panicking with a
    /// descriptive message if a required value is missing or malformed —
    /// the teacher's `std::env::var(...).expect(...)` style, kept
    /// consistent across every required setting rather than failing later
    /// with a confusing error deep in the database layer.
    pub fn from_env() -> Self {
        let database_path = std::env::var("DATABASE_PATH")
            .expect("DATABASE_PATH environment variable is required (no in-memory fallback)");

        let bank_key_path =
            std::env::var("BANK_KEY_PATH").unwrap_or_else(|_| "./bank-ecdh-key.json".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8402);

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            database_path,
            bank_key_path,
            port,
            request_timeout: Duration::from_secs(request_timeout_secs),
        }
    }
}
