use std::sync::Arc;

use settlement_core::db::SettlementStore;
use settlement_keymanager::BankIdentity;

use crate::config::Config;

/// Shared application state for the settlement server.
pub struct AppState {
    pub store: Arc<SettlementStore>,
    pub bank: Arc<BankIdentity>,
    pub config: Config,
}
