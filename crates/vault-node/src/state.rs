//! Application state.

use std::sync::Arc;

use vault_oracle::VaultCoordinator;
use vault_state::{InMemoryLedger, Ledger};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Vault operations.
    pub coordinator: Arc<VaultCoordinator>,

    /// Order counters.
    pub ledger: Arc<dyn Ledger>,
}

impl AppState {
    pub fn new(coordinator: Arc<VaultCoordinator>, ledger: Arc<dyn Ledger>) -> Self {
        Self { coordinator, ledger }
    }

    /// State with an empty in-memory ledger.
    pub fn in_memory(coordinator: Arc<VaultCoordinator>) -> Self {
        Self::new(coordinator, Arc::new(InMemoryLedger::new()))
    }
}
