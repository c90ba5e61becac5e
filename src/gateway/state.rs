use std::time::Duration;

use crate::store::Store;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    /// Account store (pool + transfer orchestration)
    pub store: Store,
    /// Deadline applied to every transfer transaction
    pub transfer_timeout: Duration,
}

impl AppState {
    pub fn new(store: Store, transfer_timeout: Duration) -> Self {
        Self {
            store,
            transfer_timeout,
        }
    }
}
