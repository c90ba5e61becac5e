//! Account store
//!
//! - [`models`]: account, entry and transfer records
//! - [`queries`]: single-statement query layer
//! - [`tx`]: transaction executor and its cancellation context
//! - [`transfer`]: atomic transfer orchestration
//! - [`error`]: error type shared by all of the above

pub mod error;
pub mod models;
pub mod queries;
pub mod transfer;
pub mod tx;

pub use error::{ErrorKind, StoreError};
pub use models::{Account, Entry, Transfer};
pub use queries::{AccountRepository, EntryRepository, TransferRepository};
pub use transfer::{TransferTxParams, TransferTxResult, UpdateOrder, balance_update_order};
pub use tx::{CancelHandle, TxContext};

use sqlx::PgPool;

/// Entry point for transactional operations. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Pool for non-transactional reads and CRUD
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
