//! Bank Ledger - monetary accounts with atomic transfers
//!
//! Accounts live in PostgreSQL. A transfer debits one account, credits
//! another and records a transfer plus two entries as one transaction, safe
//! under any number of concurrent transfers in either direction.
//!
//! # Modules
//!
//! - [`store`] - Records, query layer, transaction executor, transfer orchestration
//! - [`db`] - Connection pool and migrations
//! - [`gateway`] - HTTP API (axum)
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod store;

// Convenient re-exports at crate root
pub use db::Database;
pub use store::{
    Account, CancelHandle, Entry, ErrorKind, Store, StoreError, Transfer, TransferTxParams,
    TransferTxResult, TxContext,
};
