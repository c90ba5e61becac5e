//! Store error types
//!
//! Every failure of the query layer, the transaction executor and the transfer
//! orchestrator is a [`StoreError`]. Callers branch on [`StoreError::kind`];
//! the gateway maps kinds to HTTP status codes.

use thiserror::Error;

/// SQLSTATE for `serialization_failure`
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`
const DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE for `query_canceled`, raised when `statement_timeout` fires
const QUERY_CANCELED: &str = "57014";
/// SQLSTATE for `foreign_key_violation`
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// SQLSTATE class for integrity constraint violations
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Constraint,
    Transactional,
    Cancelled,
    Database,
}

#[derive(Error, Debug)]
pub enum StoreError {
    // === Not found ===
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Transfer not found: {0}")]
    TransferNotFound(i64),

    // === Validation ===
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(i64),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: i64,
        expected: String,
        actual: String,
    },

    #[error("Source and destination accounts are the same")]
    SameAccount,

    // === Storage engine ===
    #[error("Serialization conflict: {0}")]
    Conflict(#[source] sqlx::Error),

    #[error("Constraint violation: {0}")]
    Constraint(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    // === Transaction boundary ===
    #[error("Commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("{source}; rollback also failed: {rollback}")]
    Rollback {
        #[source]
        source: Box<StoreError>,
        rollback: sqlx::Error,
    },

    #[error("Transaction cancelled")]
    Cancelled,

    #[error("Transaction deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::AccountNotFound(_)
            | StoreError::EntryNotFound(_)
            | StoreError::TransferNotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidAmount(_)
            | StoreError::UnsupportedCurrency(_)
            | StoreError::CurrencyMismatch { .. }
            | StoreError::SameAccount => ErrorKind::Validation,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Constraint(_) => ErrorKind::Constraint,
            StoreError::Commit(_) | StoreError::Rollback { .. } => ErrorKind::Transactional,
            StoreError::Cancelled | StoreError::DeadlineExceeded => ErrorKind::Cancelled,
            StoreError::Database(_) => ErrorKind::Database,
        }
    }

    /// Error code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            StoreError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            StoreError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            StoreError::InvalidAmount(_) => "INVALID_AMOUNT",
            StoreError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            StoreError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            StoreError::SameAccount => "SAME_ACCOUNT",
            StoreError::Conflict(_) => "CONFLICT",
            StoreError::Constraint(_) => "CONSTRAINT_VIOLATION",
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Commit(_) => "COMMIT_FAILED",
            StoreError::Rollback { .. } => "ROLLBACK_FAILED",
            StoreError::Cancelled => "CANCELLED",
            StoreError::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    ///
    /// Nothing in this crate retries; this only tells the caller it may.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Rollback { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// SQLSTATE of a database-reported error
fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Name of the foreign key behind a `foreign_key_violation`, if that is what `err` is
pub(crate) fn violated_foreign_key(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            db_err.constraint()
        }
        _ => None,
    }
}

impl StoreError {
    /// Classify a failed `COMMIT`. Server-reported errors (a serialization
    /// failure surfacing at commit, a deferred constraint) keep their
    /// SQLSTATE meaning, anything else is a [`StoreError::Commit`].
    pub(crate) fn from_commit(e: sqlx::Error) -> Self {
        match sqlstate(&e) {
            Some(_) => e.into(),
            None => StoreError::Commit(e),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match sqlstate(&e).as_deref() {
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => StoreError::Conflict(e),
            Some(QUERY_CANCELED) => StoreError::DeadlineExceeded,
            Some(code) if code.starts_with(INTEGRITY_CONSTRAINT_CLASS) => StoreError::Constraint(e),
            _ => StoreError::Database(e),
        }
    }
}
