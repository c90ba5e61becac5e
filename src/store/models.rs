//! Account, entry and transfer records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::error::StoreError;

/// Currencies accounts may be denominated in
pub const SUPPORTED_CURRENCIES: [&str; 3] = ["USD", "EUR", "CAD"];

pub fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&currency)
}

pub fn check_currency(currency: &str) -> Result<(), StoreError> {
    if is_supported_currency(currency) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedCurrency(currency.to_string()))
    }
}

/// A balance-holding account, denominated in one currency.
///
/// `balance` is in minor currency units and only moves through a transfer or
/// an explicit administrative update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Account {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "alice")]
    pub owner: String,
    #[schema(example = 10000)]
    pub balance: i64,
    #[schema(example = "USD")]
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Signed balance adjustment on one account. Negative is a debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    #[schema(example = -30)]
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Directed movement of a positive amount between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    #[schema(example = 30)]
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Query parameters
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy)]
pub struct UpdateAccountParams {
    pub id: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ListAccountsParams {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Transfers leaving `from_account_id` or arriving at `to_account_id`
#[derive(Debug, Clone, Copy)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}
