//! Atomic transfer between two accounts
//!
//! One transfer writes five rows inside a single transaction: the transfer
//! record, one entry per side, and the two account balances. Balance updates
//! always touch the lower account ID first, so two transfers moving money in
//! opposite directions between the same pair lock the rows in the same order
//! and never wait on each other in a cycle.

use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use utoipa::ToSchema;

use super::Store;
use super::error::StoreError;
use super::models::{
    Account, AddAccountBalanceParams, CreateEntryParams, CreateTransferParams, Entry, Transfer,
};
use super::queries::{AccountRepository, EntryRepository, TransferRepository};
use super::tx::TxContext;

/// Input of [`Store::transfer_tx`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferTxParams {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.amount <= 0 {
            return Err(StoreError::InvalidAmount(self.amount));
        }
        Ok(())
    }
}

/// Everything a committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Which side's balance is updated first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrder {
    FromFirst,
    ToFirst,
}

/// Lower account ID first, regardless of direction. Ties go to the source.
pub fn balance_update_order(from_account_id: i64, to_account_id: i64) -> UpdateOrder {
    if from_account_id <= to_account_id {
        UpdateOrder::FromFirst
    } else {
        UpdateOrder::ToFirst
    }
}

impl Store {
    /// Move `amount` from one account to another, all or nothing.
    ///
    /// Account existence surfaces as [`StoreError::AccountNotFound`]. Any error
    /// rolls back every write. Conflicts reported by the database are returned
    /// as is; retrying is up to the caller.
    #[tracing::instrument(
        name = "transfer_tx",
        skip(self, ctx),
        fields(
            from = params.from_account_id,
            to = params.to_account_id,
            amount = params.amount
        )
    )]
    pub async fn transfer_tx(
        &self,
        ctx: &TxContext,
        params: TransferTxParams,
    ) -> Result<TransferTxResult, StoreError> {
        params.validate()?;

        let result = self
            .exec_tx(ctx, move |conn| Box::pin(apply_transfer(conn, params)))
            .await;

        match &result {
            Ok(r) => tracing::info!(
                transfer_id = r.transfer.id,
                from_balance = r.from_account.balance,
                to_balance = r.to_account.balance,
                "Transfer committed"
            ),
            Err(e) => tracing::warn!(code = e.code(), error = %e, "Transfer aborted"),
        }

        result
    }
}

async fn apply_transfer(
    conn: &mut PgConnection,
    params: TransferTxParams,
) -> Result<TransferTxResult, StoreError> {
    let TransferTxParams {
        from_account_id,
        to_account_id,
        amount,
    } = params;

    let transfer = TransferRepository::create(
        &mut *conn,
        CreateTransferParams {
            from_account_id,
            to_account_id,
            amount,
        },
    )
    .await?;

    let from_entry = EntryRepository::create(
        &mut *conn,
        CreateEntryParams {
            account_id: from_account_id,
            amount: -amount,
        },
    )
    .await?;

    let to_entry = EntryRepository::create(
        &mut *conn,
        CreateEntryParams {
            account_id: to_account_id,
            amount,
        },
    )
    .await?;

    let (from_account, to_account) = match balance_update_order(from_account_id, to_account_id) {
        UpdateOrder::FromFirst => {
            add_money(conn, from_account_id, -amount, to_account_id, amount).await?
        }
        UpdateOrder::ToFirst => {
            let (to_account, from_account) =
                add_money(conn, to_account_id, amount, from_account_id, -amount).await?;
            (from_account, to_account)
        }
    };

    Ok(TransferTxResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Two balance increments, in the order given
async fn add_money(
    conn: &mut PgConnection,
    first_id: i64,
    first_amount: i64,
    second_id: i64,
    second_amount: i64,
) -> Result<(Account, Account), StoreError> {
    let first = AccountRepository::add_balance(
        &mut *conn,
        AddAccountBalanceParams {
            id: first_id,
            amount: first_amount,
        },
    )
    .await?;

    let second = AccountRepository::add_balance(
        &mut *conn,
        AddAccountBalanceParams {
            id: second_id,
            amount: second_amount,
        },
    )
    .await?;

    Ok((first, second))
}
