//! Query layer: single-statement operations on accounts, entries and transfers
//!
//! Every function takes any [`PgExecutor`], so the same call runs against the
//! pool (`&PgPool`) or inside a transaction (`&mut *conn`).

use sqlx::PgExecutor;

use super::error::{StoreError, violated_foreign_key};
use super::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer,
    UpdateAccountParams,
};

/// Map a foreign-key violation on one of `keys` to the account it names
fn missing_account(e: sqlx::Error, keys: &[(&str, i64)]) -> StoreError {
    let missing = violated_foreign_key(&e)
        .and_then(|name| keys.iter().find(|(key, _)| *key == name).map(|(_, id)| *id));
    match missing {
        Some(id) => StoreError::AccountNotFound(id),
        None => e.into(),
    }
}

/// Account repository for CRUD operations
pub struct AccountRepository;

impl AccountRepository {
    /// Create a new account
    pub async fn create<'e, E>(executor: E, params: &CreateAccountParams) -> Result<Account, StoreError>
    where
        E: PgExecutor<'e>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3)
               RETURNING id, owner, balance, currency, created_at"#,
        )
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    /// Get account by ID
    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Account, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(
            r#"SELECT id, owner, balance, currency, created_at
               FROM accounts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(StoreError::AccountNotFound(id))
    }

    /// List accounts ordered by ID
    pub async fn list<'e, E>(executor: E, params: ListAccountsParams) -> Result<Vec<Account>, StoreError>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Account>(
            r#"SELECT id, owner, balance, currency, created_at
               FROM accounts ORDER BY id LIMIT $1 OFFSET $2"#,
        )
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Administrative balance update
    pub async fn update<'e, E>(executor: E, params: UpdateAccountParams) -> Result<Account, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(
            r#"UPDATE accounts SET balance = $2 WHERE id = $1
               RETURNING id, owner, balance, currency, created_at"#,
        )
        .bind(params.id)
        .bind(params.balance)
        .fetch_optional(executor)
        .await?
        .ok_or(StoreError::AccountNotFound(params.id))
    }

    /// Delete an account. Fails with a constraint violation while entries or
    /// transfers still reference it.
    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<(), StoreError>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(id));
        }
        Ok(())
    }

    /// Atomic increment: read and write the balance in one statement under the
    /// row lock, returning the post-update row.
    pub async fn add_balance<'e, E>(
        executor: E,
        params: AddAccountBalanceParams,
    ) -> Result<Account, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Account>(
            r#"UPDATE accounts SET balance = balance + $2 WHERE id = $1
               RETURNING id, owner, balance, currency, created_at"#,
        )
        .bind(params.id)
        .bind(params.amount)
        .fetch_optional(executor)
        .await?
        .ok_or(StoreError::AccountNotFound(params.id))
    }
}

/// Entry repository (append-only)
pub struct EntryRepository;

impl EntryRepository {
    pub async fn create<'e, E>(executor: E, params: CreateEntryParams) -> Result<Entry, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Entry>(
            r#"INSERT INTO entries (account_id, amount) VALUES ($1, $2)
               RETURNING id, account_id, amount, created_at"#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| missing_account(e, &[("entries_account_id_fkey", params.account_id)]))
    }

    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Entry, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Entry>(
            r#"SELECT id, account_id, amount, created_at FROM entries WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(StoreError::EntryNotFound(id))
    }

    /// Entries of one account, oldest first
    pub async fn list<'e, E>(executor: E, params: ListEntriesParams) -> Result<Vec<Entry>, StoreError>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Entry>(
            r#"SELECT id, account_id, amount, created_at
               FROM entries WHERE account_id = $1
               ORDER BY id LIMIT $2 OFFSET $3"#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}

/// Transfer repository (append-only)
pub struct TransferRepository;

impl TransferRepository {
    /// Insert a transfer record. A missing account on either side surfaces as
    /// [`StoreError::AccountNotFound`] for that side.
    pub async fn create<'e, E>(executor: E, params: CreateTransferParams) -> Result<Transfer, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transfer>(
            r#"INSERT INTO transfers (from_account_id, to_account_id, amount) VALUES ($1, $2, $3)
               RETURNING id, from_account_id, to_account_id, amount, created_at"#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            missing_account(
                e,
                &[
                    ("transfers_from_account_id_fkey", params.from_account_id),
                    ("transfers_to_account_id_fkey", params.to_account_id),
                ],
            )
        })
    }

    pub async fn get<'e, E>(executor: E, id: i64) -> Result<Transfer, StoreError>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Transfer>(
            r#"SELECT id, from_account_id, to_account_id, amount, created_at
               FROM transfers WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(StoreError::TransferNotFound(id))
    }

    pub async fn list<'e, E>(executor: E, params: ListTransfersParams) -> Result<Vec<Transfer>, StoreError>
    where
        E: PgExecutor<'e>,
    {
        let rows = sqlx::query_as::<_, Transfer>(
            r#"SELECT id, from_account_id, to_account_id, amount, created_at
               FROM transfers
               WHERE from_account_id = $1 OR to_account_id = $2
               ORDER BY id LIMIT $3 OFFSET $4"#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }
}
