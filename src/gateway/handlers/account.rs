//! Account handlers (CRUD, entry history)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{
    ApiResult, CreateAccountRequest, DeletedAccount, PageQuery, UpdateAccountRequest, ok,
};
use crate::store::models::{ListAccountsParams, ListEntriesParams, UpdateAccountParams};
use crate::store::{Account, AccountRepository, Entry, EntryRepository};

/// Open an account
///
/// POST /api/v1/accounts
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = Account),
        (status = 400, description = "Invalid owner or unsupported currency")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Account> {
    let params = req.to_params()?;
    let account = AccountRepository::create(state.store.pool(), &params).await?;
    tracing::info!(account_id = account.id, owner = %account.owner, currency = %account.currency, "Account created");
    ok(account)
}

/// Get one account
///
/// GET /api/v1/accounts/{id}
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account details", body = Account),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Account> {
    let account = AccountRepository::get(state.store.pool(), id).await?;
    ok(account)
}

/// List accounts, one page at a time
///
/// GET /api/v1/accounts?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of accounts", body = Vec<Account>),
        (status = 400, description = "Invalid pagination")
    ),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Account>> {
    page.validate()?;

    let accounts = AccountRepository::list(
        state.store.pool(),
        ListAccountsParams {
            limit: page.limit(),
            offset: page.offset(),
        },
    )
    .await?;
    ok(accounts)
}

/// Administrative balance update
///
/// PUT /api/v1/accounts/{id}
#[utoipa::path(
    put,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Updated account", body = Account),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Account> {
    let account = AccountRepository::update(
        state.store.pool(),
        UpdateAccountParams {
            id,
            balance: req.balance,
        },
    )
    .await?;
    tracing::warn!(account_id = id, balance = account.balance, "Account balance set administratively");
    ok(account)
}

/// Delete an account with no entries or transfers
///
/// DELETE /api/v1/accounts/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account deleted", body = DeletedAccount),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Account still referenced by entries or transfers")
    ),
    tag = "Account"
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<DeletedAccount> {
    AccountRepository::delete(state.store.pool(), id).await?;
    tracing::info!(account_id = id, "Account deleted");
    ok(DeletedAccount { id })
}

/// Entry history of one account
///
/// GET /api/v1/accounts/{id}/entries?page_id=1&page_size=5
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/entries",
    params(("id" = i64, Path, description = "Account ID"), PageQuery),
    responses(
        (status = 200, description = "Page of entries", body = Vec<Entry>),
        (status = 404, description = "Account not found")
    ),
    tag = "Account"
)]
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Vec<Entry>> {
    page.validate()?;

    // 404 for unknown accounts rather than an empty page
    AccountRepository::get(state.store.pool(), id).await?;

    let entries = EntryRepository::list(
        state.store.pool(),
        ListEntriesParams {
            account_id: id,
            limit: page.limit(),
            offset: page.offset(),
        },
    )
    .await?;
    ok(entries)
}
