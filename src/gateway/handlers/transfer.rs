//! Transfer handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TransferRequest, ok};
use crate::store::{
    AccountRepository, StoreError, Transfer, TransferRepository, TransferTxResult, TxContext,
};

/// Create a transfer
///
/// POST /api/v1/transfers
///
/// Both accounts must exist and be denominated in the requested currency;
/// this is checked before the transfer transaction starts.
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferTxResult),
        (status = 400, description = "Invalid amount, same account or currency mismatch"),
        (status = 404, description = "Account not found"),
        (status = 408, description = "Transfer deadline exceeded"),
        (status = 409, description = "Concurrent update conflict, safe to retry")
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferTxResult> {
    let params = req.to_params()?;

    check_account(&state, params.from_account_id, &req.currency).await?;
    check_account(&state, params.to_account_id, &req.currency).await?;

    let ctx = TxContext::background().with_timeout(state.transfer_timeout);
    let result = state.store.transfer_tx(&ctx, params).await?;
    ok(result)
}

/// The account exists and is denominated in `currency`
async fn check_account(state: &AppState, id: i64, currency: &str) -> Result<(), ApiError> {
    let account = AccountRepository::get(state.store.pool(), id).await?;
    if account.currency != currency {
        return Err(StoreError::CurrencyMismatch {
            account_id: id,
            expected: currency.to_string(),
            actual: account.currency,
        }
        .into());
    }
    Ok(())
}

/// Get one transfer
///
/// GET /api/v1/transfers/{id}
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = i64, Path, description = "Transfer ID")),
    responses(
        (status = 200, description = "Transfer record", body = Transfer),
        (status = 404, description = "Transfer not found")
    ),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Transfer> {
    let transfer = TransferRepository::get(state.store.pool(), id).await?;
    ok(transfer)
}
