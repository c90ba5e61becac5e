//! API request/response types and error mapping
//!
//! - `ApiResponse<T>`: unified response wrapper
//! - `ApiError`: error response, built from [`StoreError`] or validation failures
//! - `error_codes`: standard error code constants
//! - Request DTOs validated with `validator` before anything touches the store

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationErrors};

use crate::store::models::{CreateAccountParams, check_currency};
use crate::store::{ErrorKind, StoreError, TransferTxParams};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_AMOUNT: i32 = 1002;
    pub const CURRENCY_MISMATCH: i32 = 1003;
    pub const SAME_ACCOUNT: i32 = 1004;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const REQUEST_TIMEOUT: i32 = 4008;
    pub const CONFLICT: i32 = 4009;
    pub const CONSTRAINT_VIOLATION: i32 = 4010;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }

}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e.kind() {
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, e.to_string()),
            ErrorKind::Validation => {
                let code = match e {
                    StoreError::InvalidAmount(_) => error_codes::INVALID_AMOUNT,
                    StoreError::CurrencyMismatch { .. } => error_codes::CURRENCY_MISMATCH,
                    StoreError::SameAccount => error_codes::SAME_ACCOUNT,
                    _ => error_codes::INVALID_PARAMETER,
                };
                Self::new(StatusCode::BAD_REQUEST, code, e.to_string())
            }
            ErrorKind::Conflict => Self::new(
                StatusCode::CONFLICT,
                error_codes::CONFLICT,
                "Concurrent update conflict, retry the request",
            ),
            ErrorKind::Constraint => {
                tracing::warn!(error = %e, "Constraint violation");
                Self::new(
                    StatusCode::CONFLICT,
                    error_codes::CONSTRAINT_VIOLATION,
                    "Operation violates a data constraint",
                )
            }
            ErrorKind::Cancelled => Self::new(
                StatusCode::REQUEST_TIMEOUT,
                error_codes::REQUEST_TIMEOUT,
                e.to_string(),
            ),
            ErrorKind::Transactional | ErrorKind::Database => {
                tracing::error!(code = e.code(), error = %e, "Store failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL_ERROR,
                    "Internal error",
                )
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::bad_request(e.to_string())
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Open a new account with zero balance
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "alice")]
    pub owner: String,
    #[schema(example = "USD")]
    pub currency: String,
}

impl CreateAccountRequest {
    /// Field validation plus the currency check; new accounts start at zero
    pub fn to_params(&self) -> Result<CreateAccountParams, ApiError> {
        self.validate()?;
        check_currency(&self.currency)?;
        Ok(CreateAccountParams {
            owner: self.owner.clone(),
            balance: 0,
            currency: self.currency.clone(),
        })
    }
}

/// Administrative balance update
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateAccountRequest {
    #[schema(example = 10000)]
    pub balance: i64,
}

fn default_page_id() -> i64 {
    1
}

fn default_page_size() -> i64 {
    5
}

/// Pagination for list endpoints
#[derive(Debug, Clone, Copy, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    #[serde(default = "default_page_id")]
    #[validate(range(min = 1, max = 1000000))]
    pub page_id: i64,
    /// Items per page, 5 to 10
    #[serde(default = "default_page_size")]
    #[validate(range(min = 5, max = 10))]
    pub page_size: i64,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page_id - 1).saturating_mul(self.page_size)
    }
}

/// Move funds between two accounts of the same currency
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct TransferRequest {
    #[validate(range(min = 1))]
    #[schema(example = 1)]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub to_account_id: i64,
    #[validate(range(min = 1))]
    #[schema(example = 30)]
    pub amount: i64,
    #[schema(example = "USD")]
    pub currency: String,
}

impl TransferRequest {
    /// Field validation plus the cross-field rules, before any account lookup
    pub fn to_params(&self) -> Result<TransferTxParams, ApiError> {
        if self.amount <= 0 {
            return Err(StoreError::InvalidAmount(self.amount).into());
        }
        self.validate()?;
        check_currency(&self.currency)?;
        if self.from_account_id == self.to_account_id {
            return Err(StoreError::SameAccount.into());
        }
        Ok(TransferTxParams {
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: self.amount,
        })
    }
}

/// Confirmation of a deleted account
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedAccount {
    pub id: i64,
}
