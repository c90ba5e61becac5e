//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{
    CreateAccountRequest, DeletedAccount, TransferRequest, UpdateAccountRequest,
};
use crate::store::{Account, Entry, Transfer, TransferTxResult};

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bank Ledger API",
        version = "1.0.0",
        description = "Accounts and atomic transfers between them.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::create_account,
        crate::gateway::handlers::get_account,
        crate::gateway::handlers::list_accounts,
        crate::gateway::handlers::update_account,
        crate::gateway::handlers::delete_account,
        crate::gateway::handlers::list_entries,
        crate::gateway::handlers::create_transfer,
        crate::gateway::handlers::get_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            Account,
            Entry,
            Transfer,
            TransferTxResult,
            CreateAccountRequest,
            UpdateAccountRequest,
            TransferRequest,
            DeletedAccount,
        )
    ),
    tags(
        (name = "Account", description = "Account CRUD and entry history"),
        (name = "Transfer", description = "Atomic transfers between accounts"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;
