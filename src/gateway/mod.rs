pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

/// Build the full router: `/api/v1/*` plus Swagger UI
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route(
            "/accounts/{id}",
            get(handlers::get_account)
                .put(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .route("/accounts/{id}/entries", get(handlers::list_entries))
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfers/{id}", get(handlers::get_transfer));

    Router::new()
        .nest("/api/v1", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve on an already bound listener until ctrl-c
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

/// Bind `addr` and serve
pub async fn run_server(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    serve(listener, state).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
