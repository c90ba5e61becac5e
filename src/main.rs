//! Bank Ledger server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────┐    ┌──────────┐
//! │  Config  │───▶│ Postgres │───▶│  Store   │───▶│ Gateway  │
//! │  (YAML)  │    │ (+migr.) │    │  (tx)    │    │  (HTTP)  │
//! └──────────┘    └──────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use bank_ledger::config::AppConfig;
use bank_ledger::gateway::{self, state::AppState};
use bank_ledger::{Database, Store};

#[derive(Debug, Parser)]
#[command(name = "bank_ledger", version, about = "Accounts and atomic transfers")]
struct Args {
    /// Config environment, loads config/<env>.yaml
    #[arg(short, long, default_value = "dev", env = "APP_ENV")]
    env: String,

    /// Override gateway.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut app_config = AppConfig::load(&args.env)?;
    if let Some(port) = args.port {
        app_config.gateway.port = port;
    }
    let _log_guard = bank_ledger::logging::init_logging(&app_config);

    tracing::info!("Starting Bank Ledger in {} mode", args.env);

    let db = Database::connect(&app_config.postgres)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if app_config.postgres.run_migrations {
        db.migrate().await.context("Failed to apply migrations")?;
    }

    let store = Store::new(db.pool().clone());
    let state = Arc::new(AppState::new(store, app_config.transfer.timeout()));

    gateway::run_server(&app_config.gateway.bind_addr(), state).await
}
