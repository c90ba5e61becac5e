use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Environment variable that overrides `postgres.url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    5000
}

fn default_run_migrations() -> bool {
    true
}

impl PostgresConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Transfer execution limits
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferConfig {
    /// Deadline for a single transfer transaction, in milliseconds
    pub timeout_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl TransferConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`, then apply environment overrides.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))?;
        config.apply_env_overrides(std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    fn apply_env_overrides(&mut self, database_url: Option<String>) {
        if let Some(url) = database_url.filter(|u| !u.trim().is_empty()) {
            tracing::debug!("postgres.url overridden by {}", DATABASE_URL_ENV);
            self.postgres.url = url;
        }
    }
}
