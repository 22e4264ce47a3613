//! Application configuration loaded from environment variables.

use crate::errors::{Result, ServerError};

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint of the chain node used for pledge validation and
    /// claim detection.
    pub chain_rpc_url: String,
    /// Path to the SQLite pledge journal.
    pub database_url: String,
    /// Directory of project definition files (one JSON file per project).
    pub projects_dir: String,
    /// Port for the HTTP server.
    pub api_port: u16,
    /// How often (in seconds) the claim watcher polls the chain.
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            chain_rpc_url: env_var("CHAIN_RPC_URL").map_err(|_| {
                ServerError::Config("CHAIN_RPC_URL environment variable is required".to_string())
            })?,
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./beacon_pledges.db".to_string()),
            projects_dir: env_var("PROJECTS_DIR").unwrap_or_else(|_| "./projects".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "13765".to_string())
                .parse()
                .map_err(|_| ServerError::Config("Invalid API_PORT".to_string()))?,
            poll_interval_secs: env_var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .map_err(|_| ServerError::Config("Invalid POLL_INTERVAL_SECS".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ServerError::Config(format!("Missing env var: {key}")))
}
