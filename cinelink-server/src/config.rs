use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};

/// Server configuration loaded from environment variables.
///
/// Credentials get no upfront schema validation beyond presence; a bad
/// token surfaces as a connection or authorization failure on the first
/// run, which the run report makes visible.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Media source settings
    pub plex_url: String,
    pub plex_token: String,

    // Remote database settings
    pub notion_api_key: String,
    pub notion_database_id: String,

    // Logging
    pub log_dir: PathBuf,

    // In-memory history sizing
    pub event_history_capacity: usize,
    pub run_history_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3146".to_string())
                .parse()
                .unwrap_or(3146),

            plex_url: required("PLEX_URL")?,
            plex_token: required("PLEX_TOKEN")?,

            notion_api_key: required("NOTION_API_KEY")?,
            notion_database_id: required("NOTION_DATABASE_ID")?,

            log_dir: env::var("LOG_DIR")
                .unwrap_or_else(|_| "./logs".to_string())
                .into(),

            event_history_capacity: env::var("EVENT_HISTORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            run_history_capacity: env::var("RUN_HISTORY_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(32),
        })
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("failed to create log dir {}", self.log_dir.display()))?;
        Ok(())
    }

    /// The append-only log file every run outcome is written to.
    pub fn log_file(&self) -> PathBuf {
        Path::new(&self.log_dir).join("cinelink.log")
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow!("{key} must be set (see .env.example)"))
}
