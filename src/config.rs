use std::path::PathBuf;
use std::sync::Arc;

use crate::retry::RetryConfig;
use crate::state::{JsonFileMetadataStore, SqlitePayloadStore, Stores};

const METADATA_FILE: &str = "session.json";
const PAYLOAD_DB_FILE: &str = "photos.db";

/// Application configuration shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub retry: RetryConfig,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        Self {
            data_dir: expand_tilde(&cli.data_dir),
            retry: RetryConfig {
                max_retries: cli.max_retries,
                base_delay_ms: cli.retry_delay_ms,
                max_delay_ms: RetryConfig::default()
                    .max_delay_ms
                    .max(cli.retry_delay_ms),
            },
        }
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    pub fn payload_db_path(&self) -> PathBuf {
        self.data_dir.join(PAYLOAD_DB_FILE)
    }

    /// Whether any saved state exists, without creating anything.
    pub fn has_saved_state(&self) -> bool {
        self.metadata_path().exists() || self.payload_db_path().exists()
    }

    /// Open both stores, creating the data directory if needed.
    pub async fn open_stores(&self) -> anyhow::Result<Stores> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let payloads = SqlitePayloadStore::open(&self.payload_db_path()).await?;
        let metadata = JsonFileMetadataStore::new(self.metadata_path());
        tracing::debug!(data_dir = %self.data_dir.display(), "Opened session stores");
        Ok(Stores::new(Arc::new(metadata), Arc::new(payloads)))
    }
}
