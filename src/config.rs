use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::util::env::{env_opt, env_parse, env_req};

/// Chain node endpoint plus the read-query parameters.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub endpoint: String,
    /// Maximum rows requested from both chain queries. Must be at least
    /// the live producer count; the node silently truncates past it.
    pub row_limit: u32,
    pub metadata_code: String,
    pub metadata_scope: String,
    pub metadata_table: String,
}

/// Store connection parameters, kept as components rather than a DSN.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: String,
    pub max_connections: u32,
}

/// Everything one sync pass needs, resolved once at startup and passed
/// into the runner instead of read ambiently from the environment.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub chain: ChainConfig,
    pub db: DbConfig,
    pub fetch_timeout: Duration,
}

impl SyncConfig {
    /// Build from environment (dotenv-aware). Only the chain endpoint is
    /// required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let chain = ChainConfig {
            endpoint: env_req("CHAIN_API_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            row_limit: env_parse("CHAIN_ROW_LIMIT", 1000u32),
            metadata_code: env_opt("METADATA_TABLE_CODE")
                .unwrap_or_else(|| "producerjson".into()),
            metadata_scope: env_opt("METADATA_TABLE_SCOPE")
                .unwrap_or_else(|| "producerjson".into()),
            metadata_table: env_opt("METADATA_TABLE_NAME")
                .unwrap_or_else(|| "producerjson".into()),
        };

        let db = DbConfig {
            host: env_opt("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: env_parse("DB_PORT", 5432u16),
            user: env_opt("DB_USER").unwrap_or_else(|| "user".into()),
            password: env_opt("DB_PASSWORD").unwrap_or_else(|| "pass".into()),
            database: env_opt("DB_NAME").unwrap_or_else(|| "eosrate".into()),
            schema: env_opt("DB_SCHEMA").unwrap_or_else(|| "public".into()),
            max_connections: env_parse("DB_MAX_CONNS", 5u32),
        };

        let fetch_timeout = Duration::from_secs(env_parse("BP_FETCH_TIMEOUT_SECS", 10u64));

        Ok(Self {
            chain,
            db,
            fetch_timeout,
        })
    }

    /// Log a redacted snapshot of the effective configuration.
    pub fn log_snapshot(&self) {
        info!(
            target = "config",
            endpoint = %self.chain.endpoint,
            row_limit = self.chain.row_limit,
            metadata_code = %self.chain.metadata_code,
            metadata_scope = %self.chain.metadata_scope,
            metadata_table = %self.chain.metadata_table,
            db_host = %self.db.host,
            db_port = self.db.port,
            db_user = %self.db.user,
            db_password = "***",
            db_name = %self.db.database,
            db_schema = %self.db.schema,
            fetch_timeout_secs = self.fetch_timeout.as_secs(),
            "configuration snapshot"
        );
    }
}
