use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use crate::config::DbConfig;
use crate::merge::EnrichedProducer;
use crate::util::env::env_flag;

#[derive(Clone)]
pub struct Store {
    pub pool: PgPool,
}

impl Store {
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        // All queries are unqualified; resolve them against the
        // configured schema on every acquired connection.
        let schema = config.schema.clone();
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .after_connect(move |conn, _meta| {
                let set_schema = format!("SET search_path TO {}", schema);
                Box::pin(async move {
                    sqlx::query(&set_schema).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .context("store connection failed")?;
        info!("connected to store");

        if env_flag("AUTO_MIGRATE", false) {
            info!("running migrations (AUTO_MIGRATE=on)");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("migrations failed")?;
        }

        Ok(Self { pool })
    }

    /// Upsert by owner as an explicit update-then-insert. The two steps
    /// are not atomic: two runs writing the same owner can race at this
    /// boundary (lost insert or duplicate-key error on the owner PK).
    pub async fn upsert(&self, record: &EnrichedProducer) -> Result<()> {
        if !self.update(record).await? {
            self.insert(record).await?;
        }
        Ok(())
    }

    async fn update(&self, record: &EnrichedProducer) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE producers SET system = $2, bpjson = $3, updated_at = now() WHERE owner = $1",
        )
        .bind(&record.owner)
        .bind(&record.system)
        .bind(&record.bpjson)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert(&self, record: &EnrichedProducer) -> Result<()> {
        sqlx::query("INSERT INTO producers (owner, system, bpjson) VALUES ($1, $2, $3)")
            .bind(&record.owner)
            .bind(&record.system)
            .bind(&record.bpjson)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
