// src/db/mod.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;

use crate::config::AppConfig;

pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect(&cfg.database_url)
        .await
        .context("could not connect to PostgreSQL")?;

    info!(max_connections = cfg.max_connections, "connected to PostgreSQL");
    Ok(pool)
}

/// Applies everything under `migrations/` that has not run yet.
pub async fn migrate(pool: &Pool<Postgres>) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("database migration failed")?;
    info!("migrations applied");
    Ok(())
}
