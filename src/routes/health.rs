// src/routes/health.rs

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResp {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// Liveness stays `ok` while the database is unreachable; `database` reports it.
pub async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "up",
        Err(e) => {
            tracing::warn!(error = %e, "health check could not reach the database");
            "down"
        }
    };
    Json(HealthResp { status: "ok", version: "v1", database })
}
