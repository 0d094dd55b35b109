// src/main.rs

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hotel_booking_api::{
    app,
    auth::JwtKeys,
    config::AppConfig,
    db,
    notify::{channels::Channels, realtime::RealtimeHub, Notifier},
    stripe::StripeClient,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hotel_booking_api=info,tower_http=info")),
        )
        .init();

    let cfg = AppConfig::from_env()?;

    let pool = db::connect(&cfg).await?;
    db::migrate(&pool).await?;

    let channels = Channels::from_config(&cfg.notify)?;
    let notifier = Notifier::new(pool.clone(), RealtimeHub::default(), channels);
    let stripe = StripeClient::new(&cfg.stripe, cfg.notify.timeout)?;

    let state = AppState {
        pool,
        jwt: Arc::new(JwtKeys::new(&cfg.jwt)),
        notifier,
        stripe: Arc::new(stripe),
    };

    let api = app(state).layer(cors(cfg.cors_origin.as_deref())?);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "API listening");

    axum::serve(listener, api.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

// Permissive unless CORS_ORIGIN pins a single origin.
fn cors(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    Ok(match origin {
        Some(o) => layer.allow_origin(
            o.parse::<HeaderValue>()
                .with_context(|| format!("CORS_ORIGIN is not a valid origin: {o}"))?,
        ),
        None => layer.allow_origin(Any),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
