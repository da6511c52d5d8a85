//! Lingua platform gateway entry point.
//!
//! Starts the Axum HTTP server exposing every service route behind a
//! single `X-Api-Key` gate (`spec.md` §6).

use std::sync::Arc;

use serde::Deserialize;

use lingua_gateway::state::AppState;

/// Environment-variable configuration, assembled by `envy`
/// (`spec.md` §6 "Configuration"). Missing required fields are a fatal
/// startup error, never silently defaulted.
#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    api_key: String,
    #[serde(default = "default_cache_url")]
    cache_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cache_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config: Config = envy::from_env().expect("invalid configuration in environment");

    tracing::info!(host = %config.host, port = config.port, "starting lingua-gateway");

    // The relational store is an external collaborator specified only
    // as a typed data-access contract (`spec.md` §1); this in-memory
    // store stands in for it until a real backend is wired in.
    let data = Arc::new(lingua_data::MockDataStore::new());
    let cache = Arc::new(
        lingua_cache::PredictionCache::new(config.cache_url.clone()).expect("failed to build cache client"),
    );

    let state = AppState::new(data.clone(), data, cache, config.api_key);
    let app = lingua_gateway::build_app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind to {addr}: {err}"));

    tracing::info!(%addr, "lingua-gateway listening");
    axum::serve(listener, app).await.expect("server error");
}
