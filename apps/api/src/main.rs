mod coding;
mod config;
mod db;
mod errors;
mod judge;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;
mod stt;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::judge::client::Judge0Client;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{InterviewStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn InterviewStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            info!("PostgreSQL store initialized");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; tasks, submissions and proctor events live in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let executor = Arc::new(Judge0Client::new(
        config.judge0_url.clone(),
        config.judge0_api_key.clone(),
    ));
    info!("Judge0 client initialized ({})", executor.base_url());

    let transcriber = stt::from_config(&config);
    let generator = llm_client::from_config(&config);
    info!(
        "Collaborators: stt={}, llm={}",
        transcriber.engine(),
        generator.engine()
    );

    let state = AppState::new(config.clone(), store, executor, transcriber, generator);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
