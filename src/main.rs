//! Study chat - conversational session service
//!
//! A Rust backend implementing a consent-gated session state machine for
//! turn-based dialogue against a remote answering service.

mod api;
mod backend;
mod config;
mod identity;
mod runtime;
mod session;
mod transcript;

use api::{create_router, AppState};
use backend::{HttpBackend, LoggingBackend};
use config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "study_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env();
    tracing::info!(
        backend_url = %config.backend_url,
        max_turns = config.max_turns,
        consent_mode = ?config.consent_mode,
        "Configuration loaded"
    );

    // Answering-service client
    let backend = Arc::new(LoggingBackend::new(Arc::new(HttpBackend::new(
        &config.backend_url,
    ))));

    // Create application state
    let state = AppState::new(backend, &config);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Study chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
