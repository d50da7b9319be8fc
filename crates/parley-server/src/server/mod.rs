use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use parley_chat::{ChatHub, ChatStore, InMemoryChatStore, LibSqlChatStore};

use crate::config::ServerConfig;

mod routes;

/// Server application state
pub struct AppState {
    /// Chat kernel shared by every connection
    pub hub: Arc<ChatHub>,
    /// Effective configuration
    pub config: ServerConfig,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(hub: Arc<ChatHub>, config: ServerConfig) -> Self {
        Self {
            hub,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        self.hub.store()
    }
}

/// Open the configured store.
pub async fn open_store(config: &ServerConfig) -> Result<Arc<dyn ChatStore>> {
    match &config.database.path {
        Some(path) => {
            info!("Using file-based database at: {}", path.display());
            let store = LibSqlChatStore::open_local(path)
                .await
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            info!("Using in-memory store (development mode)");
            Ok(Arc::new(InMemoryChatStore::new()))
        }
    }
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
pub async fn start(config: ServerConfig) -> Result<()> {
    let store = open_store(&config).await?;
    let hub = Arc::new(ChatHub::with_queue_capacity(store, config.queue_capacity));

    let addr = config.bind_addr().context("Invalid bind address")?;
    let state = Arc::new(AppState::new(hub, config));
    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting Axum HTTP server on {}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    let stop_token = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            stop_token.cancelled().await;
            info!("HTTP server received shutdown signal, draining connections");
        })
        .await?;

    info!(
        online = state.hub.online_count(),
        "Graceful shutdown complete"
    );
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}

/// Create the Axum router with all routes and middleware
fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.config.allowed_origin.as_deref());

    Router::new()
        .route("/health", get(health_handler))
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::messages::router())
        .merge(routes::conversations::router())
        .merge(routes::websocket::router())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
        Err(e) => {
            warn!(origin = %origin, error = %e, "Invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}

/// Response for the health check
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    online_users: usize,
}

/// Health check endpoint (for load balancers)
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            service: "parley-server",
            version: env!("CARGO_PKG_VERSION"),
            online_users: state.hub.online_count(),
        }),
    )
}
