//! REST API holding the latest posted microgrid state.
//!
//! Routes:
//! - `GET /soc`: latest state posted to `/insert`
//! - `POST /insert`: replace the latest state
//! - `GET /soc/history`: state-of-charge samples from the database
//! - `GET /jobs`, `POST /jobs`: the job table feeding node loads
//! - `GET /health`: liveness check

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::info;

use crate::db::Database;

/// Application state shared across all request handlers.
#[derive(Debug, Default)]
pub struct AppState {
    /// Latest `data` payload posted to `/insert`.
    pub latest: RwLock<Option<Value>>,
    /// Job and state-of-charge tables; listings return 503 without it.
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(db: Option<Arc<Database>>) -> Self {
        Self {
            latest: RwLock::new(None),
            db,
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/soc", get(handlers::get_soc))
        .route("/insert", axum::routing::post(handlers::post_insert))
        .route("/soc/history", get(handlers::get_soc_history))
        .route("/jobs", get(handlers::get_jobs).post(handlers::post_job))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the task is dropped.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(state, listener).await
}

/// Serves the API on an already bound listener.
pub async fn serve_listener(state: Arc<AppState>, listener: TcpListener) -> io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}
