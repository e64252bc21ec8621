pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod inspector;
pub mod models;
pub mod publisher;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod transport;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Admin HTTP API over the queue.
pub fn build_app(state: SharedState) -> Router {
    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
