//! HTTP + WebSocket control surface for the sync engine (spec §4.7, §6.1,
//! §6.3).
//!
//! Generalizes the teacher's `MetricsServer` (a bare-`hyper` single-route
//! server) to the larger surface this component needs: eight JSON routes
//! plus a WebSocket upgrade. `axum` is built on the same `hyper`
//! foundation the teacher already depends on, so the routing and
//! extractor machinery comes from the stack rather than being
//! hand-rolled a second time.

mod dto;
mod error;
mod routes;
mod state;
mod ws;

pub use dto::ApiResponse;
pub use error::ApiError;
pub use state::{AppState, HealthCheck};

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full `/api/v1` router plus the `/sync/progress` WebSocket
/// upgrade, layered with request tracing and permissive CORS (spec
/// doesn't scope CORS policy; permissive matches a service meant to be
/// polled by an internal dashboard).
#[must_use]
pub fn router(state: AppState) -> Router {
    let api = routes::sync::router().merge(routes::health::router());
    Router::new()
        .nest("/api/v1", api)
        .route("/sync/progress", axum::routing::get(ws::progress_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
