//! trend-api — HTTP surface of the trend exporter.
//!
//! Two routers, each served on its own port.
//!
//! # Scrape router
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | `iter8_trend` exposition |
//! | GET | `/` | Same as `/metrics` |
//!
//! # Health router
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/health/health_check` | Liveness, always `{"status":"OK"}` |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use trend_state::ExperimentStore;

/// Path of the liveness endpoint.
pub const HEALTH_CHECK_PATH: &str = "/api/v1/health/health_check";

/// Shared state for the scrape handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: ExperimentStore,
}

/// Build the scrape router over the experiment store.
pub fn build_scrape_router(store: ExperimentStore) -> Router {
    let state = ApiState { store };

    Router::new()
        .route("/metrics", get(handlers::scrape_metrics))
        .route("/", get(handlers::scrape_metrics))
        .with_state(state)
}

/// Build the health-check router.
pub fn build_health_router() -> Router {
    Router::new().route(HEALTH_CHECK_PATH, get(handlers::health_check))
}
