//! Route handlers for the scrape and health-check endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::debug;

use crate::ApiState;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// GET /metrics and GET /: `iter8_trend` exposition of every stored record.
pub async fn scrape_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let records = state.store.snapshot().await;
    debug!(experiments = records.len(), "serving scrape");

    let body = trend_metrics::render_trend(&records);
    (
        StatusCode::OK,
        [("content-type", trend_metrics::CONTENT_TYPE)],
        body,
    )
}

/// GET /api/v1/health/health_check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthStatus { status: "OK" }))
}
