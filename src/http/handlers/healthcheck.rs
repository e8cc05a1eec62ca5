//! Liveness and counters.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::data::Store;
use crate::error::AppResult;
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::observability::MetricsSnapshot;

pub const API_VERSION: &str = "1.0.0";

pub async fn healthcheck<S: Store>(State(state): State<AppState<S>>) -> AppResult<Json<Value>> {
    Ok(Envelope::new()
        .with("status", "available")?
        .with(
            "system_info",
            json!({
                "environment": &*state.environment,
                "version": API_VERSION,
            }),
        )?
        .into_json())
}

pub async fn metrics_snapshot<S: Store>(State(state): State<AppState<S>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
