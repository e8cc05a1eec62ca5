//! Request metrics middleware. Outermost stage, so it sees the final status of
//! every response, recovered panics included.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::observability::metrics::{self, RequestMetrics};

pub async fn track_metrics(
    State(counters): State<Arc<RequestMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    counters.request_received();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    counters.response_sent(status, elapsed);
    metrics::record_request(method.as_str(), status, elapsed);

    tracing::debug!(
        method = %method,
        path = %path,
        status,
        latency_us = elapsed.as_micros() as u64,
        "Request completed"
    );
    response
}
