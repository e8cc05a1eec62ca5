//! Rate limiting middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::{AppError, AppResult};
use crate::observability::metrics;
use crate::security::ClientLimiterRegistry;

pub async fn rate_limit(
    State(limiter): State<Arc<ClientLimiterRegistry>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let key = match client_key(&request) {
        Ok(key) => key,
        Err(e) => return e.into_response(),
    };

    if !limiter.allow(&key) {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        return AppError::RateLimitExceeded.into_response();
    }

    next.run(request).await
}

/// Host portion of the peer address.
fn client_key(request: &Request) -> AppResult<String> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .ok_or_else(|| AppError::internal("client address unavailable for rate limiting"))
}
