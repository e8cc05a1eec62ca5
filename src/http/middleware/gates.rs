//! Per-route authorization gates.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{ensure_activated, ensure_authenticated, principal_of, PermissionGate};
use crate::data::PermissionRepository;

pub async fn require_authenticated_user(request: Request, next: Next) -> Response {
    let checked = principal_of(request.extensions()).and_then(ensure_authenticated);
    match checked {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn require_activated_user(request: Request, next: Next) -> Response {
    let checked = principal_of(request.extensions()).and_then(ensure_activated);
    match checked {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

pub async fn require_permission<S>(
    State(gate): State<Arc<PermissionGate<S>>>,
    request: Request,
    next: Next,
) -> Response
where
    S: PermissionRepository + Send + Sync + 'static,
{
    let principal = match principal_of(request.extensions()) {
        Ok(principal) => principal.clone(),
        Err(e) => return e.into_response(),
    };

    match gate.check(&principal).await {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
