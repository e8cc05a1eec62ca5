//! Authentication middleware. Attaches a principal (possibly anonymous) to
//! every request that reaches the router.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{attach_principal, AuthenticationContext};
use crate::data::UserRepository;

pub async fn authenticate<S>(
    State(context): State<Arc<AuthenticationContext<S>>>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: UserRepository + Send + Sync + 'static,
{
    let authorization = request.headers().get(header::AUTHORIZATION).cloned();

    let attached = match context.resolve(authorization.as_ref()).await {
        Ok(principal) => attach_principal(request.extensions_mut(), principal),
        Err(e) => Err(e),
    };

    let mut response = match attached {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
