//! Panic recovery. Any panic below this stage becomes a 500 that closes the
//! connection.

use std::any::Any;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::AppError;
use crate::lifecycle::background::panic_message;
use crate::observability::metrics;

pub type RecoverPanicLayer = CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response>;

pub fn recover_panic_layer() -> RecoverPanicLayer {
    CatchPanicLayer::custom(panic_response as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    metrics::record_panic_recovered();

    let mut response =
        AppError::internal(format!("handler panicked: {}", panic_message(payload.as_ref())))
            .into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
