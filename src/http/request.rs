//! Request extraction helpers.
//!
//! # Responsibilities
//! - Decode JSON bodies, mapping every decode failure to a 400
//! - Parse resource ids from the path
//! - Read the optional `X-Expected-Version` precondition
//! - Read typed query string values, reporting bad ones as validation errors

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::data::Validator;
use crate::error::{AppError, AppResult};

pub const X_EXPECTED_VERSION: &str = "x-expected-version";

/// JSON body whose rejections become [`AppError::BadRequest`].
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(AppError::BadRequest(json_rejection_message(&rejection))),
        }
    }
}

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "body must be sent with Content-Type: application/json".to_string()
        }
        other => other.body_text(),
    }
}

/// Positive integer id from the `{id}` path segment. Anything else is a 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for ResourceId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::RecordNotFound)?;
        parse_id(&raw).map(ResourceId)
    }
}

pub fn parse_id(raw: &str) -> AppResult<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(AppError::RecordNotFound),
    }
}

/// The version the client last observed, if it sent one.
pub fn expected_version(headers: &HeaderMap) -> AppResult<Option<i32>> {
    let Some(value) = headers.get(X_EXPECTED_VERSION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| AppError::BadRequest("X-Expected-Version must be an integer".to_string()))
}

pub fn read_string(qs: &HashMap<String, String>, key: &str, default: &str) -> String {
    qs.get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

pub fn read_csv(qs: &HashMap<String, String>, key: &str) -> Vec<String> {
    qs.get(key)
        .filter(|v| !v.is_empty())
        .map(|v| v.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn read_int<T: FromStr + Copy>(
    qs: &HashMap<String, String>,
    key: &str,
    default: T,
    v: &mut Validator,
) -> T {
    match qs.get(key).filter(|raw| !raw.is_empty()) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);
        for raw in ["0", "-3", "abc", "1.5", ""] {
            assert!(matches!(parse_id(raw), Err(AppError::RecordNotFound)), "{raw}");
        }
    }

    #[test]
    fn expected_version_is_optional_but_typed() {
        let mut headers = HeaderMap::new();
        assert_eq!(expected_version(&headers).unwrap(), None);

        headers.insert(X_EXPECTED_VERSION, HeaderValue::from_static("3"));
        assert_eq!(expected_version(&headers).unwrap(), Some(3));

        headers.insert(X_EXPECTED_VERSION, HeaderValue::from_static("three"));
        assert!(matches!(expected_version(&headers), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn query_readers_fall_back_and_report() {
        let qs: HashMap<String, String> = [
            ("genres".to_string(), "drama,crime".to_string()),
            ("page".to_string(), "two".to_string()),
        ]
        .into_iter()
        .collect();

        let mut v = Validator::new();
        assert_eq!(read_csv(&qs, "genres"), vec!["drama", "crime"]);
        assert_eq!(read_string(&qs, "sort", "id"), "id");
        assert_eq!(read_int(&qs, "page", 1_usize, &mut v), 1);
        assert_eq!(read_int(&qs, "page_size", 20_usize, &mut v), 20);
        assert!(!v.valid());
    }
}
