//! Response helpers.
//!
//! Successful bodies are wrapped in a single-key JSON envelope such as
//! `{"movie": {...}}`; errors use `{"error": ...}` (see [`crate::error`]).

use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

/// Builds a JSON object from named parts.
#[derive(Debug, Default)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Serialize) -> AppResult<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::internal(format!("failed to encode '{key}': {e}")))?;
        self.0.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn into_json(self) -> Json<Value> {
        Json(Value::Object(self.0))
    }
}

/// Single-key envelope.
pub fn envelope(key: &str, value: impl Serialize) -> AppResult<Json<Value>> {
    Ok(Envelope::new().with(key, value)?.into_json())
}
