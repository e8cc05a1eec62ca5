//! Configuration validation.
//!
//! Serde handles the syntactic checks; this module enforces value ranges.
//! Every problem is reported, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check value ranges across the whole configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let limiter = &config.limiter;
    if !(limiter.rps.is_finite() && limiter.rps > 0.0) {
        errors.push(ValidationError::new("limiter.rps", "must be greater than zero"));
    }
    if limiter.burst < 1 {
        errors.push(ValidationError::new("limiter.burst", "must be at least 1"));
    }
    if limiter.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "limiter.sweep_interval_secs",
            "must be greater than zero",
        ));
    }
    if limiter.eviction_threshold_secs < limiter.sweep_interval_secs {
        errors.push(ValidationError::new(
            "limiter.eviction_threshold_secs",
            "must not be shorter than the sweep interval",
        ));
    }
    if limiter.max_clients == 0 {
        errors.push(ValidationError::new("limiter.max_clients", "must be at least 1"));
    }

    for origin in &config.cors.trusted_origins {
        if axum::http::HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.trusted_origins",
                format!("'{origin}' is not a valid origin header value"),
            ));
        }
    }

    if config.shutdown.deadline_secs == 0 {
        errors.push(ValidationError::new(
            "shutdown.deadline_secs",
            "must be greater than zero",
        ));
    }
    if config.persistence.query_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "persistence.query_timeout_ms",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address when metrics are enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
