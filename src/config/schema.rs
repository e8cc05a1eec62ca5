//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API server.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment name, reported by the healthcheck.
    pub env: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Per-client rate limiting.
    pub limiter: LimiterConfig,

    /// Cross-origin request policy.
    pub cors: CorsConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Persistence call deadlines.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            listener: ListenerConfig::default(),
            limiter: LimiterConfig::default(),
            cors: CorsConfig::default(),
            shutdown: ShutdownConfig::default(),
            persistence: PersistenceConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Token bucket limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Tokens added per second.
    pub rps: f64,

    /// Bucket capacity, i.e. the largest instantaneous burst.
    pub burst: u32,

    /// When false every request is admitted and no client state is kept.
    pub enabled: bool,

    /// How often idle clients are swept.
    pub sweep_interval_secs: u64,

    /// Idle time after which a client entry is evicted.
    pub eviction_threshold_secs: u64,

    /// Ceiling on tracked clients between sweeps.
    pub max_clients: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rps: 2.0,
            burst: 4,
            enabled: true,
            sweep_interval_secs: 60,
            eviction_threshold_secs: 180,
            max_clients: 100_000,
        }
    }
}

impl LimiterConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn eviction_threshold(&self) -> Duration {
        Duration::from_secs(self.eviction_threshold_secs)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests (exact match).
    pub trusted_origins: Vec<String>,
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound on the drain phase.
    pub deadline_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { deadline_secs: 30 }
    }
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Deadlines for persistence calls made while gating a request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub query_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 3_000,
        }
    }
}

impl PersistenceConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            env = "staging"

            [limiter]
            rps = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(config.env, "staging");
        assert_eq!(config.limiter.rps, 10.0);
        assert_eq!(config.limiter.burst, 4);
        assert!(config.limiter.enabled);
        assert_eq!(config.shutdown.deadline(), Duration::from_secs(30));
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn eviction_defaults_to_three_sweeps() {
        let limiter = LimiterConfig::default();
        assert_eq!(limiter.eviction_threshold(), limiter.sweep_interval() * 3);
    }
}
