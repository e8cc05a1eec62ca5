//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//!     → GET /v1/metrics (in-process request snapshot)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)
//! - Counters live in owned instances, never in package-level statics

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, MetricsSnapshot, RequestMetrics};
