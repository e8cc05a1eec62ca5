//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → CORS stage (preflight answered before any limiter state is touched)
//!     → rate_limit.rs (per-client token bucket, keyed by host)
//!     → authentication and permission gates (crate::auth)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing client address is an internal error, not an admit
//! - Abuse is throttled before credentials are validated
//! - Limiter memory is bounded by an idle sweep plus a hard ceiling

pub mod rate_limit;

pub use rate_limit::ClientLimiterRegistry;
