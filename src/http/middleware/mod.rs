//! HTTP middleware.
//!
//! Chain-level stages are composed by [`chain::MiddlewareChain`]; route-level
//! authorization gates live in [`gates`].

pub mod authenticate;
pub mod chain;
pub mod cors;
pub mod gates;
pub mod metrics;
pub mod rate_limit;
pub mod recover;

pub use chain::{MiddlewareChain, Stage};
pub use gates::{require_activated_user, require_authenticated_user, require_permission};
