//! Request gating and lifecycle management for a JSON API server.

pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod notifier;
pub mod observability;
pub mod security;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use http::Application;
pub use lifecycle::{LifecycleError, LifecycleState, ServerHandle, Shutdown};
