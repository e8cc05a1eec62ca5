//! Route handlers.

pub mod healthcheck;
pub mod movies;
pub mod users;

use crate::error::AppError;

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::RecordNotFound
}
