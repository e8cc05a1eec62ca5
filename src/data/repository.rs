//! Repository Traits
//!
//! Interfaces for data persistence. Gates and handlers depend only on these.

use std::time::Duration;

use crate::data::models::{Metadata, Movie, MovieData, MovieFilter, Permissions, TokenScope, User, UserData};
use crate::error::AppResult;

/// Movie repository trait
#[trait_variant::make(MovieRepository: Send)]
pub trait LocalMovieRepository {
    /// Store a new movie at version 1
    async fn insert_movie(&self, data: MovieData) -> AppResult<Movie>;

    /// Fetch a movie; `RecordNotFound` when absent
    async fn get_movie(&self, id: i64) -> AppResult<Movie>;

    /// One page of movies matching `filter`
    async fn list_movies(&self, filter: &MovieFilter) -> AppResult<(Vec<Movie>, Metadata)>;

    /// Conditioned write; `EditConflict` on a stale version or missing row
    async fn update_movie(&self, movie: &mut Movie) -> AppResult<i32>;

    /// Remove a movie; `RecordNotFound` when absent
    async fn delete_movie(&self, id: i64) -> AppResult<()>;
}

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Store a new user; `DuplicateEmail` if the address is taken
    async fn insert_user(&self, data: UserData) -> AppResult<User>;

    async fn get_user(&self, id: i64) -> AppResult<User>;

    async fn get_user_by_email(&self, email: &str) -> AppResult<User>;

    /// Conditioned write; `EditConflict` on a stale version or missing row
    async fn update_user(&self, user: &mut User) -> AppResult<i32>;

    /// Owner of an unexpired token with `scope`; `RecordNotFound` otherwise
    async fn get_for_token(&self, scope: TokenScope, plaintext: &str) -> AppResult<User>;
}

/// Token repository trait
///
/// Tokens are issued elsewhere; this only records and revokes them.
#[trait_variant::make(TokenRepository: Send)]
pub trait LocalTokenRepository {
    async fn insert_token(
        &self,
        plaintext: &str,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> AppResult<()>;

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> AppResult<()>;
}

/// Permission repository trait
#[trait_variant::make(PermissionRepository: Send)]
pub trait LocalPermissionRepository {
    async fn get_all_for_user(&self, user_id: i64) -> AppResult<Permissions>;

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> AppResult<()>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store:
    MovieRepository + UserRepository + TokenRepository + PermissionRepository + Clone + Send + Sync + 'static
{
}

impl<T> Store for T where
    T: MovieRepository
        + UserRepository
        + TokenRepository
        + PermissionRepository
        + Clone
        + Send
        + Sync
        + 'static
{
}
