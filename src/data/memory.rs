//! In-memory persistence backed by sharded concurrent maps.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::data::models::{
    Metadata, Movie, MovieData, MovieFilter, Permissions, Token, TokenScope, User, UserData,
};
use crate::data::repository::{MovieRepository, PermissionRepository, TokenRepository, UserRepository};
use crate::data::versioned::VersionedTable;
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct Tables {
    movies: VersionedTable<MovieData>,
    users: VersionedTable<UserData>,
    /// Lowercased email to user id.
    emails: DashMap<String, i64>,
    /// SHA-256 of the plaintext to token record.
    tokens: DashMap<[u8; 32], Token>,
    permissions: DashMap<i64, Vec<String>>,
}

/// Cheaply cloneable handle to one shared set of tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn token_hash(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

fn email_key(email: &str) -> String {
    email.to_lowercase()
}

impl MovieRepository for InMemoryStore {
    async fn insert_movie(&self, data: MovieData) -> AppResult<Movie> {
        Ok(self.tables.movies.insert(data))
    }

    async fn get_movie(&self, id: i64) -> AppResult<Movie> {
        self.tables.movies.get(id)
    }

    async fn list_movies(&self, filter: &MovieFilter) -> AppResult<(Vec<Movie>, Metadata)> {
        let mut movies = self.tables.movies.select(|movie| filter.matches(&movie.data));

        let column = filter.sort_column();
        movies.sort_by(|a, b| {
            let ordering = match column {
                "title" => a.data.title.cmp(&b.data.title),
                "year" => a.data.year.cmp(&b.data.year),
                "runtime" => a.data.runtime.cmp(&b.data.runtime),
                _ => a.id.cmp(&b.id),
            };
            let ordering = if filter.descending() { ordering.reverse() } else { ordering };
            ordering.then(a.id.cmp(&b.id))
        });

        let metadata = Metadata::calculate(movies.len(), filter.page, filter.page_size);
        let page = movies
            .into_iter()
            .skip(filter.offset())
            .take(filter.page_size)
            .collect();
        Ok((page, metadata))
    }

    async fn update_movie(&self, movie: &mut Movie) -> AppResult<i32> {
        self.tables.movies.update(movie)
    }

    async fn delete_movie(&self, id: i64) -> AppResult<()> {
        self.tables.movies.delete(id)
    }
}

impl UserRepository for InMemoryStore {
    async fn insert_user(&self, data: UserData) -> AppResult<User> {
        match self.tables.emails.entry(email_key(&data.email)) {
            Entry::Occupied(_) => Err(AppError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let user = self.tables.users.insert(data);
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn get_user(&self, id: i64) -> AppResult<User> {
        self.tables.users.get(id)
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<User> {
        let id = self
            .tables
            .emails
            .get(&email_key(email))
            .map(|entry| *entry.value())
            .ok_or(AppError::RecordNotFound)?;
        self.tables.users.get(id)
    }

    async fn update_user(&self, user: &mut User) -> AppResult<i32> {
        let stored = self.tables.users.get(user.id).map_err(|_| AppError::EditConflict)?;
        let old_key = email_key(&stored.data.email);
        let new_key = email_key(&user.data.email);

        if old_key == new_key {
            return self.tables.users.update(user);
        }

        // Claim the new address before the conditioned write; release it if the write loses.
        match self.tables.emails.entry(new_key.clone()) {
            Entry::Occupied(_) => return Err(AppError::DuplicateEmail),
            Entry::Vacant(slot) => {
                slot.insert(user.id);
            }
        }
        match self.tables.users.update(user) {
            Ok(version) => {
                self.tables.emails.remove_if(&old_key, |_, id| *id == user.id);
                Ok(version)
            }
            Err(e) => {
                self.tables.emails.remove_if(&new_key, |_, id| *id == user.id);
                Err(e)
            }
        }
    }

    async fn get_for_token(&self, scope: TokenScope, plaintext: &str) -> AppResult<User> {
        let user_id = self
            .tables
            .tokens
            .get(&token_hash(plaintext))
            .filter(|token| token.scope == scope && token.expiry > Utc::now())
            .map(|token| token.user_id)
            .ok_or(AppError::RecordNotFound)?;
        self.tables.users.get(user_id)
    }
}

impl TokenRepository for InMemoryStore {
    async fn insert_token(
        &self,
        plaintext: &str,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> AppResult<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::internal(format!("token ttl out of range: {e}")))?;
        let hash = token_hash(plaintext);
        self.tables.tokens.insert(
            hash,
            Token {
                hash,
                user_id,
                expiry: Utc::now() + ttl,
                scope,
            },
        );
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: TokenScope, user_id: i64) -> AppResult<()> {
        self.tables
            .tokens
            .retain(|_, token| !(token.scope == scope && token.user_id == user_id));
        Ok(())
    }
}

impl PermissionRepository for InMemoryStore {
    async fn get_all_for_user(&self, user_id: i64) -> AppResult<Permissions> {
        Ok(self
            .tables
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> AppResult<()> {
        let mut granted = self.tables.permissions.entry(user_id).or_default();
        for code in codes {
            if !granted.iter().any(|existing| existing == code) {
                granted.push((*code).to_string());
            }
        }
        Ok(())
    }
}
