//! Record types and their validation rules.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::data::validator::{self, Validator};
use crate::data::versioned::Versioned;

/// Movie runtime in minutes, encoded on the wire as `"<n> mins"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Runtime(pub i32);

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{} mins", self.0))
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuntimeVisitor;

        impl Visitor<'_> for RuntimeVisitor {
            type Value = Runtime;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a runtime of the form \"<n> mins\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Runtime, E> {
                let minutes = value
                    .strip_suffix(" mins")
                    .filter(|n| !n.contains(' '))
                    .and_then(|n| n.parse::<i32>().ok())
                    .ok_or_else(|| E::custom("invalid runtime format"))?;
                Ok(Runtime(minutes))
            }
        }

        deserializer.deserialize_str(RuntimeVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieData {
    pub title: String,
    pub year: i32,
    pub runtime: Runtime,
    pub genres: Vec<String>,
}

pub type Movie = Versioned<MovieData>;

pub fn validate_movie(v: &mut Validator, movie: &MovieData) {
    v.check(!movie.title.is_empty(), "title", "must be provided");
    v.check(movie.title.len() <= 500, "title", "must not be more than 500 bytes long");

    v.check(movie.year != 0, "year", "must be provided");
    v.check(movie.year >= 1888, "year", "must be greater than 1888");
    v.check(movie.year <= Utc::now().year(), "year", "must not be in the future");

    v.check(movie.runtime.0 != 0, "runtime", "must be provided");
    v.check(movie.runtime.0 > 0, "runtime", "must be a positive integer");

    v.check(!movie.genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(movie.genres.len() <= 5, "genres", "must not contain more than 5 genres");
    v.check(validator::unique(&movie.genres), "genres", "must not contain duplicate values");
}

pub const MOVIE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

/// Query options for listing movies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieFilter {
    /// Every word must appear in the title (case-insensitive). Empty matches all.
    pub title: String,
    /// Every listed genre must be present. Empty matches all.
    pub genres: Vec<String>,
    pub page: usize,
    pub page_size: usize,
    pub sort: String,
}

impl Default for MovieFilter {
    fn default() -> Self {
        Self {
            title: String::new(),
            genres: Vec::new(),
            page: 1,
            page_size: 20,
            sort: "id".to_string(),
        }
    }
}

impl MovieFilter {
    pub fn sort_column(&self) -> &str {
        self.sort.trim_start_matches('-')
    }

    pub fn descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1)).saturating_mul(self.page_size)
    }

    pub fn matches(&self, movie: &MovieData) -> bool {
        let title = movie.title.to_lowercase();
        let words: Vec<&str> = title.split_whitespace().collect();
        let title_ok = self
            .title
            .to_lowercase()
            .split_whitespace()
            .all(|wanted| words.contains(&wanted));
        let genres_ok = self.genres.iter().all(|g| movie.genres.contains(g));
        title_ok && genres_ok
    }
}

pub fn validate_filter(v: &mut Validator, filter: &MovieFilter) {
    v.check(filter.page > 0, "page", "must be greater than zero");
    v.check(filter.page <= 10_000_000, "page", "must be a maximum of 10 million");
    v.check(filter.page_size > 0, "page_size", "must be greater than zero");
    v.check(filter.page_size <= 100, "page_size", "must be a maximum of 100");
    v.check(
        validator::permitted_value(&filter.sort.as_str(), MOVIE_SORT_SAFELIST),
        "sort",
        "invalid sort value",
    );
}

/// Pagination details returned alongside a page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: usize,
    pub page_size: usize,
    pub first_page: usize,
    pub last_page: usize,
    pub total_records: usize,
}

impl Metadata {
    pub fn calculate(total_records: usize, page: usize, page_size: usize) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_records.div_ceil(page_size),
            total_records,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserData {
    pub name: String,
    pub email: String,
    pub activated: bool,
}

pub type User = Versioned<UserData>;

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(validator::is_email(email), "email", "must be a valid email address");
}

pub fn validate_user(v: &mut Validator, user: &UserData) {
    v.check(!user.name.is_empty(), "name", "must be provided");
    v.check(user.name.len() <= 500, "name", "must not be more than 500 bytes long");
    validate_email(v, &user.email);
}

pub fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(token.len() == 26, "token", "must be 26 bytes long");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Activation,
    Authentication,
}

/// A stored credential. Only the SHA-256 of the plaintext is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub hash: [u8; 32],
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

/// Permission codes granted to a user, such as `movies:read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Permissions(Vec<String>);

impl Permissions {
    pub fn include(&self, code: &str) -> bool {
        self.0.iter().any(|granted| granted == code)
    }
}

impl<S: Into<String>> FromIterator<S> for Permissions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> MovieData {
        MovieData {
            title: "Moana".to_string(),
            year: 2016,
            runtime: Runtime(107),
            genres: vec!["animation".to_string(), "adventure".to_string()],
        }
    }

    fn errors_for(data: &MovieData) -> Vec<String> {
        let mut v = Validator::new();
        validate_movie(&mut v, data);
        match v.finish() {
            Ok(()) => Vec::new(),
            Err(crate::error::AppError::FailedValidation(errors)) => errors.into_keys().collect(),
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn runtime_uses_minutes_suffix_on_the_wire() {
        assert_eq!(serde_json::to_string(&Runtime(102)).unwrap(), "\"102 mins\"");
        let parsed: Runtime = serde_json::from_str("\"95 mins\"").unwrap();
        assert_eq!(parsed, Runtime(95));

        assert!(serde_json::from_str::<Runtime>("95").is_err());
        assert!(serde_json::from_str::<Runtime>("\"95 minutes\"").is_err());
        assert!(serde_json::from_str::<Runtime>("\"9 5 mins\"").is_err());
    }

    #[test]
    fn valid_movie_passes() {
        assert!(errors_for(&movie()).is_empty());
    }

    #[test]
    fn movie_rules() {
        let mut bad = movie();
        bad.title = String::new();
        bad.year = 1700;
        bad.runtime = Runtime(-5);
        bad.genres = vec!["a".into(), "a".into()];
        assert_eq!(errors_for(&bad), vec!["genres", "runtime", "title", "year"]);

        let mut future = movie();
        future.year = Utc::now().year() + 1;
        assert_eq!(errors_for(&future), vec!["year"]);

        let mut crowded = movie();
        crowded.genres = (0..6).map(|n| n.to_string()).collect();
        assert_eq!(errors_for(&crowded), vec!["genres"]);
    }

    #[test]
    fn filter_matches_all_title_words_and_genres() {
        let filter = MovieFilter {
            title: "MOANA".to_string(),
            genres: vec!["animation".to_string()],
            ..MovieFilter::default()
        };
        assert!(filter.matches(&movie()));

        let filter = MovieFilter {
            title: "moana frozen".to_string(),
            ..MovieFilter::default()
        };
        assert!(!filter.matches(&movie()));
    }

    #[test]
    fn filter_rejects_unknown_sort_keys() {
        let mut v = Validator::new();
        validate_filter(
            &mut v,
            &MovieFilter {
                sort: "budget".to_string(),
                ..MovieFilter::default()
            },
        );
        assert!(!v.valid());
    }

    #[test]
    fn metadata_pages() {
        assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());
        let meta = Metadata::calculate(41, 2, 20);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.current_page, 2);
    }

    #[test]
    fn permissions_include_exact_codes_only() {
        let perms: Permissions = ["movies:read"].into_iter().collect();
        assert!(perms.include("movies:read"));
        assert!(!perms.include("movies:write"));
        assert!(!perms.include("movies"));
    }
}
