//! Movie resource handlers.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::data::models::{validate_filter, validate_movie};
use crate::data::{MovieData, MovieFilter, Runtime, Store, Validator};
use crate::error::{AppError, AppResult};
use crate::http::request::{self, expected_version, JsonBody, ResourceId};
use crate::http::response::{envelope, Envelope};
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateMovieInput {
    title: String,
    year: i32,
    runtime: Option<Runtime>,
    genres: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpdateMovieInput {
    title: Option<String>,
    year: Option<i32>,
    runtime: Option<Runtime>,
    genres: Option<Vec<String>>,
}

pub async fn create_movie<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(input): JsonBody<CreateMovieInput>,
) -> AppResult<impl IntoResponse> {
    let data = MovieData {
        title: input.title,
        year: input.year,
        runtime: input.runtime.unwrap_or(Runtime(0)),
        genres: input.genres,
    };

    let mut v = Validator::new();
    validate_movie(&mut v, &data);
    v.finish()?;

    let movie = state.store.insert_movie(data).await?;
    tracing::info!(movie_id = movie.id, "Movie created");

    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|e| AppError::internal(format!("invalid Location header: {e}")))?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        envelope("movie", movie)?,
    ))
}

pub async fn show_movie<S: Store>(
    State(state): State<AppState<S>>,
    ResourceId(id): ResourceId,
) -> AppResult<Json<Value>> {
    let movie = state.store.get_movie(id).await?;
    envelope("movie", movie)
}

pub async fn list_movies<S: Store>(
    State(state): State<AppState<S>>,
    Query(qs): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let mut v = Validator::new();
    let defaults = MovieFilter::default();
    let filter = MovieFilter {
        title: request::read_string(&qs, "title", ""),
        genres: request::read_csv(&qs, "genres"),
        page: request::read_int(&qs, "page", defaults.page, &mut v),
        page_size: request::read_int(&qs, "page_size", defaults.page_size, &mut v),
        sort: request::read_string(&qs, "sort", &defaults.sort),
    };
    validate_filter(&mut v, &filter);
    v.finish()?;

    let (movies, metadata) = state.store.list_movies(&filter).await?;
    Ok(Envelope::new()
        .with("movies", movies)?
        .with("metadata", metadata)?
        .into_json())
}

/// Partial update through the version check.
///
/// With `X-Expected-Version` the client's own view must still be current;
/// without it the version read here is the one the write is conditioned on.
pub async fn update_movie<S: Store>(
    State(state): State<AppState<S>>,
    ResourceId(id): ResourceId,
    headers: HeaderMap,
    JsonBody(input): JsonBody<UpdateMovieInput>,
) -> AppResult<Json<Value>> {
    let mut movie = state.store.get_movie(id).await?;

    if let Some(expected) = expected_version(&headers)? {
        if expected != movie.version {
            return Err(AppError::EditConflict);
        }
    }

    if let Some(title) = input.title {
        movie.data.title = title;
    }
    if let Some(year) = input.year {
        movie.data.year = year;
    }
    if let Some(runtime) = input.runtime {
        movie.data.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        movie.data.genres = genres;
    }

    let mut v = Validator::new();
    validate_movie(&mut v, &movie.data);
    v.finish()?;

    state.store.update_movie(&mut movie).await?;
    envelope("movie", movie)
}

pub async fn delete_movie<S: Store>(
    State(state): State<AppState<S>>,
    ResourceId(id): ResourceId,
) -> AppResult<Json<Value>> {
    state.store.delete_movie(id).await?;
    envelope("message", "movie successfully deleted")
}
