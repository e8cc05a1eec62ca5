//! User registration and activation.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::data::models::{validate_token_plaintext, validate_user};
use crate::data::{Store, TokenScope, UserData, Validator};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::http::request::JsonBody;
use crate::http::response::envelope;
use crate::http::server::AppState;
use crate::notifier::Notification;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterUserInput {
    name: String,
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateUserInput {
    token: String,
}

pub async fn register_user<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(input): JsonBody<RegisterUserInput>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let data = UserData {
        name: input.name,
        email: input.email,
        activated: false,
    };

    let mut v = Validator::new();
    validate_user(&mut v, &data);
    v.finish()?;

    let user = state.store.insert_user(data).await?;
    tracing::info!(user_id = user.id, "User registered");

    let notifier = state.notifier.clone();
    let notification = Notification {
        recipient: user.data.email.clone(),
        template: "user_welcome.tmpl",
        data: json!({ "userID": user.id, "userName": user.data.name }),
    };
    state
        .background
        .run("welcome_notification", async move { notifier.send(notification).await });

    Ok((StatusCode::ACCEPTED, envelope("user", user)?))
}

pub async fn activate_user<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(input): JsonBody<ActivateUserInput>,
) -> AppResult<Json<Value>> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    v.finish()?;

    let mut user = match state
        .store
        .get_for_token(TokenScope::Activation, &input.token)
        .await
    {
        Ok(user) => user,
        Err(AppError::RecordNotFound) => {
            let mut errors = FieldErrors::new();
            errors.insert(
                "token".to_string(),
                "invalid or expired activation token".to_string(),
            );
            return Err(AppError::FailedValidation(errors));
        }
        Err(e) => return Err(e),
    };

    user.data.activated = true;
    state.store.update_user(&mut user).await?;
    state
        .store
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;
    tracing::info!(user_id = user.id, "User activated");

    envelope("user", user)
}
