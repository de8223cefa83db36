// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User routes: CRUD, event membership, login and admin bootstrap.

use crate::error::{AppError, Result};
use crate::models::user::parse_birthday;
use crate::models::{NewUser, UserResponse, UserUpdate};
use crate::routes::MessageResponse;
use crate::services::Authenticator;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route(
            "/users/username/{username}",
            get(get_user_by_username)
                .put(update_user_by_username)
                .delete(delete_user_by_username),
        )
        .route("/users/{id}/addEvent", put(add_event_to_user))
        .route("/users/auth/login", post(login))
        .route("/users/auth/create-admin", post(create_admin))
}

// ─── Request Bodies ──────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserBody {
    #[validate(length(min = 1, max = 64))]
    username: String,
    #[serde(alias = "gmail")]
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
    birthday: String,
}

impl CreateUserBody {
    fn into_new_user(self) -> Result<NewUser> {
        let body = CreateUserBody {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self
        };
        body.validate()?;

        let birthday = parse_birthday(&body.birthday).ok_or_else(|| {
            AppError::Validation("birthday must be a date (YYYY-MM-DD)".to_string())
        })?;

        Ok(NewUser {
            username: body.username,
            email: body.email,
            password: body.password,
            birthday,
        })
    }
}

/// Partial update body. Unknown fields (including `events`) are ignored:
/// memberships only change through `addEvent` and deletions.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserBody {
    #[validate(length(min = 1, max = 64))]
    username: Option<String>,
    #[serde(alias = "gmail")]
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 1))]
    password: Option<String>,
    birthday: Option<String>,
}

impl UpdateUserBody {
    fn into_update(self) -> Result<UserUpdate> {
        let body = UpdateUserBody {
            username: self.username.map(|u| u.trim().to_string()),
            email: self.email.map(|e| e.trim().to_string()),
            ..self
        };
        body.validate()?;

        let birthday = body
            .birthday
            .as_deref()
            .map(|raw| {
                parse_birthday(raw).ok_or_else(|| {
                    AppError::Validation("birthday must be a date (YYYY-MM-DD)".to_string())
                })
            })
            .transpose()?;

        Ok(UserUpdate {
            username: body.username,
            email: body.email,
            password: body.password,
            birthday,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddEventBody {
    #[serde(rename = "eventId", default)]
    event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    username: String,
    password: String,
}

/// Successful login response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserResponse,
}

// ─── CRUD ────────────────────────────────────────────────────

async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CreateUserBody>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let Json(body) = payload?;
    let user = state.users.create(body.into_new_user()?).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserResponse>>> {
    let users = state.users.list().await?;
    tracing::debug!(count = users.len(), "Listing users");
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = state
        .users
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
    Ok(Json(user.into()))
}

async fn get_user_by_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>> {
    let username = username.trim();
    let user = state
        .users
        .get_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;
    Ok(Json(user.into()))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateUserBody>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let Json(body) = payload?;
    let user = state.users.update_by_id(&id, body.into_update()?).await?;
    Ok(Json(user.into()))
}

async fn update_user_by_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    payload: std::result::Result<Json<UpdateUserBody>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let Json(body) = payload?;
    let user = state
        .users
        .update_by_username(username.trim(), body.into_update()?)
        .await?;
    Ok(Json(user.into()))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = state.users.delete_by_id(&id).await?;
    state
        .relationships
        .on_user_deleted(&user.id, &user.events)
        .await?;
    Ok(Json(user.into()))
}

async fn delete_user_by_username(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>> {
    let user = state.users.delete_by_username(username.trim()).await?;
    state
        .relationships
        .on_user_deleted(&user.id, &user.events)
        .await?;
    Ok(Json(user.into()))
}

// ─── Event Membership ────────────────────────────────────────

async fn add_event_to_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<AddEventBody>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let Json(body) = payload?;
    let event_id = body
        .event_id
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("eventId is required".to_string()))?;

    let user = state
        .relationships
        .on_user_added_to_event(&id, &event_id)
        .await?;
    Ok(Json(user.into()))
}

// ─── Authentication ──────────────────────────────────────────

async fn login(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(body) = payload?;
    // Usernames are stored trimmed.
    let user = Authenticator::new(&state.users)
        .login(body.username.trim(), &body.password)
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        user: user.into(),
    }))
}

/// Idempotent admin bootstrap (also run at startup).
async fn create_admin(State(state): State<Arc<AppState>>) -> Result<Json<MessageResponse>> {
    let created = state.users.ensure_admin(&state.config.admin).await?;
    let message = if created {
        "Admin user created"
    } else {
        "Admin user already exists"
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_body(json: serde_json::Value) -> CreateUserBody {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_create_body_accepts_gmail_alias() {
        let new_user = create_body(serde_json::json!({
            "username": " alice ",
            "gmail": "a@x.com",
            "password": "pw1",
            "birthday": "1990-01-01",
        }))
        .into_new_user()
        .unwrap();

        assert_eq!(new_user.username, "alice");
        assert_eq!(new_user.email, "a@x.com");
    }

    #[test]
    fn test_create_body_rejects_bad_email_and_birthday() {
        let bad_email = create_body(serde_json::json!({
            "username": "alice",
            "email": "not-an-email",
            "password": "pw1",
            "birthday": "1990-01-01",
        }));
        assert!(matches!(
            bad_email.into_new_user(),
            Err(AppError::Validation(_))
        ));

        let bad_birthday = create_body(serde_json::json!({
            "username": "alice",
            "email": "a@x.com",
            "password": "pw1",
            "birthday": "yesterday",
        }));
        assert!(matches!(
            bad_birthday.into_new_user(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_blank_username_rejected() {
        let body = create_body(serde_json::json!({
            "username": "   ",
            "email": "a@x.com",
            "password": "pw1",
            "birthday": "1990-01-01",
        }));
        assert!(matches!(body.into_new_user(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_body_ignores_events_field() {
        let body: UpdateUserBody = serde_json::from_value(serde_json::json!({
            "birthday": "1991-02-03",
            "events": ["e1"],
        }))
        .unwrap();
        let update = body.into_update().unwrap();

        assert!(update.username.is_none());
        assert!(update.password.is_none());
        assert_eq!(
            update.birthday,
            chrono::NaiveDate::from_ymd_opt(1991, 2, 3)
        );
    }
}
