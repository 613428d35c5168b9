use axum::{extract::State, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::{bootstrap, password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewSession, User},
    routes::MessageResponse,
    schema::{sessions, users},
    state::AppState,
    validation::{has_sql_injection, FieldReason, FormValidator},
};

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AuthenticatedUser,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;
    bootstrap::ensure_admin(&mut conn, state.config.admin_password.as_deref())?;

    let mut form = FormValidator::new();
    for (field, value) in [("name", &payload.name), ("password", &payload.password)] {
        if value.is_empty() {
            form.reject(field, FieldReason::Required);
        } else if has_sql_injection(value) {
            form.reject(field, FieldReason::ForbiddenPattern);
        }
    }
    if !form.is_valid() {
        return Err(form.into_error());
    }

    let user: User = users::table
        .filter(users::name.eq(&payload.name))
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| {
            info!(name = %payload.name, "login rejected: unknown name");
            AppError::unauthorized_with("name does not exist")
        })?;

    if !user.is_active {
        info!(user_id = user.id, "login rejected: account deactivated");
        return Err(AppError::forbidden_with("account has been deactivated"));
    }

    if !password::verify_password(&payload.password, &user.password_hash)? {
        info!(user_id = user.id, "login rejected: incorrect password");
        return Err(AppError::unauthorized_with("incorrect password"));
    }

    let issued_at = Utc::now();
    let lifetime = state.jwt.session_lifetime(payload.remember);
    let expires_at = issued_at + lifetime;
    let session = NewSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        remember: payload.remember,
        issued_at: issued_at.naive_utc(),
        expires_at: expires_at.naive_utc(),
    };
    diesel::insert_into(sessions::table)
        .values(&session)
        .execute(&mut conn)?;

    let access_token =
        state
            .jwt
            .generate_token(session.id, user.id, &user.name, issued_at, expires_at)?;

    info!(user_id = user.id, remember = payload.remember, "user logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: lifetime.num_seconds(),
        user: AuthenticatedUser {
            user_id: user.id,
            name: user.name,
            is_admin: user.is_admin,
            session_id: session.id,
        },
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    let mut conn = state.db()?;
    diesel::update(
        sessions::table
            .filter(sessions::id.eq(user.session_id))
            .filter(sessions::revoked_at.is_null()),
    )
    .set(sessions::revoked_at.eq(Utc::now().naive_utc()))
    .execute(&mut conn)?;

    Ok(Json(MessageResponse::new("logged out")))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
