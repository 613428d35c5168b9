pub mod bootstrap;
pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Session, User},
    schema::{sessions, users},
    state::AppState,
};

/// The caller behind a valid, unrevoked session. The account is re-read on
/// every request so deactivation and logout take effect immediately.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub name: String,
    pub is_admin: bool,
    #[serde(skip_serializing)]
    pub session_id: Uuid,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        let mut conn = state.db()?;
        let now = Utc::now().naive_utc();
        let (session, user): (Session, User) = sessions::table
            .inner_join(users::table)
            .filter(sessions::id.eq(claims.sid))
            .filter(sessions::revoked_at.is_null())
            .filter(sessions::expires_at.gt(now))
            .select((sessions::all_columns, users::all_columns))
            .first(&mut conn)
            .optional()?
            .ok_or_else(AppError::unauthorized)?;

        if session.user_id != claims.sub || !user.is_active {
            return Err(AppError::unauthorized());
        }

        let authenticated = AuthenticatedUser {
            user_id: user.id,
            name: user.name,
            is_admin: user.is_admin,
            session_id: session.id,
        };
        parts.extensions.insert(authenticated.clone());
        Ok(authenticated)
    }
}

/// An authenticated caller holding the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::forbidden_with("admin access required"));
        }
        Ok(AdminUser(user))
    }
}
