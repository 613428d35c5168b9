use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    access::ensure_not_self,
    auth::{
        password::{generate_random_password, hash_password, GENERATED_PASSWORD_LENGTH},
        AdminUser,
    },
    error::{AppError, AppResult},
    mail::OutgoingMail,
    models::{NewUser, User},
    routes::{escape_like, MessageResponse},
    schema::users,
    state::AppState,
    validation::FormValidator,
};

const EMAIL_MAX: usize = 150;
const CREATE_ATTEMPTS: usize = 3;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct CreateUserResponse {
    pub user: UserResponse,
    pub credentials_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Login name derived from an email address: its local part.
pub fn username_base(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

/// `base` if free, otherwise `base1`, `base2`, ... up to the first unused name.
pub fn next_available_username(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut counter = 1usize;
    loop {
        let candidate = format!("{base}{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn load_user(conn: &mut PgConnection, user_id: i32) -> AppResult<User> {
    users::table
        .find(user_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("user not found"))
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<User> = users::table.order(users::name.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<Json<CreateUserResponse>> {
    let mut form = FormValidator::new();
    let email = form
        .email("email", payload.email.as_deref(), EMAIL_MAX)
        .ok_or_else(|| form.into_error())?;
    let base = username_base(&email).to_string();
    let password = generate_random_password(GENERATED_PASSWORD_LENGTH);
    let password_hash = hash_password(&password)?;

    let user = {
        let mut conn = state.db()?;
        let mut created: Option<User> = None;
        for attempt in 1..=CREATE_ATTEMPTS {
            let email_taken = users::table
                .filter(users::email.eq(&email))
                .select(users::id)
                .first::<i32>(&mut conn)
                .optional()?
                .is_some();
            if email_taken {
                return Err(AppError::bad_request("user with this email already exists"));
            }

            let taken: HashSet<String> = users::table
                .filter(users::name.like(format!("{}%", escape_like(&base))))
                .select(users::name)
                .load::<String>(&mut conn)?
                .into_iter()
                .collect();
            let name = next_available_username(&base, &taken);

            let new_user = NewUser {
                name,
                email: Some(email.clone()),
                password_hash: password_hash.clone(),
                is_active: true,
                is_admin: false,
            };
            match diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(&mut conn)
            {
                Ok(user) => {
                    created = Some(user);
                    break;
                }
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    warn!(attempt, name = %new_user.name, "username taken concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        created.ok_or_else(|| AppError::internal("could not allocate a unique username"))?
    };

    info!(user_id = user.id, name = %user.name, created_by = admin.user_id, "user created");

    let mail = OutgoingMail::credentials(&email, &user.name, &password);
    let (credentials_sent, warning) = match state.mailer.send(&mail).await {
        Ok(()) => (true, None),
        Err(err) => {
            warn!(user_id = user.id, error = %err, "failed to send credentials mail");
            (
                false,
                Some(format!("user created but failed to send email: {err}")),
            )
        }
    };

    Ok(Json(CreateUserResponse {
        user: user.into(),
        credentials_sent,
        warning,
    }))
}

pub async fn toggle_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<UserResponse>> {
    let mut conn = state.db()?;
    let target = load_user(&mut conn, user_id)?;
    ensure_not_self(&admin, target.id)?;

    let updated: User = diesel::update(users::table.find(user_id))
        .set(users::is_active.eq(!target.is_active))
        .get_result(&mut conn)?;

    info!(
        user_id,
        is_active = updated.is_active,
        changed_by = admin.user_id,
        "user status changed"
    );
    Ok(Json(updated.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let mut conn = state.db()?;
    let target = load_user(&mut conn, user_id)?;
    ensure_not_self(&admin, target.id)?;

    diesel::delete(users::table.find(user_id)).execute(&mut conn)?;
    info!(user_id, deleted_by = admin.user_id, "user deleted");
    Ok(Json(MessageResponse::new("user deleted")))
}
