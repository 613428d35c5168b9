use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    access::ensure_can_access,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{Case, NewCase},
    routes::{as_text, like_pattern, MessageResponse, SearchQuery},
    schema::{case_files, cases, notes},
    state::AppState,
    validation::FormValidator,
};

const TEXT_MAX: usize = 100;
const PHONE_MAX: usize = 20;

#[derive(Deserialize)]
pub struct CaseForm {
    pub title: Option<String>,
    pub details: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct CaseResponse {
    pub id: i32,
    pub title: String,
    pub details: String,
    pub full_name: String,
    pub phone: String,
    pub creator_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Case> for CaseResponse {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            title: case.title,
            details: case.details,
            full_name: case.full_name,
            phone: case.phone,
            creator_id: case.creator_id,
            created_at: case.created_at,
            updated_at: case.updated_at,
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = cases)]
struct CaseChangeset {
    title: String,
    details: String,
    full_name: String,
    phone: String,
}

impl CaseForm {
    fn validate(&self) -> AppResult<CaseChangeset> {
        let mut form = FormValidator::new();
        let title = form.text("title", self.title.as_deref(), TEXT_MAX);
        let details = form.text("details", self.details.as_deref(), TEXT_MAX);
        let full_name = form.text("full_name", self.full_name.as_deref(), TEXT_MAX);
        let phone = form.text("phone", self.phone.as_deref(), PHONE_MAX);

        match (title, details, full_name, phone) {
            (Some(title), Some(details), Some(full_name), Some(phone)) => Ok(CaseChangeset {
                title,
                details,
                full_name,
                phone,
            }),
            _ => Err(form.into_error()),
        }
    }
}

fn case_exists() -> AppError {
    AppError::bad_request("case already exists")
}

fn phone_taken(conn: &mut PgConnection, phone: &str, except: Option<i32>) -> AppResult<bool> {
    let mut query = cases::table
        .filter(cases::phone.eq(phone))
        .select(cases::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(cases::id.ne(id));
    }
    Ok(query.first::<i32>(conn).optional()?.is_some())
}

pub async fn list_cases(State(state): State<AppState>) -> AppResult<Json<Vec<CaseResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Case> = cases::table
        .order(cases::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CaseResponse::from).collect()))
}

pub async fn search_cases(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<CaseResponse>>> {
    let mut conn = state.db()?;
    let mut statement = cases::table.order(cases::created_at.desc()).into_boxed();

    if let Some(term) = query.term()? {
        let pattern = like_pattern(term);
        statement = statement.filter(
            as_text("cases.id")
                .ilike(pattern.clone())
                .or(cases::title.ilike(pattern.clone()))
                .or(cases::details.ilike(pattern.clone()))
                .or(cases::full_name.ilike(pattern.clone()))
                .or(cases::phone.ilike(pattern)),
        );
    }

    let rows: Vec<Case> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CaseResponse::from).collect()))
}

pub async fn get_case(
    State(state): State<AppState>,
    Path(case_id): Path<i32>,
) -> AppResult<Json<CaseResponse>> {
    let mut conn = state.db()?;
    let case: Case = cases::table
        .find(case_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("case not found"))?;
    Ok(Json(case.into()))
}

pub async fn create_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CaseForm>,
) -> AppResult<Json<CaseResponse>> {
    let fields = payload.validate()?;
    let mut conn = state.db()?;

    if phone_taken(&mut conn, &fields.phone, None)? {
        return Err(case_exists());
    }

    let new_case = NewCase {
        title: fields.title,
        details: fields.details,
        full_name: fields.full_name,
        phone: fields.phone,
        creator_id: Some(user.user_id),
    };

    let case: Case = match diesel::insert_into(cases::table)
        .values(&new_case)
        .get_result(&mut conn)
    {
        Ok(case) => case,
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(case_exists());
        }
        Err(err) => return Err(err.into()),
    };

    info!(case_id = case.id, user_id = user.user_id, "case created");
    Ok(Json(case.into()))
}

pub async fn update_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<i32>,
    Json(payload): Json<CaseForm>,
) -> AppResult<Json<CaseResponse>> {
    let mut conn = state.db()?;
    let existing: Case = cases::table
        .find(case_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("case not found"))?;
    ensure_can_access(&user, &existing)?;

    let changes = payload.validate()?;
    if phone_taken(&mut conn, &changes.phone, Some(case_id))? {
        return Err(case_exists());
    }

    let case: Case = match diesel::update(cases::table.find(case_id))
        .set(&changes)
        .get_result(&mut conn)
    {
        Ok(case) => case,
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(case_exists());
        }
        Err(err) => return Err(err.into()),
    };

    info!(case_id, user_id = user.user_id, "case updated");
    Ok(Json(case.into()))
}

pub async fn delete_case(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let mut conn = state.db()?;
    let existing: Case = cases::table
        .find(case_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("case not found"))?;
    ensure_can_access(&user, &existing)?;

    let note_count: i64 = notes::table
        .filter(notes::case_id.eq(case_id))
        .select(count_star())
        .first(&mut conn)?;
    if note_count > 0 {
        return Err(AppError::bad_request(
            "case is associated with notes and cannot be deleted",
        ));
    }

    let file_count: i64 = case_files::table
        .filter(case_files::case_id.eq(case_id))
        .select(count_star())
        .first(&mut conn)?;
    if file_count > 0 {
        return Err(AppError::bad_request(
            "case has attached files and cannot be deleted",
        ));
    }

    diesel::delete(cases::table.find(case_id)).execute(&mut conn)?;
    info!(case_id, user_id = user.user_id, "case deleted");
    Ok(Json(MessageResponse::new("case deleted")))
}
