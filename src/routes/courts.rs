use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::AdminUser,
    error::{AppError, AppResult},
    models::{Court, NewCourt},
    routes::{as_text, like_pattern, MessageResponse, SearchQuery},
    schema::{courts, notes},
    state::AppState,
    validation::FormValidator,
};

const TEXT_MAX: usize = 100;

#[derive(Deserialize)]
pub struct CourtForm {
    pub title: Option<String>,
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct CourtResponse {
    pub id: i32,
    pub title: String,
    pub address: String,
    pub created_at: NaiveDateTime,
}

impl From<Court> for CourtResponse {
    fn from(court: Court) -> Self {
        Self {
            id: court.id,
            title: court.title,
            address: court.address,
            created_at: court.created_at,
        }
    }
}

impl CourtForm {
    fn validate(&self) -> AppResult<NewCourt> {
        let mut form = FormValidator::new();
        let title = form.text("title", self.title.as_deref(), TEXT_MAX);
        let address = form.text("address", self.address.as_deref(), TEXT_MAX);
        match (title, address) {
            (Some(title), Some(address)) => Ok(NewCourt { title, address }),
            _ => Err(form.into_error()),
        }
    }
}

fn title_taken(conn: &mut PgConnection, title: &str, except: Option<i32>) -> AppResult<bool> {
    let mut query = courts::table
        .filter(courts::title.eq(title))
        .select(courts::id)
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(courts::id.ne(id));
    }
    Ok(query.first::<i32>(conn).optional()?.is_some())
}

fn load_court(conn: &mut PgConnection, court_id: i32) -> AppResult<Court> {
    courts::table
        .find(court_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("court not found"))
}

pub async fn list_courts(State(state): State<AppState>) -> AppResult<Json<Vec<CourtResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Court> = courts::table.order(courts::title.asc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CourtResponse::from).collect()))
}

pub async fn search_courts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<CourtResponse>>> {
    let mut conn = state.db()?;
    let mut statement = courts::table.order(courts::title.asc()).into_boxed();

    if let Some(term) = query.term()? {
        let pattern = like_pattern(term);
        statement = statement.filter(
            as_text("courts.id")
                .ilike(pattern.clone())
                .or(courts::title.ilike(pattern.clone()))
                .or(courts::address.ilike(pattern)),
        );
    }

    let rows: Vec<Court> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(CourtResponse::from).collect()))
}

pub async fn get_court(
    State(state): State<AppState>,
    Path(court_id): Path<i32>,
) -> AppResult<Json<CourtResponse>> {
    let mut conn = state.db()?;
    Ok(Json(load_court(&mut conn, court_id)?.into()))
}

pub async fn create_court(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CourtForm>,
) -> AppResult<Json<CourtResponse>> {
    let new_court = payload.validate()?;
    let mut conn = state.db()?;

    if title_taken(&mut conn, &new_court.title, None)? {
        return Err(AppError::bad_request("court already exists"));
    }

    let court: Court = diesel::insert_into(courts::table)
        .values(&new_court)
        .get_result(&mut conn)?;

    info!(court_id = court.id, user_id = admin.user_id, "court created");
    Ok(Json(court.into()))
}

pub async fn update_court(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(court_id): Path<i32>,
    Json(payload): Json<CourtForm>,
) -> AppResult<Json<CourtResponse>> {
    let mut conn = state.db()?;
    load_court(&mut conn, court_id)?;

    let changes = payload.validate()?;
    if title_taken(&mut conn, &changes.title, Some(court_id))? {
        return Err(AppError::bad_request("court already exists"));
    }

    let court: Court = diesel::update(courts::table.find(court_id))
        .set((
            courts::title.eq(&changes.title),
            courts::address.eq(&changes.address),
        ))
        .get_result(&mut conn)?;

    info!(court_id, user_id = admin.user_id, "court updated");
    Ok(Json(court.into()))
}

pub async fn delete_court(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(court_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let mut conn = state.db()?;
    load_court(&mut conn, court_id)?;

    let note_count: i64 = notes::table
        .filter(notes::court_id.eq(court_id))
        .select(count_star())
        .first(&mut conn)?;
    if note_count > 0 {
        return Err(AppError::bad_request(
            "court is associated with notes and cannot be deleted",
        ));
    }

    diesel::delete(courts::table.find(court_id)).execute(&mut conn)?;
    info!(court_id, user_id = admin.user_id, "court deleted");
    Ok(Json(MessageResponse::new("court deleted")))
}
