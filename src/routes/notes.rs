use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    access::ensure_can_access,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{Case, Court, Note, NoteWrite},
    routes::{as_text, like_pattern, MessageResponse, SearchQuery},
    schema::{cases, courts, notes},
    state::AppState,
    validation::FormValidator,
};

pub const NOTE_STATUSES: &[&str] = &["resolved", "pending", "rejected"];

const DETAILS_MAX: usize = 100;

#[derive(Deserialize)]
pub struct NoteForm {
    pub case_id: Option<String>,
    pub court_id: Option<String>,
    pub status: Option<String>,
    pub details: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Serialize)]
pub struct NoteResponse {
    pub id: i32,
    pub client_name: String,
    pub case_title: String,
    pub court_address: String,
    pub court_name: String,
    pub details: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: String,
    pub case_id: i32,
    pub court_id: i32,
    pub creator_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            client_name: note.client_name,
            case_title: note.case_title,
            court_address: note.court_address,
            court_name: note.court_name,
            details: note.details,
            date: note.hearing_date,
            time: note.hearing_time,
            status: note.status,
            case_id: note.case_id,
            court_id: note.court_id,
            creator_id: note.creator_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl NoteForm {
    /// Validates the form, then snapshots the referenced case and court.
    fn into_write(self, conn: &mut PgConnection) -> AppResult<NoteWrite> {
        let mut form = FormValidator::new();
        let case_id = form.id("case_id", self.case_id.as_deref());
        let court_id = form.id("court_id", self.court_id.as_deref());
        let status = form.choice("status", self.status.as_deref(), NOTE_STATUSES);
        let details = form.optional_text("details", self.details.as_deref(), DETAILS_MAX);
        let date = form.date("date", self.date.as_deref());
        let time = form.time("time", self.time.as_deref());

        let (case_id, court_id, status, details, date, time) =
            match (case_id, court_id, status, details, date, time) {
                (Some(case_id), Some(court_id), Some(status), Ok(details), Some(date), Some(time)) => {
                    (case_id, court_id, status, details, date, time)
                }
                _ => return Err(form.into_error()),
            };

        let case: Option<Case> = cases::table.find(case_id).first(conn).optional()?;
        let court: Option<Court> = courts::table.find(court_id).first(conn).optional()?;
        let (Some(case), Some(court)) = (case, court) else {
            return Err(AppError::not_found_with("case or court not found"));
        };

        Ok(NoteWrite::snapshot(&case, &court, details, date, time, status))
    }
}

fn load_note(conn: &mut PgConnection, note_id: i32) -> AppResult<Note> {
    notes::table
        .find(note_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("note not found"))
}

pub async fn list_notes(State(state): State<AppState>) -> AppResult<Json<Vec<NoteResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<Note> = notes::table
        .order((notes::hearing_date.desc(), notes::hearing_time.desc()))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(NoteResponse::from).collect()))
}

pub async fn search_notes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<NoteResponse>>> {
    let mut conn = state.db()?;
    let mut statement = notes::table
        .order((notes::hearing_date.desc(), notes::hearing_time.desc()))
        .into_boxed();

    if let Some(term) = query.term()? {
        let pattern = like_pattern(term);
        statement = statement.filter(
            notes::client_name
                .ilike(pattern.clone())
                .or(notes::case_title.ilike(pattern.clone()))
                .or(notes::court_address.ilike(pattern.clone()))
                .or(notes::court_name.ilike(pattern.clone()))
                .or(notes::details.ilike(pattern.clone()))
                .or(notes::status.ilike(pattern.clone()))
                .or(as_text("notes.hearing_date").ilike(pattern.clone()))
                .or(as_text("notes.hearing_time").ilike(pattern)),
        );
    }

    let rows: Vec<Note> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(NoteResponse::from).collect()))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<i32>,
) -> AppResult<Json<NoteResponse>> {
    let mut conn = state.db()?;
    Ok(Json(load_note(&mut conn, note_id)?.into()))
}

pub async fn create_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<NoteForm>,
) -> AppResult<Json<NoteResponse>> {
    let mut conn = state.db()?;
    let write = payload.into_write(&mut conn)?;

    let note: Note = diesel::insert_into(notes::table)
        .values((&write, notes::creator_id.eq(Some(user.user_id))))
        .get_result(&mut conn)?;

    info!(note_id = note.id, case_id = note.case_id, user_id = user.user_id, "note created");
    Ok(Json(note.into()))
}

pub async fn update_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(note_id): Path<i32>,
    Json(payload): Json<NoteForm>,
) -> AppResult<Json<NoteResponse>> {
    let mut conn = state.db()?;
    let existing = load_note(&mut conn, note_id)?;
    ensure_can_access(&user, &existing)?;

    let write = payload.into_write(&mut conn)?;
    let note: Note = diesel::update(notes::table.find(note_id))
        .set(&write)
        .get_result(&mut conn)?;

    info!(note_id, user_id = user.user_id, "note updated");
    Ok(Json(note.into()))
}

pub async fn delete_note(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(note_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let mut conn = state.db()?;
    let existing = load_note(&mut conn, note_id)?;
    ensure_can_access(&user, &existing)?;

    diesel::delete(notes::table.find(note_id)).execute(&mut conn)?;
    info!(note_id, user_id = user.user_id, "note deleted");
    Ok(Json(MessageResponse::new("note deleted")))
}
