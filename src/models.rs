use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = sessions)]
#[diesel(belongs_to(User))]
pub struct Session {
    pub id: Uuid,
    pub user_id: i32,
    pub remember: bool,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: i32,
    pub remember: bool,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = cases)]
pub struct Case {
    pub id: i32,
    pub title: String,
    pub details: String,
    pub full_name: String,
    pub phone: String,
    pub creator_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = cases)]
pub struct NewCase {
    pub title: String,
    pub details: String,
    pub full_name: String,
    pub phone: String,
    pub creator_id: Option<i32>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = courts)]
pub struct Court {
    pub id: i32,
    pub title: String,
    pub address: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = courts)]
pub struct NewCourt {
    pub title: String,
    pub address: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = notes)]
#[diesel(belongs_to(Case))]
#[diesel(belongs_to(Court))]
pub struct Note {
    pub id: i32,
    pub client_name: String,
    pub case_title: String,
    pub court_address: String,
    pub court_name: String,
    pub details: Option<String>,
    pub hearing_date: NaiveDate,
    pub hearing_time: NaiveTime,
    pub status: String,
    pub case_id: i32,
    pub court_id: i32,
    pub creator_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Column values written when a note is created or edited. The snapshot
/// fields are copied from the case and court at that moment and are never
/// refreshed on their own.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = notes)]
#[diesel(treat_none_as_null = true)]
pub struct NoteWrite {
    pub client_name: String,
    pub case_title: String,
    pub court_address: String,
    pub court_name: String,
    pub details: Option<String>,
    pub hearing_date: NaiveDate,
    pub hearing_time: NaiveTime,
    pub status: String,
    pub case_id: i32,
    pub court_id: i32,
}

impl NoteWrite {
    pub fn snapshot(
        case: &Case,
        court: &Court,
        details: Option<String>,
        hearing_date: NaiveDate,
        hearing_time: NaiveTime,
        status: String,
    ) -> Self {
        Self {
            client_name: case.full_name.clone(),
            case_title: case.title.clone(),
            court_address: court.address.clone(),
            court_name: court.title.clone(),
            details,
            hearing_date,
            hearing_time,
            status,
            case_id: case.id,
            court_id: court.id,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = case_files)]
#[diesel(belongs_to(Case))]
pub struct CaseFile {
    pub id: i32,
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub uploaded_at: NaiveDateTime,
    pub case_id: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = case_files)]
pub struct NewCaseFile {
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub case_id: i32,
}
