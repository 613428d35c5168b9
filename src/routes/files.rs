use axum::extract::{multipart::MultipartError, Json, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    access::{ensure_can_access, AttachedFile},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{Case, CaseFile, NewCaseFile},
    quota::{StorageStats, UploadRejection},
    routes::MessageResponse,
    schema::{case_files, cases},
    state::AppState,
};

const STORED_NAME_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

#[derive(Serialize)]
pub struct CaseFileResponse {
    pub id: i32,
    pub filename: String,
    pub original_filename: String,
    pub file_size: i64,
    pub uploaded_at: NaiveDateTime,
    pub case_id: i32,
}

impl From<CaseFile> for CaseFileResponse {
    fn from(file: CaseFile) -> Self {
        Self {
            id: file.id,
            filename: file.filename,
            original_filename: file.original_filename,
            file_size: file.file_size,
            uploaded_at: file.uploaded_at,
            case_id: file.case_id,
        }
    }
}

#[derive(Serialize)]
pub struct CaseFilesResponse {
    pub case_id: i32,
    pub files: Vec<CaseFileResponse>,
    pub storage: StorageStats,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub file: CaseFileResponse,
    pub storage: StorageStats,
}

/// Reduces a client-supplied file name to a flat, portable name.
///
/// ASCII letters, digits, `_`, `.` and `-` are kept. Runs of whitespace and
/// path separators become a single `_`, anything else is dropped, and
/// leading dots and underscores are stripped. An alphanumeric extension
/// always survives, so a stem that cleans away entirely becomes `file`.
/// `None` when nothing is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let extension = name.rsplit_once('.').filter(|(stem, ext)| {
        !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
    });
    match extension {
        Some((stem, ext)) => {
            let stem = clean_name(stem).unwrap_or_else(|| "file".to_string());
            Some(format!("{stem}.{ext}"))
        }
        None => clean_name(name),
    }
}

fn clean_name(name: &str) -> Option<String> {
    let mut cleaned = String::with_capacity(name.len());
    let mut gap = false;
    for ch in name.chars() {
        if ch.is_whitespace() || ch == '/' || ch == '\\' {
            gap = true;
        } else if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
            if gap && !cleaned.is_empty() {
                cleaned.push('_');
            }
            gap = false;
            cleaned.push(ch);
        }
    }

    let trimmed = cleaned
        .trim_start_matches(|c: char| c == '.' || c == '_')
        .trim_end_matches('.');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn attachment_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch,
            _ => '_',
        })
        .collect();
    let encoded = percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn load_case(conn: &mut PgConnection, case_id: i32) -> AppResult<Case> {
    cases::table
        .find(case_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("case not found"))
}

/// Loads a file with its owning case and checks the caller may touch it.
fn load_attached_file(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    file_id: i32,
) -> AppResult<(CaseFile, Case)> {
    let (file, case): (CaseFile, Case) = case_files::table
        .inner_join(cases::table)
        .filter(case_files::id.eq(file_id))
        .select((case_files::all_columns, cases::all_columns))
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("file not found"))?;
    ensure_can_access(
        user,
        &AttachedFile {
            file: &file,
            case: &case,
        },
    )?;
    Ok((file, case))
}

async fn current_stats(state: &AppState) -> AppResult<StorageStats> {
    let used = state.storage.used_bytes().await?;
    Ok(state.limits.stats(used))
}

fn multipart_rejection(state: &AppState, err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err, "upload rejected: body too large");
        return AppError::bad_request(
            UploadRejection::TooLarge {
                max: state.limits.max_file_size,
            }
            .to_string(),
        );
    }
    warn!(error = %err, "invalid multipart data");
    AppError::bad_request(format!("invalid multipart data: {}", err.body_text()))
}

pub async fn list_case_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<i32>,
) -> AppResult<Json<CaseFilesResponse>> {
    let files = {
        let mut conn = state.db()?;
        let case = load_case(&mut conn, case_id)?;
        ensure_can_access(&user, &case)?;
        case_files::table
            .filter(case_files::case_id.eq(case_id))
            .order(case_files::uploaded_at.desc())
            .load::<CaseFile>(&mut conn)?
    };

    Ok(Json(CaseFilesResponse {
        case_id,
        files: files.into_iter().map(CaseFileResponse::from).collect(),
        storage: current_stats(&state).await?,
    }))
}

pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(case_id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    {
        let mut conn = state.db()?;
        let case = load_case(&mut conn, case_id)?;
        ensure_can_access(&user, &case)?;
    }

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_rejection(&state, err))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| multipart_rejection(&state, err))?;
        upload = Some((original_name, data.to_vec()));
        break;
    }

    let (original_name, bytes) = upload.ok_or_else(|| AppError::bad_request("no file part"))?;
    let sanitized =
        sanitize_filename(&original_name).ok_or_else(|| AppError::bad_request("no selected file"))?;

    let size = bytes.len() as u64;
    let used = state.storage.used_bytes().await?;
    if let Err(rejections) = state.limits.check_upload(&sanitized, size, used) {
        let message = rejections
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        warn!(case_id, file = %original_name, size, reason = %message, "upload rejected");
        return Err(AppError::bad_request(message));
    }

    let stored_name = format!("{}_{}", Utc::now().format(STORED_NAME_TIMESTAMP), sanitized);
    state.storage.put_object(&stored_name, bytes).await?;

    let new_file = NewCaseFile {
        filename: stored_name.clone(),
        original_filename: original_name,
        file_size: size as i64,
        case_id,
    };
    let inserted = state.db().and_then(|mut conn| {
        diesel::insert_into(case_files::table)
            .values(&new_file)
            .get_result::<CaseFile>(&mut conn)
            .map_err(AppError::from)
    });
    let file = match inserted {
        Ok(file) => file,
        Err(err) => {
            if let Err(cleanup) = state.storage.delete_object(&stored_name).await {
                error!(file = %stored_name, error = %cleanup, "failed to remove orphaned upload");
            }
            return Err(err);
        }
    };

    info!(case_id, file_id = file.id, file = %file.filename, size, "file uploaded");
    Ok(Json(UploadResponse {
        file: file.into(),
        storage: current_stats(&state).await?,
    }))
}

pub async fn download_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let (file, _) = {
        let mut conn = state.db()?;
        load_attached_file(&mut conn, &user, file_id)?
    };

    let bytes = state
        .storage
        .get_object(&file.filename)
        .await?
        .ok_or_else(|| {
            warn!(file_id, file = %file.filename, "stored object missing");
            AppError::not_found_with("file not found")
        })?;

    let content_type = mime_guess::from_path(&file.original_filename)
        .first_or_octet_stream()
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&file.original_filename),
            ),
        ],
        bytes,
    ))
}

pub async fn delete_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    let (file, case) = {
        let mut conn = state.db()?;
        load_attached_file(&mut conn, &user, file_id)?
    };

    // Row before object, so no record outlives its object.
    {
        let mut conn = state.db()?;
        diesel::delete(case_files::table.find(file_id)).execute(&mut conn)?;
    }

    match state.storage.delete_object(&file.filename).await {
        Ok(true) => {}
        Ok(false) => warn!(file_id, file = %file.filename, "stored object was already gone"),
        Err(err) => {
            error!(file_id, file = %file.filename, error = ?err, "failed to delete stored object");
        }
    }

    info!(file_id, case_id = case.id, user_id = user.user_id, "file deleted");
    Ok(Json(MessageResponse::new("file deleted")))
}

pub async fn storage_info(State(state): State<AppState>) -> AppResult<Json<StorageStats>> {
    Ok(Json(current_stats(&state).await?))
}
