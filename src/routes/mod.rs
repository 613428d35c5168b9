use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use diesel::dsl::sql;
use diesel::expression::SqlLiteral;
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    state::AppState,
    validation::has_sql_injection,
};

pub mod auth;
pub mod cases;
pub mod courts;
pub mod files;
pub mod health;
pub mod notes;
pub mod users;

const JSON_BODY_LIMIT: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let upload_limit = usize::try_from(state.limits.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_mul(2)
        .saturating_add(JSON_BODY_LIMIT);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let cases_routes = Router::new()
        .route("/", get(cases::list_cases).post(cases::create_case))
        .route("/search", get(cases::search_cases))
        .route(
            "/:id",
            get(cases::get_case)
                .put(cases::update_case)
                .delete(cases::delete_case),
        )
        .route(
            "/:id/files",
            get(files::list_case_files)
                .post(files::upload_file)
                .layer(DefaultBodyLimit::max(upload_limit)),
        );

    let courts_routes = Router::new()
        .route("/", get(courts::list_courts).post(courts::create_court))
        .route("/search", get(courts::search_courts))
        .route(
            "/:id",
            get(courts::get_court)
                .put(courts::update_court)
                .delete(courts::delete_court),
        );

    let notes_routes = Router::new()
        .route("/", get(notes::list_notes).post(notes::create_note))
        .route("/search", get(notes::search_notes))
        .route(
            "/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        );

    let files_routes = Router::new()
        .route("/:id/download", get(files::download_file))
        .route("/:id", delete(files::delete_file));

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/:id", delete(users::delete_user))
        .route("/:id/toggle-status", post(users::toggle_user_status));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/cases", cases_routes)
        .nest("/api/courts", courts_routes)
        .nest("/api/notes", notes_routes)
        .nest("/api/files", files_routes)
        .nest("/api/users", users_routes)
        .route("/api/storage", get(files::storage_info))
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

impl SearchQuery {
    /// The trimmed search term, or `None` when the caller wants the full list.
    pub fn term(&self) -> AppResult<Option<&str>> {
        match self.q.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(term) if has_sql_injection(term) => {
                Err(AppError::bad_request("invalid search query"))
            }
            Some(term) => Ok(Some(term)),
        }
    }
}

/// Escapes the LIKE wildcards in `term` so they match literally.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Substring pattern for `ILIKE`.
pub fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// A non-text column rendered the way Postgres prints it (`2024-02-29`,
/// `09:30:00`, `11`), for substring search. `column` must be a qualified
/// column name, never user input.
pub fn as_text(column: &'static str) -> SqlLiteral<Text> {
    sql::<Text>(&format!("CAST({column} AS TEXT)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("smith"), "%smith%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn blank_search_means_full_list() {
        for q in [None, Some(""), Some("   ")] {
            let query = SearchQuery {
                q: q.map(str::to_string),
            };
            assert_eq!(query.term().expect("term"), None);
        }
    }

    #[test]
    fn flagged_search_is_rejected() {
        let query = SearchQuery {
            q: Some("x' or 1=1".to_string()),
        };
        let err = query.term().expect_err("flagged");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let query = SearchQuery {
            q: Some(" Smith ".to_string()),
        };
        assert_eq!(query.term().expect("term"), Some("Smith"));
    }
}
