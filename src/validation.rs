//! Input validators shared by every form the API accepts.
//!
//! The free functions are pure checks over a single string. [`FormValidator`]
//! runs them field by field and collects every failure, so a rejected form
//! reports all of its bad fields at once.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::Serialize;

use crate::error::AppError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const SHORT_TIME_FORMAT: &str = "%H:%M";

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

// Denylist, not a parser. Anything with a quote in it is refused, names like
// O'Brien included, and so is prose that uses a bare SQL keyword.
static INJECTION_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r#"['"`;]"#,
        r"--",
        r"/\*|\*/",
        r"(?i)\b(or|and)\s+\S+\s*=\s*\S+",
        r"(?i)\bunion\b(\s+all)?\s+select\b",
        r"(?i)\b(drop|truncate|alter)\s+(table|database|schema)\b",
        r"(?i)\binsert\s+into\b",
        r"(?i)\bdelete\s+from\b",
        r"(?i)\bupdate\s+\w+\s+set\b",
        r"(?i)\bselect\b.+\bfrom\b",
        r"(?i)\bexec(ute)?\s*\(",
        r"(?i)\bxp_\w+",
        r"(?i)\b(select|union|drop|delete|insert|update|exec|execute|truncate|alter)\b",
    ])
    .expect("valid injection patterns")
});

pub fn is_valid_range(value: &str, max: usize) -> bool {
    let len = value.chars().count();
    len >= 1 && len <= max
}

pub fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_valid_date(value: &str) -> bool {
    parse_date(value).is_some()
}

pub fn is_valid_time(value: &str) -> bool {
    parse_time(value).is_some()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub fn has_sql_injection(value: &str) -> bool {
    INJECTION_PATTERNS.is_match(value)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Accepts `HH:MM:SS`, falling back to `HH:MM`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, SHORT_TIME_FORMAT))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldReason {
    Required,
    TooLong { max: usize },
    ForbiddenPattern,
    NotANumber,
    InvalidDate,
    InvalidTime,
    InvalidEmail,
    InvalidChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: FieldReason,
}

impl FieldError {
    pub fn new(field: &'static str, reason: FieldReason) -> Self {
        Self { field, reason }
    }
}

/// Collects per-field failures.
///
/// Each check returns `Some(value)` when the field passed and `None` after
/// recording a [`FieldError`], so callers can match on the tuple of results
/// and fall back to [`FormValidator::into_error`].
#[derive(Debug, Default)]
pub struct FormValidator {
    errors: Vec<FieldError>,
}

impl FormValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn into_error(self) -> AppError {
        AppError::invalid_form(self.errors)
    }

    pub fn reject(&mut self, field: &'static str, reason: FieldReason) {
        self.errors.push(FieldError::new(field, reason));
    }

    /// Required free text: non-empty after trimming, at most `max` characters,
    /// and free of injection patterns.
    pub fn text(&mut self, field: &'static str, value: Option<&str>, max: usize) -> Option<String> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            self.reject(field, FieldReason::Required);
            return None;
        }
        self.checked_text(field, value, max)
    }

    /// Like [`FormValidator::text`] but an absent or blank value is accepted
    /// as `Ok(None)`.
    pub fn optional_text(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        max: usize,
    ) -> Result<Option<String>, ()> {
        match value.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => self.checked_text(field, value, max).map(Some).ok_or(()),
        }
    }

    /// Numeric identifier submitted as a string.
    pub fn id(&mut self, field: &'static str, value: Option<&str>) -> Option<i32> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            self.reject(field, FieldReason::Required);
            return None;
        }
        match value.parse::<i32>() {
            Ok(id) if is_number(value) => Some(id),
            _ => {
                self.reject(field, FieldReason::NotANumber);
                None
            }
        }
    }

    pub fn date(&mut self, field: &'static str, value: Option<&str>) -> Option<NaiveDate> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            self.reject(field, FieldReason::Required);
            return None;
        }
        let parsed = parse_date(value);
        if parsed.is_none() {
            self.reject(field, FieldReason::InvalidDate);
        }
        parsed
    }

    pub fn time(&mut self, field: &'static str, value: Option<&str>) -> Option<NaiveTime> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            self.reject(field, FieldReason::Required);
            return None;
        }
        let parsed = parse_time(value);
        if parsed.is_none() {
            self.reject(field, FieldReason::InvalidTime);
        }
        parsed
    }

    pub fn choice(
        &mut self,
        field: &'static str,
        value: Option<&str>,
        allowed: &[&str],
    ) -> Option<String> {
        let value = value.map(str::trim).unwrap_or_default();
        if value.is_empty() {
            self.reject(field, FieldReason::Required);
            return None;
        }
        if !allowed.contains(&value) {
            self.reject(field, FieldReason::InvalidChoice);
            return None;
        }
        Some(value.to_string())
    }

    pub fn email(&mut self, field: &'static str, value: Option<&str>, max: usize) -> Option<String> {
        let email = self.text(field, value, max)?;
        if !is_valid_email(&email) {
            self.reject(field, FieldReason::InvalidEmail);
            return None;
        }
        Some(email)
    }

    fn checked_text(&mut self, field: &'static str, value: &str, max: usize) -> Option<String> {
        if !is_valid_range(value, max) {
            self.reject(field, FieldReason::TooLong { max });
            return None;
        }
        if has_sql_injection(value) {
            self.reject(field, FieldReason::ForbiddenPattern);
            return None;
        }
        Some(value.to_string())
    }
}
