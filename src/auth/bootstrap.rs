use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::PgConnection;
use tracing::{info, warn};

use crate::auth::password::{generate_random_password, hash_password, GENERATED_PASSWORD_LENGTH};
use crate::error::AppResult;
use crate::models::NewUser;
use crate::schema::users;
use crate::validation::has_sql_injection;

pub const ADMIN_NAME: &str = "admin";

#[derive(Debug, PartialEq, Eq)]
pub enum AdminPassword {
    Configured(String),
    /// Generated because the configured value was missing or rejected.
    Generated { password: String, reason: &'static str },
}

impl AdminPassword {
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured {
            None | Some("") => Self::Generated {
                password: generate_random_password(GENERATED_PASSWORD_LENGTH),
                reason: "ADMIN_PASSWORD is not set",
            },
            Some(value) if has_sql_injection(value) => Self::Generated {
                password: generate_random_password(GENERATED_PASSWORD_LENGTH),
                reason: "ADMIN_PASSWORD contains forbidden characters",
            },
            Some(value) => Self::Configured(value.to_string()),
        }
    }

    fn into_inner(self) -> String {
        match self {
            Self::Configured(password) | Self::Generated { password, .. } => password,
        }
    }
}

/// Creates the `admin` account if it does not exist yet. Returns `true` when
/// this call created it.
pub fn ensure_admin(conn: &mut PgConnection, configured: Option<&str>) -> AppResult<bool> {
    let exists = users::table
        .filter(users::name.eq(ADMIN_NAME))
        .select(users::id)
        .first::<i32>(conn)
        .optional()?
        .is_some();
    if exists {
        return Ok(false);
    }

    let password = AdminPassword::resolve(configured);
    if let AdminPassword::Generated { password, reason } = &password {
        warn!(
            reason,
            generated_password = %password,
            "using generated admin password; set ADMIN_PASSWORD to replace it"
        );
    }

    let admin = NewUser {
        name: ADMIN_NAME.to_string(),
        email: None,
        password_hash: hash_password(&password.into_inner())?,
        is_active: true,
        is_admin: true,
    };

    match diesel::insert_into(users::table).values(&admin).execute(conn) {
        Ok(_) => {
            info!("admin account created");
            Ok(true)
        }
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_password_is_used_when_clean() {
        assert_eq!(
            AdminPassword::resolve(Some("Str0ng.Pass")),
            AdminPassword::Configured("Str0ng.Pass".to_string())
        );
    }

    #[test]
    fn missing_or_flagged_password_is_replaced() {
        for configured in [None, Some(""), Some("pa'ss; drop table users")] {
            match AdminPassword::resolve(configured) {
                AdminPassword::Generated { password, .. } => {
                    assert_eq!(password.len(), GENERATED_PASSWORD_LENGTH);
                    assert!(!has_sql_injection(&password));
                }
                other => panic!("expected generated password, got {other:?}"),
            }
        }
    }
}
