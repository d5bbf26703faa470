use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;

use super::conflict_on_duplicate;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::store::users::{self, NewUser, ProfileChanges};

const MAX_NAME_CHARS: usize = 50;
const MIN_PASSWORD_CHARS: usize = 8;

static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{4,20}$").expect("valid regex"));
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub password: String,
}

fn validate_name(name: &str) -> AppResult<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_NAME_CHARS {
        return Err(AppError::BadRequest(format!(
            "name must be 1 to {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_registration(reg: &Registration, today: NaiveDate) -> AppResult<()> {
    if !USERNAME.is_match(&reg.username) {
        return Err(AppError::BadRequest(
            "username must be 4 to 20 letters, digits or underscores".into(),
        ));
    }
    if !EMAIL.is_match(&reg.email) {
        return Err(AppError::BadRequest("email address is not valid".into()));
    }
    validate_name(&reg.name)?;
    if reg.date_of_birth > today {
        return Err(AppError::BadRequest("date of birth is in the future".into()));
    }
    if reg.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn register(
    conn: &Connection,
    reg: &Registration,
    password_cost: u32,
    now: DateTime<Utc>,
) -> AppResult<User> {
    validate_registration(reg, now.date_naive())?;
    if users::username_exists(conn, &reg.username)? {
        return Err(AppError::Conflict("Username already taken".into()));
    }
    if users::email_exists(conn, &reg.email)? {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = bcrypt::hash(&reg.password, password_cost)?;
    let user = users::insert(
        conn,
        &NewUser {
            username: &reg.username,
            email: &reg.email,
            name: reg.name.trim(),
            date_of_birth: reg.date_of_birth,
            password_hash: &password_hash,
        },
        now,
    )
    .map_err(|e| conflict_on_duplicate(e, "Username or email already taken"))?;

    tracing::info!(user_id = %user.id, username = %user.username, "User registered");
    Ok(user)
}

/// Check an email and password pair. Unknown emails and wrong passwords are
/// indistinguishable to the caller.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> AppResult<User> {
    let Some((user, hash)) = users::find_credentials(conn, email)? else {
        return Err(AppError::Unauthorized);
    };
    if !bcrypt::verify(password, &hash)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

/// Edit the profile of `username`, which must be the caller.
pub fn update_profile(
    conn: &Connection,
    username: &str,
    user_id: &str,
    changes: &ProfileChanges,
) -> AppResult<User> {
    if let Some(name) = &changes.name {
        validate_name(name)?;
    }
    let target =
        users::find_by_username(conn, username)?.ok_or(AppError::NotFound("User not found"))?;
    if target.id != user_id {
        return Err(AppError::Forbidden("Cannot edit another user's profile".into()));
    }
    users::update_profile(conn, &target.id, changes)?;
    users::find_by_id(conn, &target.id)?.ok_or(AppError::NotFound("User not found"))
}

/// Query for the registration availability check.
#[derive(Debug, Default, Deserialize)]
pub struct Lookup {
    pub email: Option<String>,
    pub username: Option<String>,
}

/// Whether the given email or username is already in use.
pub fn lookup(conn: &Connection, query: &Lookup) -> AppResult<bool> {
    match (&query.email, &query.username) {
        (Some(email), _) => Ok(users::email_exists(conn, email)?),
        (None, Some(username)) => Ok(users::username_exists(conn, username)?),
        (None, None) => Err(AppError::BadRequest(
            "email or username is required".into(),
        )),
    }
}
