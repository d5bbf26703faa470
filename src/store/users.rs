use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::db::models::User;
use crate::db::{format_timestamp, timestamp_column};
use crate::store::new_id;

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.name, u.date_of_birth, u.bio, u.location, \
     u.website, u.profile_image, u.header_image, u.is_staff, u.created_at";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub name: &'a str,
    pub date_of_birth: NaiveDate,
    pub password_hash: &'a str,
}

/// Profile fields a user may edit. `None` leaves the column untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_image: Option<String>,
    pub header_image: Option<String>,
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let dob: String = row.get(4)?;
    let date_of_birth = NaiveDate::parse_from_str(&dob, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        date_of_birth,
        bio: row.get(5)?,
        location: row.get(6)?,
        website: row.get(7)?,
        profile_image: row.get(8)?,
        header_image: row.get(9)?,
        is_staff: row.get(10)?,
        created_at: timestamp_column(row, 11)?,
    })
}

pub fn find_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
        params![id],
        user_from_row,
    )
    .optional()
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?1"),
        params![username],
        user_from_row,
    )
    .optional()
}

/// Looks a user up by email, returning the stored password hash alongside.
pub fn find_credentials(
    conn: &Connection,
    email: &str,
) -> rusqlite::Result<Option<(User, String)>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS}, u.password_hash FROM users u WHERE u.email = ?1"),
        params![email],
        |row| Ok((user_from_row(row)?, row.get(12)?)),
    )
    .optional()
}

pub fn username_exists(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, new: &NewUser<'_>, now: DateTime<Utc>) -> rusqlite::Result<User> {
    let id = new_id();
    conn.execute(
        "INSERT INTO users (id, username, email, name, date_of_birth, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            new.username,
            new.email,
            new.name,
            new.date_of_birth.format("%Y-%m-%d").to_string(),
            new.password_hash,
            format_timestamp(&now),
        ],
    )?;

    find_by_id(conn, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn update_profile(
    conn: &Connection,
    id: &str,
    changes: &ProfileChanges,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET
            name = COALESCE(?2, name),
            bio = COALESCE(?3, bio),
            location = COALESCE(?4, location),
            website = COALESCE(?5, website),
            profile_image = COALESCE(?6, profile_image),
            header_image = COALESCE(?7, header_image)
         WHERE id = ?1",
        params![
            id,
            changes.name,
            changes.bio,
            changes.location,
            changes.website,
            changes.profile_image,
            changes.header_image,
        ],
    )?;
    Ok(())
}

const PEOPLE_FILTER: &str = "FROM users u
     WHERE u.is_staff = 0
       AND (u.username LIKE ?1 ESCAPE '\\' OR u.name LIKE ?1 ESCAPE '\\')
       AND u.created_at <= ?2";

/// Number of non-staff users whose username or name matches `pattern`.
pub fn count_people(
    conn: &Connection,
    pattern: &str,
    cursor: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {PEOPLE_FILTER}"),
        params![pattern, format_timestamp(&cursor)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// A window of non-staff users matching `pattern`, newest accounts first.
pub fn search_people(
    conn: &Connection,
    pattern: &str,
    cursor: DateTime<Utc>,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} {PEOPLE_FILTER}
         ORDER BY u.created_at DESC, u.id DESC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let users = stmt
        .query_map(
            params![pattern, format_timestamp(&cursor), limit as i64, offset as i64],
            user_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Insert a user with throwaway credentials.
    pub fn user(conn: &Connection, username: &str, now: DateTime<Utc>) -> User {
        let email = format!("{username}@example.com");
        insert(
            conn,
            &NewUser {
                username,
                email: &email,
                name: username,
                date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                password_hash: "not-a-hash",
            },
            now,
        )
        .unwrap()
    }
}
