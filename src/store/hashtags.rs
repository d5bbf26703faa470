use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::format_timestamp;
use crate::db::models::HashtagSummary;
use crate::store::new_id;

/// Replace the hashtags linked to `post_id` with `names`.
pub fn set_for_post(conn: &Connection, post_id: &str, names: &[String]) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM post_hashtags WHERE post_id = ?1",
        params![post_id],
    )?;

    for name in names {
        conn.execute(
            "INSERT INTO hashtags (id, name) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
            params![new_id(), name],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO post_hashtags (post_id, hashtag_id)
             SELECT ?1, id FROM hashtags WHERE name = ?2",
            params![post_id, name],
        )?;
    }
    Ok(())
}

pub fn names_for_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT h.name FROM hashtags h
         JOIN post_hashtags ph ON ph.hashtag_id = h.id
         WHERE ph.post_id = ?1
         ORDER BY h.name",
    )?;
    let names = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

// Tags whose name matches ?1 and that have at least one post at or before ?2.
const PREFIX_MATCHES: &str = "SELECT h.name AS name, COUNT(p.id) AS post_count
     FROM hashtags h
     JOIN post_hashtags ph ON ph.hashtag_id = h.id
     JOIN posts p ON p.id = ph.post_id
     WHERE h.name LIKE ?1 ESCAPE '\\' AND p.created_at <= ?2
     GROUP BY h.id";

pub fn count_prefix(
    conn: &Connection,
    pattern: &str,
    cursor: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM ({PREFIX_MATCHES})"),
        params![pattern, format_timestamp(&cursor)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// A window of matching tags, most used first.
pub fn window_prefix(
    conn: &Connection,
    pattern: &str,
    cursor: DateTime<Utc>,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<HashtagSummary>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name, post_count FROM ({PREFIX_MATCHES})
         ORDER BY post_count DESC, name ASC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let tags = stmt
        .query_map(
            params![pattern, format_timestamp(&cursor), limit as i64, offset as i64],
            |row| {
                Ok(HashtagSummary {
                    name: row.get(0)?,
                    post_count: row.get(1)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tags)
}
