use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Notification, NotificationSubject};
use crate::db::{format_timestamp, timestamp_column};
use crate::store::new_id;

const NOTIFICATION_COLUMNS: &str = "id, recipient_id, actor_id, type, like_id, reply_id, \
     repost_id, follow_id, post_id, read, created_at";

/// Column values for the typed subject columns: `(type, like, reply, repost, follow)`.
fn subject_columns(
    subject: &NotificationSubject,
) -> (&'static str, Option<&str>, Option<&str>, Option<&str>, Option<&str>) {
    match subject {
        NotificationSubject::Like { like_id } => ("like", Some(like_id.as_str()), None, None, None),
        NotificationSubject::Reply { reply_id } => ("reply", None, Some(reply_id.as_str()), None, None),
        NotificationSubject::Repost { repost_id } => ("repost", None, None, Some(repost_id.as_str()), None),
        NotificationSubject::Follow { follow_id } => ("follow", None, None, None, Some(follow_id.as_str())),
    }
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationSubject> {
    let kind: String = row.get(3)?;
    let subject = match kind.as_str() {
        "like" => row
            .get::<_, Option<String>>(4)?
            .map(|like_id| NotificationSubject::Like { like_id }),
        "reply" => row
            .get::<_, Option<String>>(5)?
            .map(|reply_id| NotificationSubject::Reply { reply_id }),
        "repost" => row
            .get::<_, Option<String>>(6)?
            .map(|repost_id| NotificationSubject::Repost { repost_id }),
        "follow" => row
            .get::<_, Option<String>>(7)?
            .map(|follow_id| NotificationSubject::Follow { follow_id }),
        _ => None,
    };
    subject.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("notification type {kind:?} without a matching reference").into(),
        )
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        actor_id: row.get(2)?,
        subject: subject_from_row(row)?,
        post_id: row.get(8)?,
        read: row.get(9)?,
        created_at: timestamp_column(row, 10)?,
    })
}

pub fn insert(
    conn: &Connection,
    recipient_id: &str,
    actor_id: &str,
    subject: NotificationSubject,
    post_id: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<Notification> {
    let id = new_id();
    let (kind, like_id, reply_id, repost_id, follow_id) = subject_columns(&subject);
    conn.execute(
        "INSERT INTO notifications
            (id, recipient_id, actor_id, type, like_id, reply_id, repost_id, follow_id, post_id, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
        params![
            id,
            recipient_id,
            actor_id,
            kind,
            like_id,
            reply_id,
            repost_id,
            follow_id,
            post_id,
            format_timestamp(&now),
        ],
    )?;

    Ok(Notification {
        id,
        recipient_id: recipient_id.to_string(),
        actor_id: actor_id.to_string(),
        subject,
        post_id: post_id.map(str::to_string),
        read: false,
        created_at: now,
    })
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Notification>> {
    conn.query_row(
        &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
        params![id],
        notification_from_row,
    )
    .optional()
}

pub fn count_for(
    conn: &Connection,
    recipient_id: &str,
    cursor: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND created_at <= ?2",
        params![recipient_id, format_timestamp(&cursor)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// A window of a recipient's notifications, newest first.
pub fn window_for(
    conn: &Connection,
    recipient_id: &str,
    cursor: DateTime<Utc>,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<Notification>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE recipient_id = ?1 AND created_at <= ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let rows = stmt
        .query_map(
            params![
                recipient_id,
                format_timestamp(&cursor),
                limit as i64,
                offset as i64
            ],
            notification_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_read(conn: &Connection, id: &str) -> rusqlite::Result<()> {
    conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn mark_all_read(conn: &Connection, recipient_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE notifications SET read = 1 WHERE recipient_id = ?1 AND read = 0",
        params![recipient_id],
    )
}

pub fn delete_all(conn: &Connection, recipient_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM notifications WHERE recipient_id = ?1",
        params![recipient_id],
    )
}
