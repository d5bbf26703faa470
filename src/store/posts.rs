use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{MediaItem, Post, PostImage};
use crate::db::{format_timestamp, timestamp_column};
use crate::store::new_id;

const POST_COLUMNS: &str =
    "p.id, p.author_id, p.content, p.reply_parent_id, p.repost_parent_id, p.created_at";

pub struct NewPost<'a> {
    pub author_id: &'a str,
    pub content: &'a str,
    pub reply_parent_id: Option<&'a str>,
    pub repost_parent_id: Option<&'a str>,
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        content: row.get(2)?,
        reply_parent_id: row.get(3)?,
        repost_parent_id: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

pub fn find(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
        params![id],
        post_from_row,
    )
    .optional()
}

pub fn exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, new: &NewPost<'_>, now: DateTime<Utc>) -> rusqlite::Result<Post> {
    let post = Post {
        id: new_id(),
        author_id: new.author_id.to_string(),
        content: new.content.to_string(),
        reply_parent_id: new.reply_parent_id.map(str::to_string),
        repost_parent_id: new.repost_parent_id.map(str::to_string),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO posts (id, author_id, content, reply_parent_id, repost_parent_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            post.id,
            post.author_id,
            post.content,
            post.reply_parent_id,
            post.repost_parent_id,
            format_timestamp(&now),
        ],
    )?;
    // Re-read so created_at carries the stored precision.
    find(conn, &post.id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn update_content(conn: &Connection, id: &str, content: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE posts SET content = ?2 WHERE id = ?1",
        params![id, content],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn insert_images(
    conn: &Connection,
    post_id: &str,
    images: &[String],
) -> rusqlite::Result<Vec<PostImage>> {
    let mut stmt = conn.prepare(
        "INSERT INTO post_images (id, post_id, image, position) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut stored = Vec::with_capacity(images.len());
    for (position, image) in images.iter().enumerate() {
        let row = PostImage {
            id: new_id(),
            post_id: post_id.to_string(),
            image: image.clone(),
            position: position as i64,
        };
        stmt.execute(params![row.id, row.post_id, row.image, row.position])?;
        stored.push(row);
    }
    Ok(stored)
}

pub fn images(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<PostImage>> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, image, position FROM post_images
         WHERE post_id = ?1 ORDER BY position ASC",
    )?;
    let images = stmt
        .query_map(params![post_id], |row| {
            Ok(PostImage {
                id: row.get(0)?,
                post_id: row.get(1)?,
                image: row.get(2)?,
                position: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

/// Direct replies to `parent_id` as `(id, created_at)` pairs.
pub fn reply_children(
    conn: &Connection,
    parent_id: &str,
) -> rusqlite::Result<Vec<(String, DateTime<Utc>)>> {
    let mut stmt =
        conn.prepare("SELECT id, created_at FROM posts WHERE reply_parent_id = ?1")?;
    let children = stmt
        .query_map(params![parent_id], |row| {
            Ok((row.get(0)?, timestamp_column(row, 1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(children)
}

/// Which relation a post listing is drawn from.
#[derive(Debug, Clone, Copy)]
pub enum PostFilter<'a> {
    /// Posts by the viewer or anyone the viewer follows.
    Timeline { viewer_id: &'a str },
    AuthoredBy { user_id: &'a str },
    /// Ordered by when the like was made.
    LikedBy { user_id: &'a str },
    /// Ordered by when the bookmark was made.
    BookmarkedBy { user_id: &'a str },
    /// `pattern` is a `LIKE` pattern built with `store::contains_pattern`.
    ContentMatches { pattern: &'a str },
}

impl PostFilter<'_> {
    /// `FROM ... WHERE ...` clause binding `?1` (the filter value) and `?2`
    /// (the cursor), plus the column listings sort by.
    fn clause(&self) -> (&'static str, &'static str) {
        match self {
            PostFilter::Timeline { .. } => (
                "FROM posts p
                 WHERE (p.author_id = ?1
                        OR p.author_id IN (SELECT following_id FROM follows WHERE follower_id = ?1))
                   AND p.created_at <= ?2",
                "p.created_at",
            ),
            PostFilter::AuthoredBy { .. } => (
                "FROM posts p WHERE p.author_id = ?1 AND p.created_at <= ?2",
                "p.created_at",
            ),
            PostFilter::LikedBy { .. } => (
                "FROM post_likes a JOIN posts p ON p.id = a.post_id
                 WHERE a.user_id = ?1 AND a.created_at <= ?2",
                "a.created_at",
            ),
            PostFilter::BookmarkedBy { .. } => (
                "FROM bookmarks a JOIN posts p ON p.id = a.post_id
                 WHERE a.user_id = ?1 AND a.created_at <= ?2",
                "a.created_at",
            ),
            PostFilter::ContentMatches { .. } => (
                "FROM posts p WHERE p.content LIKE ?1 ESCAPE '\\' AND p.created_at <= ?2",
                "p.created_at",
            ),
        }
    }

    fn value(&self) -> &str {
        match self {
            PostFilter::Timeline { viewer_id } => viewer_id,
            PostFilter::AuthoredBy { user_id }
            | PostFilter::LikedBy { user_id }
            | PostFilter::BookmarkedBy { user_id } => user_id,
            PostFilter::ContentMatches { pattern } => pattern,
        }
    }
}

pub fn count(
    conn: &Connection,
    filter: PostFilter<'_>,
    cursor: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let (clause, _) = filter.clause();
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {clause}"),
        params![filter.value(), format_timestamp(&cursor)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Ids of a window of matching posts, newest first.
pub fn window_ids(
    conn: &Connection,
    filter: PostFilter<'_>,
    cursor: DateTime<Utc>,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<String>> {
    let (clause, sort) = filter.clause();
    let mut stmt = conn.prepare(&format!(
        "SELECT p.id {clause} ORDER BY {sort} DESC, p.id DESC LIMIT ?3 OFFSET ?4"
    ))?;
    let ids = stmt
        .query_map(
            params![
                filter.value(),
                format_timestamp(&cursor),
                limit as i64,
                offset as i64
            ],
            |row| row.get(0),
        )?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Number of images attached to matching posts.
pub fn count_media(
    conn: &Connection,
    filter: PostFilter<'_>,
    cursor: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let (clause, _) = filter.clause();
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM post_images i
             JOIN (SELECT p.id AS id {clause}) m ON m.id = i.post_id"
        ),
        params![filter.value(), format_timestamp(&cursor)],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// A window of the images of matching posts, flattened newest post first and
/// in attachment order within a post. Image references are returned raw.
pub fn window_media(
    conn: &Connection,
    filter: PostFilter<'_>,
    cursor: DateTime<Utc>,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<MediaItem>> {
    let (clause, sort) = filter.clause();
    let mut stmt = conn.prepare(&format!(
        "SELECT i.post_id, i.image FROM post_images i
         JOIN (SELECT p.id AS id, {sort} AS sort_key {clause}) m ON m.id = i.post_id
         ORDER BY m.sort_key DESC, m.id DESC, i.position ASC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let media = stmt
        .query_map(
            params![
                filter.value(),
                format_timestamp(&cursor),
                limit as i64,
                offset as i64
            ],
            |row| {
                Ok(MediaItem {
                    post_id: row.get(0)?,
                    url: row.get(1)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}
