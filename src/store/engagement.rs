use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::format_timestamp;
use crate::db::models::{Bookmark, EngagementCounts, Follow, PostLike, VisitRecord};
use crate::store::new_id;

// --- Likes ---

pub fn like_exists(conn: &Connection, post_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
        |row| row.get(0),
    )
}

pub fn insert_like(
    conn: &Connection,
    post_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<PostLike> {
    let like = PostLike {
        id: new_id(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO post_likes (id, post_id, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![like.id, like.post_id, like.user_id, format_timestamp(&now)],
    )?;
    Ok(like)
}

pub fn delete_like(conn: &Connection, post_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    Ok(rows > 0)
}

// --- Bookmarks ---

pub fn bookmark_exists(conn: &Connection, post_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM bookmarks WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
        |row| row.get(0),
    )
}

pub fn insert_bookmark(
    conn: &Connection,
    post_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Bookmark> {
    let bookmark = Bookmark {
        id: new_id(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO bookmarks (id, post_id, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            bookmark.id,
            bookmark.post_id,
            bookmark.user_id,
            format_timestamp(&now)
        ],
    )?;
    Ok(bookmark)
}

pub fn delete_bookmark(conn: &Connection, post_id: &str, user_id: &str) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM bookmarks WHERE post_id = ?1 AND user_id = ?2",
        params![post_id, user_id],
    )?;
    Ok(rows > 0)
}

// --- Follows ---

pub fn follow_exists(
    conn: &Connection,
    follower_id: &str,
    following_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![follower_id, following_id],
        |row| row.get(0),
    )
}

pub fn insert_follow(
    conn: &Connection,
    follower_id: &str,
    following_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Follow> {
    let follow = Follow {
        id: new_id(),
        follower_id: follower_id.to_string(),
        following_id: following_id.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO follows (id, follower_id, following_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            follow.id,
            follow.follower_id,
            follow.following_id,
            format_timestamp(&now)
        ],
    )?;
    Ok(follow)
}

pub fn delete_follow(
    conn: &Connection,
    follower_id: &str,
    following_id: &str,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
        params![follower_id, following_id],
    )?;
    Ok(rows > 0)
}

// --- Visits ---

/// Whether `visitor_id` has a visit on `post_id` recorded after `since`.
pub fn visited_since(
    conn: &Connection,
    visitor_id: &str,
    post_id: &str,
    since: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM visit_records
         WHERE visitor_id = ?1 AND post_id = ?2 AND created_at > ?3",
        params![visitor_id, post_id, format_timestamp(&since)],
        |row| row.get(0),
    )
}

pub fn insert_visit(
    conn: &Connection,
    visitor_id: &str,
    post_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<VisitRecord> {
    let visit = VisitRecord {
        id: new_id(),
        visitor_id: visitor_id.to_string(),
        post_id: post_id.to_string(),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO visit_records (id, visitor_id, post_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            visit.id,
            visit.visitor_id,
            visit.post_id,
            format_timestamp(&now)
        ],
    )?;
    Ok(visit)
}

// --- Counters ---

/// The five raw engagement signals of a post, read at call time.
pub fn counts(conn: &Connection, post_id: &str) -> rusqlite::Result<EngagementCounts> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM post_likes WHERE post_id = ?1),
            (SELECT COUNT(*) FROM visit_records WHERE post_id = ?1),
            (SELECT COUNT(*) FROM bookmarks WHERE post_id = ?1),
            (SELECT COUNT(*) FROM posts WHERE reply_parent_id = ?1),
            (SELECT COUNT(*) FROM posts WHERE repost_parent_id = ?1)",
        params![post_id],
        |row| {
            Ok(EngagementCounts {
                likes: row.get(0)?,
                views: row.get(1)?,
                bookmarks: row.get(2)?,
                replies: row.get(3)?,
                reposts: row.get(4)?,
            })
        },
    )
}

/// Whether `viewer_id` has liked, bookmarked and reposted `post_id`.
pub fn viewer_flags(
    conn: &Connection,
    post_id: &str,
    viewer_id: &str,
) -> rusqlite::Result<(bool, bool, bool)> {
    conn.query_row(
        "SELECT
            EXISTS(SELECT 1 FROM post_likes WHERE post_id = ?1 AND user_id = ?2),
            EXISTS(SELECT 1 FROM bookmarks WHERE post_id = ?1 AND user_id = ?2),
            EXISTS(SELECT 1 FROM posts WHERE repost_parent_id = ?1 AND author_id = ?2)",
        params![post_id, viewer_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
}

/// `(followers, following, posts)` for a user.
pub fn user_counts(conn: &Connection, user_id: &str) -> rusqlite::Result<(i64, i64, i64)> {
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
            (SELECT COUNT(*) FROM posts WHERE author_id = ?1)",
        params![user_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
}
