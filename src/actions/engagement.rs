use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::conflict_on_duplicate;
use crate::db::models::{Bookmark, Follow, PostLike};
use crate::error::{AppError, AppResult};
use crate::notifications;
use crate::store::{engagement, posts};

fn require_post(conn: &Connection, post_id: &str) -> AppResult<()> {
    if posts::exists(conn, post_id)? {
        Ok(())
    } else {
        Err(AppError::NotFound("Post not found"))
    }
}

pub fn like(conn: &Connection, post_id: &str, user_id: &str, now: DateTime<Utc>) -> AppResult<PostLike> {
    require_post(conn, post_id)?;
    if engagement::like_exists(conn, post_id, user_id)? {
        return Err(AppError::Conflict("Post already liked".into()));
    }
    let like = engagement::insert_like(conn, post_id, user_id, now)
        .map_err(|e| conflict_on_duplicate(e, "Post already liked"))?;
    notifications::on_like(conn, &like, now)?;
    tracing::debug!(post_id, user_id, "Post liked");
    Ok(like)
}

pub fn unlike(conn: &Connection, post_id: &str, user_id: &str) -> AppResult<()> {
    require_post(conn, post_id)?;
    if !engagement::delete_like(conn, post_id, user_id)? {
        return Err(AppError::NotFound("Like not found"));
    }
    tracing::debug!(post_id, user_id, "Post unliked");
    Ok(())
}

pub fn bookmark(
    conn: &Connection,
    post_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Bookmark> {
    require_post(conn, post_id)?;
    if engagement::bookmark_exists(conn, post_id, user_id)? {
        return Err(AppError::Conflict("Post already bookmarked".into()));
    }
    engagement::insert_bookmark(conn, post_id, user_id, now)
        .map_err(|e| conflict_on_duplicate(e, "Post already bookmarked"))
}

pub fn unbookmark(conn: &Connection, post_id: &str, user_id: &str) -> AppResult<()> {
    require_post(conn, post_id)?;
    if !engagement::delete_bookmark(conn, post_id, user_id)? {
        return Err(AppError::NotFound("Bookmark not found"));
    }
    Ok(())
}

/// `following_id` must already be a known user.
pub fn follow(
    conn: &Connection,
    follower_id: &str,
    following_id: &str,
    now: DateTime<Utc>,
) -> AppResult<Follow> {
    if follower_id == following_id {
        return Err(AppError::Conflict("Cannot follow yourself".into()));
    }
    if engagement::follow_exists(conn, follower_id, following_id)? {
        return Err(AppError::Conflict("Already following".into()));
    }
    let follow = engagement::insert_follow(conn, follower_id, following_id, now)
        .map_err(|e| conflict_on_duplicate(e, "Already following"))?;
    notifications::on_follow(conn, &follow, now)?;
    tracing::info!(follower_id, following_id, "User followed");
    Ok(follow)
}

pub fn unfollow(conn: &Connection, follower_id: &str, following_id: &str) -> AppResult<()> {
    if !engagement::delete_follow(conn, follower_id, following_id)? {
        return Err(AppError::NotFound("Not following"));
    }
    tracing::info!(follower_id, following_id, "User unfollowed");
    Ok(())
}
