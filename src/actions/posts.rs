use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::notifications;
use crate::store::posts::NewPost;
use crate::store::{engagement, hashtags, posts};

pub const MAX_CONTENT_CHARS: usize = 2000;

/// A viewer is counted at most once per post in this window.
const VISIT_WINDOW_HOURS: i64 = 24;

static HASHTAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#([A-Za-z][A-Za-z0-9]*)$").expect("valid regex"));

#[derive(Debug, Default, Deserialize)]
pub struct PostDraft {
    #[serde(default)]
    pub content: String,
    /// Image references, in display order.
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepostDraft {
    /// Quote text; a plain repost has none.
    #[serde(default)]
    pub content: Option<String>,
}

/// Lowercased, deduplicated `#word` tokens in order of first appearance.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for word in content.split_whitespace() {
        if let Some(caps) = HASHTAG.captures(word) {
            let name = caps[1].to_lowercase();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn check_length(content: &str) -> AppResult<()> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "content must be at most {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

fn validate_draft(draft: &PostDraft) -> AppResult<()> {
    check_length(&draft.content)?;
    if draft.content.trim().is_empty() && draft.images.is_empty() {
        return Err(AppError::BadRequest(
            "a post needs content or at least one image".into(),
        ));
    }
    if draft.images.iter().any(|image| image.trim().is_empty()) {
        return Err(AppError::BadRequest("image references must not be empty".into()));
    }
    Ok(())
}

fn insert_with_extras(
    conn: &Connection,
    new: &NewPost<'_>,
    images: &[String],
    now: DateTime<Utc>,
) -> AppResult<Post> {
    let tx = conn.unchecked_transaction()?;
    let post = posts::insert(&tx, new, now)?;
    posts::insert_images(&tx, &post.id, images)?;
    hashtags::set_for_post(&tx, &post.id, &extract_hashtags(&post.content))?;
    tx.commit()?;
    Ok(post)
}

pub fn create_post(
    conn: &Connection,
    author_id: &str,
    draft: &PostDraft,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    validate_draft(draft)?;
    let post = insert_with_extras(
        conn,
        &NewPost {
            author_id,
            content: &draft.content,
            reply_parent_id: None,
            repost_parent_id: None,
        },
        &draft.images,
        now,
    )?;
    tracing::info!(post_id = %post.id, author_id, "Post created");
    Ok(post)
}

/// Replace the content of the caller's own post and recompute its hashtags.
pub fn edit_post(conn: &Connection, post_id: &str, user_id: &str, content: &str) -> AppResult<Post> {
    check_length(content)?;
    let post = posts::find(conn, post_id)?.ok_or(AppError::NotFound("Post not found"))?;
    if post.author_id != user_id {
        return Err(AppError::Forbidden("Cannot edit another user's post".into()));
    }
    if content.trim().is_empty()
        && !post.is_repost()
        && posts::images(conn, post_id)?.is_empty()
    {
        return Err(AppError::BadRequest(
            "a post needs content or at least one image".into(),
        ));
    }

    let tx = conn.unchecked_transaction()?;
    posts::update_content(&tx, post_id, content)?;
    hashtags::set_for_post(&tx, post_id, &extract_hashtags(content))?;
    tx.commit()?;

    tracing::debug!(post_id, "Post edited");
    Ok(Post {
        content: content.to_string(),
        ..post
    })
}

/// Delete the caller's own post. Replies and reposts go with it.
pub fn delete_post(conn: &Connection, post_id: &str, user_id: &str) -> AppResult<()> {
    let post = posts::find(conn, post_id)?.ok_or(AppError::NotFound("Post not found"))?;
    if post.author_id != user_id {
        return Err(AppError::Forbidden("Cannot delete another user's post".into()));
    }
    posts::delete(conn, post_id)?;
    tracing::info!(post_id, user_id, "Post deleted");
    Ok(())
}

pub fn reply(
    conn: &Connection,
    parent_id: &str,
    author_id: &str,
    draft: &PostDraft,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    validate_draft(draft)?;
    if !posts::exists(conn, parent_id)? {
        return Err(AppError::NotFound("Post not found"));
    }
    let reply = insert_with_extras(
        conn,
        &NewPost {
            author_id,
            content: &draft.content,
            reply_parent_id: Some(parent_id),
            repost_parent_id: None,
        },
        &draft.images,
        now,
    )?;
    notifications::on_reply(conn, &reply, now)?;
    tracing::info!(post_id = %reply.id, parent_id, author_id, "Reply created");
    Ok(reply)
}

/// Repost `parent_id`, optionally quoting it. Reposting the same post twice
/// creates two reposts.
pub fn repost(
    conn: &Connection,
    parent_id: &str,
    author_id: &str,
    draft: &RepostDraft,
    now: DateTime<Utc>,
) -> AppResult<Post> {
    let content = draft.content.as_deref().unwrap_or_default();
    check_length(content)?;
    if !posts::exists(conn, parent_id)? {
        return Err(AppError::NotFound("Post not found"));
    }
    let repost = insert_with_extras(
        conn,
        &NewPost {
            author_id,
            content,
            reply_parent_id: None,
            repost_parent_id: Some(parent_id),
        },
        &[],
        now,
    )?;
    notifications::on_repost(conn, &repost, now)?;
    tracing::info!(post_id = %repost.id, parent_id, author_id, "Repost created");
    Ok(repost)
}

/// Count a view of `post_id` unless this visitor was already counted within
/// the visit window. Returns whether a record was written.
pub fn record_visit(
    conn: &Connection,
    post_id: &str,
    visitor_id: &str,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    if !posts::exists(conn, post_id)? {
        return Err(AppError::NotFound("Post not found"));
    }
    let since = now - Duration::hours(VISIT_WINDOW_HOURS);
    if engagement::visited_since(conn, visitor_id, post_id, since)? {
        return Ok(false);
    }
    engagement::insert_visit(conn, visitor_id, post_id, now)?;
    Ok(true)
}
