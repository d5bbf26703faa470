//! Notification fan-out and the recipient-facing inbox.
//!
//! Fan-out runs on the same connection as the action that caused it.
//! Self-actions never notify, and undoing an action never retracts the
//! notification it produced.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::MediaConfig;
use crate::db::models::{Follow, Notification, NotificationSubject, Post, PostLike};
use crate::error::{AppError, AppResult};
use crate::store::{notifications, posts, users};
use crate::timeline::augment::{AuthorSummary, Augmenter};
use crate::timeline::cursor::{Page, PageRequest, Pager, POST_PAGE_SIZE};

/// Notify the author of a liked post.
pub fn on_like(conn: &Connection, like: &PostLike, now: DateTime<Utc>) -> AppResult<Option<Notification>> {
    let post = posts::find(conn, &like.post_id)?.ok_or(AppError::NotFound("Post not found"))?;
    notify(
        conn,
        &post.author_id,
        &like.user_id,
        NotificationSubject::Like {
            like_id: like.id.clone(),
        },
        Some(&post.id),
        now,
    )
}

/// Notify the parent's author about a new reply.
pub fn on_reply(conn: &Connection, reply: &Post, now: DateTime<Utc>) -> AppResult<Option<Notification>> {
    let Some(parent_id) = reply.reply_parent_id.as_deref() else {
        return Ok(None);
    };
    let parent = posts::find(conn, parent_id)?.ok_or(AppError::NotFound("Post not found"))?;
    notify(
        conn,
        &parent.author_id,
        &reply.author_id,
        NotificationSubject::Reply {
            reply_id: reply.id.clone(),
        },
        Some(&parent.id),
        now,
    )
}

/// Notify the parent's author about a repost.
pub fn on_repost(conn: &Connection, repost: &Post, now: DateTime<Utc>) -> AppResult<Option<Notification>> {
    let Some(parent_id) = repost.repost_parent_id.as_deref() else {
        return Ok(None);
    };
    let parent = posts::find(conn, parent_id)?.ok_or(AppError::NotFound("Post not found"))?;
    notify(
        conn,
        &parent.author_id,
        &repost.author_id,
        NotificationSubject::Repost {
            repost_id: repost.id.clone(),
        },
        Some(&parent.id),
        now,
    )
}

/// Notify the followed user.
pub fn on_follow(conn: &Connection, follow: &Follow, now: DateTime<Utc>) -> AppResult<Option<Notification>> {
    notify(
        conn,
        &follow.following_id,
        &follow.follower_id,
        NotificationSubject::Follow {
            follow_id: follow.id.clone(),
        },
        None,
        now,
    )
}

fn notify(
    conn: &Connection,
    recipient_id: &str,
    actor_id: &str,
    subject: NotificationSubject,
    post_id: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<Option<Notification>> {
    if recipient_id == actor_id {
        return Ok(None);
    }
    let kind = subject.kind();
    let notification = notifications::insert(conn, recipient_id, actor_id, subject, post_id, now)?;
    tracing::info!(
        notification_id = %notification.id,
        recipient_id,
        actor_id,
        kind,
        "Notification created"
    );
    Ok(Some(notification))
}

/// One inbox entry as the recipient sees it.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    #[serde(flatten)]
    pub subject: NotificationSubject,
    pub actor: AuthorSummary,
    pub post_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

pub fn list(
    conn: &Connection,
    recipient_id: &str,
    req: PageRequest,
    media: &MediaConfig,
) -> AppResult<Page<NotificationView>> {
    let count = notifications::count_for(conn, recipient_id, req.cursor)?;
    let pager = Pager::new(count, req.page, POST_PAGE_SIZE)?;
    let rows =
        notifications::window_for(conn, recipient_id, req.cursor, pager.limit(), pager.offset())?;

    let augmenter = Augmenter::new(conn, recipient_id, media);
    pager.finish(rows).try_map(|n| {
        let actor = users::find_by_id(conn, &n.actor_id)?
            .ok_or_else(|| AppError::Internal(format!("notification {} has no actor", n.id)))?;
        Ok(NotificationView {
            actor: augmenter.author(&actor),
            id: n.id,
            subject: n.subject,
            post_id: n.post_id,
            read: n.read,
            created_at: n.created_at,
        })
    })
}

/// Mark one notification read. Only its recipient may do so.
pub fn mark_read(conn: &Connection, id: &str, user_id: &str) -> AppResult<()> {
    let notification =
        notifications::find(conn, id)?.ok_or(AppError::NotFound("Notification not found"))?;
    if notification.recipient_id != user_id {
        return Err(AppError::Forbidden(
            "Cannot modify another user's notification".into(),
        ));
    }
    notifications::mark_read(conn, id)?;
    Ok(())
}

pub fn mark_all_read(conn: &Connection, user_id: &str) -> AppResult<usize> {
    Ok(notifications::mark_all_read(conn, user_id)?)
}

pub fn delete_all(conn: &Connection, user_id: &str) -> AppResult<usize> {
    let removed = notifications::delete_all(conn, user_id)?;
    tracing::info!(user_id, removed, "Notifications cleared");
    Ok(removed)
}
