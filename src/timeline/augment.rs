//! Viewer-relative post and profile representations.
//!
//! Nothing here is cached: counters and flags are read from the store each
//! time a post is rendered, and only the posts of the current page are
//! loaded.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::MediaConfig;
use crate::db::models::{MediaItem, Post, User};
use crate::error::{AppError, AppResult};
use crate::store::{engagement, posts, users};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub name: String,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentedPost {
    pub id: String,
    pub author: AuthorSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reply_parent: Option<String>,
    pub repost_parent: Option<String>,
    pub images: Vec<String>,
    pub liked: bool,
    pub bookmarked: bool,
    pub reposted: bool,
    pub reply_count: i64,
    pub repost_count: i64,
    pub like_count: i64,
    pub bookmark_count: i64,
    pub view_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_image: Option<String>,
    pub header_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub follower_count: i64,
    pub following_count: i64,
    pub post_count: i64,
    /// The viewer follows this user.
    pub is_following: bool,
    /// This user follows the viewer.
    pub follows_you: bool,
}

/// The requesting user's own account, including private fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub email: String,
    pub date_of_birth: NaiveDate,
}

/// Renders posts and users for one viewer on one connection.
pub struct Augmenter<'a> {
    conn: &'a Connection,
    viewer_id: &'a str,
    media: &'a MediaConfig,
}

impl<'a> Augmenter<'a> {
    pub fn new(conn: &'a Connection, viewer_id: &'a str, media: &'a MediaConfig) -> Self {
        Self {
            conn,
            viewer_id,
            media,
        }
    }

    pub fn author(&self, user: &User) -> AuthorSummary {
        AuthorSummary {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            profile_image: user
                .profile_image
                .as_deref()
                .map(|r| self.media.absolute_url(r)),
        }
    }

    pub fn post(&self, post: Post) -> AppResult<AugmentedPost> {
        let author = users::find_by_id(self.conn, &post.author_id)?
            .ok_or_else(|| AppError::Internal(format!("post {} has no author", post.id)))?;
        let images = posts::images(self.conn, &post.id)?
            .into_iter()
            .map(|image| self.media.absolute_url(&image.image))
            .collect();
        let counts = engagement::counts(self.conn, &post.id)?;
        let (liked, bookmarked, reposted) =
            engagement::viewer_flags(self.conn, &post.id, self.viewer_id)?;

        Ok(AugmentedPost {
            author: self.author(&author),
            id: post.id,
            content: post.content,
            created_at: post.created_at,
            reply_parent: post.reply_parent_id,
            repost_parent: post.repost_parent_id,
            images,
            liked,
            bookmarked,
            reposted,
            reply_count: counts.replies,
            repost_count: counts.reposts,
            like_count: counts.likes,
            bookmark_count: counts.bookmarks,
            view_count: counts.views,
        })
    }

    pub fn post_by_id(&self, id: &str) -> AppResult<AugmentedPost> {
        let post = posts::find(self.conn, id)?.ok_or(AppError::NotFound("Post not found"))?;
        self.post(post)
    }

    pub fn profile(&self, user: User) -> AppResult<UserProfile> {
        let (follower_count, following_count, post_count) =
            engagement::user_counts(self.conn, &user.id)?;
        let is_following = engagement::follow_exists(self.conn, self.viewer_id, &user.id)?;
        let follows_you = engagement::follow_exists(self.conn, &user.id, self.viewer_id)?;

        Ok(UserProfile {
            profile_image: user
                .profile_image
                .as_deref()
                .map(|r| self.media.absolute_url(r)),
            header_image: user
                .header_image
                .as_deref()
                .map(|r| self.media.absolute_url(r)),
            id: user.id,
            username: user.username,
            name: user.name,
            bio: user.bio,
            location: user.location,
            website: user.website,
            created_at: user.created_at,
            follower_count,
            following_count,
            post_count,
            is_following,
            follows_you,
        })
    }

    pub fn account(&self, user: &User) -> AppResult<AccountView> {
        Ok(AccountView {
            profile: self.profile(user.clone())?,
            email: user.email.clone(),
            date_of_birth: user.date_of_birth,
        })
    }

    pub fn media(&self, item: MediaItem) -> MediaItem {
        MediaItem {
            url: self.media.absolute_url(&item.url),
            post_id: item.post_id,
        }
    }
}
