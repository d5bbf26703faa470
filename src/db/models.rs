use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_image: Option<String>,
    pub header_image: Option<String>,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub reply_parent_id: Option<String>,
    pub repost_parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_reply(&self) -> bool {
        self.reply_parent_id.is_some()
    }

    pub fn is_repost(&self) -> bool {
        self.repost_parent_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostImage {
    pub id: String,
    pub post_id: String,
    pub image: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostLike {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

/// What a notification points at. Exactly one reference exists and it
/// always agrees with the notification type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationSubject {
    Like { like_id: String },
    Reply { reply_id: String },
    Repost { repost_id: String },
    Follow { follow_id: String },
}

impl NotificationSubject {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationSubject::Like { .. } => "like",
            NotificationSubject::Reply { .. } => "reply",
            NotificationSubject::Repost { .. } => "repost",
            NotificationSubject::Follow { .. } => "follow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub actor_id: String,
    #[serde(flatten)]
    pub subject: NotificationSubject,
    pub post_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagSummary {
    pub name: String,
    pub post_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: String,
    pub visitor_id: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

/// Raw engagement signals for one post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: i64,
    pub views: i64,
    pub bookmarks: i64,
    pub replies: i64,
    pub reposts: i64,
}

/// One image in a flattened media listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub post_id: String,
    pub url: String,
}
