use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::timestamp;

pub const EXCERPT_CHARS: usize = 150;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Row of `<prefix>_forum_threads`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumThread {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub category_id: i64,
    pub user_id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_activity: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl ForumThread {
    /// Case-insensitive match on title, content or any tag
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

/// Row of `<prefix>_forum_replies`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForumReply {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub content: String,
    pub user_id: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default)]
    pub author_role: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

/// Thread as returned by the API: category resolved to its name, excerpt always set
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThreadSummary {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub author_name: String,
    pub author_role: String,
    pub tags: Vec<String>,
    pub is_pinned: bool,
    pub views: i64,
    pub reply_count: i64,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ThreadSummary {
    pub fn new(thread: ForumThread, category_name: Option<String>) -> Self {
        let excerpt = thread.excerpt.clone().unwrap_or_else(|| excerpt(&thread.content));
        Self {
            id: thread.id,
            title: thread.title,
            content: thread.content,
            excerpt,
            category_id: thread.category_id,
            category_name,
            author_name: thread.author_name,
            author_role: thread.author_role,
            tags: thread.tags,
            is_pinned: thread.is_pinned,
            views: thread.views,
            reply_count: thread.reply_count,
            last_activity: thread.last_activity,
            created_at: thread.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ThreadDetail {
    #[serde(flatten)]
    pub thread: ThreadSummary,
    pub replies: Vec<ForumReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category_id: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReplyRequest {
    pub thread_id: Uuid,
    #[serde(default)]
    pub content: String,
}

fn null_as_empty<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

/// First 150 characters followed by `...` when the content is longer
pub fn excerpt(content: &str) -> String {
    if content.chars().count() > EXCERPT_CHARS {
        let cut: String = content.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}
