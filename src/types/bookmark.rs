use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved bookmark as stored by the backend.
///
/// `id`, `user_id` and `created_at` are assigned by the store and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a bookmark that has passed the form rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub user_id: String,
    pub title: String,
    pub url: String,
}
