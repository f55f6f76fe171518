//! Row-level change events delivered by the realtime feed.
//!
//! Payloads travel as raw JSON in the backend's `postgres_changes` shape and
//! are decoded at the consumer, so a bad payload only costs the consumer a
//! dropped event.

use serde_json::{json, Value};

use super::bookmark::Bookmark;

/// Table the bookmark feed is bound to.
pub const BOOKMARKS_TABLE: &str = "bookmarks";

/// A decoded change to the `bookmarks` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Insert(Bookmark),
    Delete { id: String },
}

impl ChangeEvent {
    /// Decodes a raw realtime payload. Returns `None` for anything that is not
    /// a well-formed INSERT or DELETE on the bookmarks table.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        if let Some(table) = payload.get("table") {
            if table.as_str() != Some(BOOKMARKS_TABLE) {
                return None;
            }
        }

        match payload.get("eventType")?.as_str()? {
            "INSERT" => {
                let row = payload.get("new")?;
                let bookmark: Bookmark = serde_json::from_value(row.clone()).ok()?;
                Some(ChangeEvent::Insert(bookmark))
            }
            "DELETE" => {
                let id = payload.get("old")?.get("id")?.as_str()?;
                if id.is_empty() {
                    return None;
                }
                Some(ChangeEvent::Delete { id: id.to_string() })
            }
            _ => None,
        }
    }

    /// Encodes the event in the realtime payload shape.
    pub fn to_payload(&self) -> Value {
        match self {
            ChangeEvent::Insert(bookmark) => json!({
                "eventType": "INSERT",
                "table": BOOKMARKS_TABLE,
                "new": bookmark,
                "old": {},
            }),
            ChangeEvent::Delete { id } => json!({
                "eventType": "DELETE",
                "table": BOOKMARKS_TABLE,
                "new": {},
                "old": { "id": id },
            }),
        }
    }
}
