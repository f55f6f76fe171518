//! Bookmark view reconciler.
//!
//! Holds what one session currently believes the user's bookmarks are, fed by
//! three channels: the snapshot taken when the session opens, full re-reads
//! after local writes, and realtime push events. Snapshots replace the list
//! wholesale; push events patch it in place.
//!
//! The list is unique by `id`, ordered by `created_at` descending, and only
//! ever contains rows owned by the view's user.

use std::collections::HashSet;

use serde_json::Value;

use crate::services::remote_store::RemoteStore;
use crate::types::bookmark::Bookmark;
use crate::types::change::ChangeEvent;
use crate::types::errors::StoreError;

/// Ordered, deduplicated bookmark list for one user.
#[derive(Debug, Clone)]
pub struct BookmarkView {
    user_id: String,
    entries: Vec<Bookmark>,
}

impl BookmarkView {
    /// Creates an empty view for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            entries: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Replaces the view with the authoritative set read when the session opened.
    pub fn seed(&mut self, initial: Vec<Bookmark>) {
        self.replace(initial);
    }

    /// Re-reads the full set from `store` and replaces the view with it.
    ///
    /// On error the view is left exactly as it was.
    pub fn refetch(&mut self, store: &dyn RemoteStore) -> Result<&[Bookmark], StoreError> {
        let fresh = store.list_bookmarks(&self.user_id)?;
        self.replace(fresh);
        Ok(&self.entries)
    }

    /// Adds a pushed row unless its id is already present.
    ///
    /// Returns `true` if the view changed. In-order delivery always lands at
    /// the front; a row older than the current head is placed at its sorted
    /// position instead.
    pub fn apply_insert_event(&mut self, bookmark: Bookmark) -> bool {
        if bookmark.user_id != self.user_id {
            tracing::debug!(id = %bookmark.id, "insert event for another user dropped");
            return false;
        }
        if self.entries.iter().any(|b| b.id == bookmark.id) {
            return false;
        }

        let at = self
            .entries
            .iter()
            .position(|b| b.created_at <= bookmark.created_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, bookmark);
        true
    }

    /// Removes the row with `id` if present. Returns `true` if the view changed.
    pub fn apply_delete_event(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|b| b.id != id);
        self.entries.len() != before
    }

    pub fn apply(&mut self, event: ChangeEvent) -> bool {
        match event {
            ChangeEvent::Insert(bookmark) => self.apply_insert_event(bookmark),
            ChangeEvent::Delete { id } => self.apply_delete_event(&id),
        }
    }

    /// Decodes and applies a raw realtime payload. Malformed payloads are dropped.
    pub fn apply_payload(&mut self, payload: &Value) -> bool {
        match ChangeEvent::from_payload(payload) {
            Some(event) => self.apply(event),
            None => {
                tracing::debug!("malformed change payload dropped");
                false
            }
        }
    }

    /// The current view, newest first.
    pub fn snapshot(&self) -> &[Bookmark] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn replace(&mut self, rows: Vec<Bookmark>) {
        let mut seen = HashSet::with_capacity(rows.len());
        let mut entries: Vec<Bookmark> = rows
            .into_iter()
            .filter(|b| b.user_id == self.user_id)
            .filter(|b| seen.insert(b.id.clone()))
            .collect();
        // Stable, so rows sharing a timestamp keep the order they arrived in.
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.entries = entries;
    }
}
