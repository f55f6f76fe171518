//! Remote store interface.
//!
//! The reconciler and the bookmark session only see this narrow surface:
//! list, insert and delete over the `bookmarks` relation, plus a change-feed
//! subscription. Store handles are constructed explicitly and passed down.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::types::bookmark::{Bookmark, NewBookmark};
use crate::types::errors::StoreError;

/// Authenticated CRUD over the `bookmarks` relation plus its change feed.
pub trait RemoteStore: Send + Sync {
    /// Returns the user's bookmarks ordered by `created_at` descending.
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError>;
    /// Stores a bookmark and returns the row with its assigned id and timestamp.
    fn insert_bookmark(&self, new: &NewBookmark) -> Result<Bookmark, StoreError>;
    /// Deletes the bookmark with the given id. Deleting a missing id succeeds.
    fn delete_bookmark(&self, id: &str) -> Result<(), StoreError>;
    /// Opens a change-feed subscription for the user's bookmarks.
    fn subscribe_changes(&self, user_id: &str) -> Result<Subscription, StoreError>;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Receiving end of a change-feed registration.
///
/// Payloads are raw realtime JSON; decoding is left to the consumer. The
/// registration is released by [`Subscription::close`] or on drop, after which
/// no further payloads are returned.
pub struct Subscription {
    receiver: mpsc::Receiver<Value>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Wraps a channel receiver. `release` runs exactly once, on close or drop.
    pub fn new<F>(receiver: mpsc::Receiver<Value>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            receiver,
            release: Some(Box::new(release)),
        }
    }

    /// Returns the next queued payload, or `None` when the queue is empty or
    /// the subscription has been released.
    pub fn try_next(&mut self) -> Option<Value> {
        if self.release.is_none() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        self.release.is_none()
    }

    /// Releases the registration.
    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            self.receiver.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}
