//! In-process change feed for the bookmarks table.
//!
//! Each subscriber gets its own bounded queue. Inserts are delivered only to
//! subscribers of the row's owner. Deletes carry no owner column in the
//! realtime payload and go to every subscriber of the table; consumers treat
//! deletes of unknown ids as no-ops.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::services::remote_store::Subscription;
use crate::types::bookmark::Bookmark;
use crate::types::change::ChangeEvent;
use crate::types::errors::StoreError;

struct Subscriber {
    user_id: String,
    sender: mpsc::Sender<Value>,
}

struct FeedState {
    capacity: usize,
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber>,
}

/// Fan-out of change payloads to subscriber queues. Cloning shares the registry.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl ChangeFeed {
    /// Creates a feed whose subscribers each buffer up to `capacity` payloads.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FeedState {
                capacity: capacity.max(1),
                next_id: 0,
                subscribers: BTreeMap::new(),
            })),
        }
    }

    /// Registers a subscriber for `user_id`'s bookmarks.
    pub fn subscribe(&self, user_id: &str) -> Result<Subscription, StoreError> {
        let mut state = self.lock_state()?;
        let (sender, receiver) = mpsc::channel(state.capacity);
        let id = state.next_id;
        state.next_id = state.next_id.saturating_add(1);
        state.subscribers.insert(
            id,
            Subscriber {
                user_id: user_id.to_string(),
                sender,
            },
        );
        tracing::debug!(subscriber = id, user_id, "change feed subscriber added");

        let registry: Weak<Mutex<FeedState>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(receiver, move || {
            if let Some(registry) = registry.upgrade() {
                if let Ok(mut state) = registry.lock() {
                    state.subscribers.remove(&id);
                    tracing::debug!(subscriber = id, "change feed subscriber released");
                }
            }
        }))
    }

    /// Publishes a decoded event with the table's filtering rules applied.
    /// Returns the number of subscribers the payload was queued for.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let owner = match event {
            ChangeEvent::Insert(bookmark) => Some(bookmark.user_id.as_str()),
            ChangeEvent::Delete { .. } => None,
        };
        self.publish_payload(owner, event.to_payload())
    }

    /// Queues an insert for subscribers of the row's owner.
    pub fn publish_insert(&self, bookmark: &Bookmark) -> usize {
        self.publish(&ChangeEvent::Insert(bookmark.clone()))
    }

    /// Queues a delete for every subscriber.
    pub fn publish_delete(&self, id: &str) -> usize {
        self.publish(&ChangeEvent::Delete { id: id.to_string() })
    }

    /// Queues a raw payload for subscribers of `owner`, or for every
    /// subscriber when `owner` is `None`.
    pub fn publish_payload(&self, owner: Option<&str>, payload: Value) -> usize {
        let mut state = match self.lock_state() {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!("change feed unavailable, payload dropped: {err}");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut disconnected = Vec::new();
        for (id, subscriber) in &state.subscribers {
            if owner.is_some_and(|owner| owner != subscriber.user_id) {
                continue;
            }
            match subscriber.sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "subscriber queue full, change dropped");
                }
                Err(TrySendError::Closed(_)) => disconnected.push(*id),
            }
        }

        for id in disconnected {
            state.subscribers.remove(&id);
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_state().map(|s| s.subscribers.len()).unwrap_or(0)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, FeedState>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("change feed lock poisoned".to_string()))
    }
}
