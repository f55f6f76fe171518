//! Bookmark session: one mounted bookmark list for one signed-in user.
//!
//! Wires the reconciler to an injected store handle and owns the change-feed
//! subscription for as long as the session lives. Local writes go straight to
//! the store and are followed by a full refetch; rows changed elsewhere arrive
//! as push events and are applied by [`BookmarkSession::pump_events`].

use std::sync::Arc;

use crate::managers::bookmark_view::BookmarkView;
use crate::services::bookmark_form;
use crate::services::remote_store::{RemoteStore, Subscription};
use crate::types::bookmark::Bookmark;
use crate::types::errors::{BookmarkError, StoreError};

pub struct BookmarkSession {
    store: Arc<dyn RemoteStore>,
    view: BookmarkView,
    subscription: Option<Subscription>,
}

impl BookmarkSession {
    /// Subscribes to changes, then reads the user's bookmarks and seeds the view.
    ///
    /// Subscribing first means a row written while the initial read is in
    /// flight still arrives as an event; rows seen by both are deduplicated.
    /// A failed initial read is an error. A failed subscription is not: the
    /// session then only learns about remote changes through refetches.
    pub fn open(store: Arc<dyn RemoteStore>, user_id: &str) -> Result<Self, StoreError> {
        let subscription = match store.subscribe_changes(user_id) {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                tracing::warn!(user_id, "live updates unavailable: {err}");
                None
            }
        };

        let mut view = BookmarkView::new(user_id);
        view.seed(store.list_bookmarks(user_id)?);

        tracing::info!(user_id, bookmarks = view.len(), live = subscription.is_some(), "bookmark session opened");
        Ok(Self {
            store,
            view,
            subscription,
        })
    }

    pub fn user_id(&self) -> &str {
        self.view.user_id()
    }

    /// Whether a change-feed subscription is attached.
    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn snapshot(&self) -> &[Bookmark] {
        self.view.snapshot()
    }

    /// Validates the form input, stores the bookmark and refetches.
    ///
    /// Validation failures issue no request. If the insert succeeds but the
    /// refetch fails, the refetch error is returned and the view is unchanged.
    pub fn add_bookmark(&mut self, title: &str, url: &str) -> Result<Bookmark, BookmarkError> {
        let new = bookmark_form::prepare(self.view.user_id(), title, url)?;
        let stored = self.store.insert_bookmark(&new)?;
        self.view.refetch(self.store.as_ref())?;
        Ok(stored)
    }

    /// Deletes the bookmark and refetches.
    pub fn delete_bookmark(&mut self, id: &str) -> Result<(), BookmarkError> {
        self.store.delete_bookmark(id)?;
        self.view.refetch(self.store.as_ref())?;
        Ok(())
    }

    /// Replaces the view with a fresh read from the store.
    pub fn refresh(&mut self) -> Result<&[Bookmark], StoreError> {
        self.view.refetch(self.store.as_ref())
    }

    /// Applies every queued push payload. Returns how many changed the view.
    pub fn pump_events(&mut self) -> usize {
        let Some(subscription) = self.subscription.as_mut() else {
            return 0;
        };

        let mut changed = 0;
        while let Some(payload) = subscription.try_next() {
            if self.view.apply_payload(&payload) {
                changed += 1;
            }
        }
        changed
    }

    /// Releases the subscription. Dropping the session does the same.
    pub fn close(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.close();
        }
        tracing::info!(user_id = self.view.user_id(), "bookmark session closed");
    }
}
