//! End-to-end tests for BookmarkSession against the local store.
//!
//! Each test builds an in-memory `LocalStore`, opens one or more sessions on
//! it and drives them the way the UI would: add/delete followed by refetch,
//! and push events drained with `pump_events`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smartmarks::managers::bookmark_session::BookmarkSession;
use smartmarks::services::local_store::LocalStore;
use smartmarks::services::remote_store::{RemoteStore, Subscription};
use smartmarks::types::bookmark::{Bookmark, NewBookmark};
use smartmarks::types::errors::{BookmarkError, StoreError, ValidationError};

fn local_store() -> Arc<LocalStore> {
    Arc::new(LocalStore::open_in_memory(32).expect("Failed to open in-memory store"))
}

fn open(store: &Arc<LocalStore>, user_id: &str) -> BookmarkSession {
    BookmarkSession::open(Arc::clone(store) as Arc<dyn RemoteStore>, user_id)
        .expect("Failed to open session")
}

/// Local store wrapper that can be told to fail reads or hide its change feed.
struct FlakyStore {
    inner: LocalStore,
    fail_reads: AtomicBool,
    feed_enabled: bool,
}

impl RemoteStore for FlakyStore {
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unauthorized("JWT expired".to_string()));
        }
        self.inner.list_bookmarks(user_id)
    }

    fn insert_bookmark(&self, new: &NewBookmark) -> Result<Bookmark, StoreError> {
        self.inner.insert_bookmark(new)
    }

    fn delete_bookmark(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_bookmark(id)
    }

    fn subscribe_changes(&self, user_id: &str) -> Result<Subscription, StoreError> {
        if self.feed_enabled {
            self.inner.subscribe_changes(user_id)
        } else {
            Err(StoreError::Unsupported("change feed"))
        }
    }
}

/// Store that lands a write from another session right after the first read.
struct RacingStore {
    inner: LocalStore,
    raced: AtomicBool,
}

impl RemoteStore for RacingStore {
    fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Bookmark>, StoreError> {
        let rows = self.inner.list_bookmarks(user_id)?;
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.inner.insert_bookmark(&NewBookmark {
                user_id: user_id.to_string(),
                title: "Late".to_string(),
                url: "https://late.example".to_string(),
            })?;
        }
        Ok(rows)
    }

    fn insert_bookmark(&self, new: &NewBookmark) -> Result<Bookmark, StoreError> {
        self.inner.insert_bookmark(new)
    }

    fn delete_bookmark(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete_bookmark(id)
    }

    fn subscribe_changes(&self, user_id: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe_changes(user_id)
    }
}

fn flaky(feed_enabled: bool) -> Arc<FlakyStore> {
    Arc::new(FlakyStore {
        inner: LocalStore::open_in_memory(32).unwrap(),
        fail_reads: AtomicBool::new(false),
        feed_enabled,
    })
}

#[test]
fn test_create_normalizes_url_and_refetches() {
    let store = local_store();
    let mut session = open(&store, "alice");
    assert!(session.snapshot().is_empty());

    let stored = session.add_bookmark("Docs", "example.com").unwrap();
    assert_eq!(stored.url, "https://example.com");

    let view = session.snapshot();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].title, "Docs");
    assert_eq!(view[0].url, "https://example.com");
    assert_eq!(view[0].user_id, "alice");
}

#[test]
fn test_own_insert_event_after_refetch_is_noop() {
    let store = local_store();
    let mut session = open(&store, "alice");

    session.add_bookmark("Docs", "example.com").unwrap();

    assert_eq!(session.pump_events(), 0);
    assert_eq!(session.snapshot().len(), 1);
}

#[test]
fn test_second_session_receives_insert_without_refetch() {
    let store = local_store();
    let mut window_a = open(&store, "alice");
    let mut window_b = open(&store, "alice");

    let stored = window_a.add_bookmark("Rust", "https://www.rust-lang.org").unwrap();
    assert!(window_b.snapshot().is_empty());

    assert_eq!(window_b.pump_events(), 1);

    assert_eq!(window_b.snapshot().len(), 1);
    assert_eq!(window_b.snapshot()[0].id, stored.id);
}

#[test]
fn test_second_session_receives_delete() {
    let store = local_store();
    let mut window_a = open(&store, "alice");
    let first = window_a.add_bookmark("One", "one.example").unwrap();
    window_a.add_bookmark("Two", "two.example").unwrap();

    let mut window_b = open(&store, "alice");
    assert_eq!(window_b.snapshot().len(), 2);

    window_a.delete_bookmark(&first.id).unwrap();
    assert_eq!(window_a.snapshot().len(), 1);

    assert_eq!(window_b.pump_events(), 1);
    assert_eq!(window_b.snapshot().len(), 1);
    assert_eq!(window_b.snapshot()[0].title, "Two");
}

#[test]
fn test_other_users_inserts_are_not_delivered() {
    let store = local_store();
    let mut alice = open(&store, "alice");
    let mut bob = open(&store, "bob");

    bob.add_bookmark("Bob's", "bob.example").unwrap();

    assert_eq!(alice.pump_events(), 0);
    assert!(alice.snapshot().is_empty());
}

#[test]
fn test_other_users_deletes_are_harmless() {
    let store = local_store();
    let mut alice = open(&store, "alice");
    let mut bob = open(&store, "bob");
    alice.add_bookmark("Mine", "mine.example").unwrap();
    let theirs = bob.add_bookmark("Theirs", "theirs.example").unwrap();
    alice.pump_events();

    bob.delete_bookmark(&theirs.id).unwrap();

    assert_eq!(alice.pump_events(), 0);
    assert_eq!(alice.snapshot().len(), 1);
    assert_eq!(alice.snapshot()[0].title, "Mine");
}

#[test]
fn test_newest_bookmark_is_listed_first() {
    let store = local_store();
    let mut session = open(&store, "alice");

    session.add_bookmark("First", "first.example").unwrap();
    session.add_bookmark("Second", "second.example").unwrap();
    session.add_bookmark("Third", "third.example").unwrap();

    let titles: Vec<&str> = session.snapshot().iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Third", "Second", "First"]);
}

#[test]
fn test_validation_error_issues_no_request() {
    let store = local_store();
    let mut session = open(&store, "alice");

    let err = session.add_bookmark("  ", "example.com").unwrap_err();
    assert!(matches!(
        err,
        BookmarkError::Validation(ValidationError::MissingFields)
    ));
    let err = session.add_bookmark("Docs", "").unwrap_err();
    assert!(matches!(err, BookmarkError::Validation(_)));

    assert!(session.snapshot().is_empty());
    assert!(store.list_bookmarks("alice").unwrap().is_empty());
}

#[test]
fn test_deleting_unknown_id_succeeds() {
    let store = local_store();
    let mut session = open(&store, "alice");
    session.add_bookmark("Keep", "keep.example").unwrap();

    session.delete_bookmark("does-not-exist").unwrap();

    assert_eq!(session.snapshot().len(), 1);
}

#[test]
fn test_failed_refresh_keeps_view() {
    let store = flaky(true);
    let mut session = BookmarkSession::open(Arc::clone(&store) as Arc<dyn RemoteStore>, "alice").unwrap();
    session.add_bookmark("Docs", "example.com").unwrap();
    let before = session.snapshot().to_vec();

    store.fail_reads.store(true, Ordering::SeqCst);
    let err = session.refresh().unwrap_err();

    assert!(matches!(err, StoreError::Unauthorized(_)));
    assert_eq!(session.snapshot(), before.as_slice());
}

#[test]
fn test_write_succeeds_but_refetch_fails() {
    let store = flaky(true);
    let mut session = BookmarkSession::open(Arc::clone(&store) as Arc<dyn RemoteStore>, "alice").unwrap();

    store.fail_reads.store(true, Ordering::SeqCst);
    let err = session.add_bookmark("Docs", "example.com").unwrap_err();

    assert!(matches!(err, BookmarkError::Store(StoreError::Unauthorized(_))));
    assert!(session.snapshot().is_empty());

    // The push channel still carries the insert.
    assert_eq!(session.pump_events(), 1);
    assert_eq!(session.snapshot().len(), 1);
}

#[test]
fn test_session_without_change_feed_still_works() {
    let store = flaky(false);
    let mut session = BookmarkSession::open(Arc::clone(&store) as Arc<dyn RemoteStore>, "alice").unwrap();

    assert!(!session.is_live());
    session.add_bookmark("Docs", "example.com").unwrap();

    assert_eq!(session.pump_events(), 0);
    assert_eq!(session.snapshot().len(), 1);
}

#[test]
fn test_close_releases_subscription() {
    let store = local_store();
    let session = open(&store, "alice");
    let other = open(&store, "alice");
    assert_eq!(store.feed().subscriber_count(), 2);

    session.close();
    assert_eq!(store.feed().subscriber_count(), 1);

    drop(other);
    assert_eq!(store.feed().subscriber_count(), 0);
}

#[test]
fn test_write_during_initial_read_is_not_lost() {
    let store = Arc::new(RacingStore {
        inner: LocalStore::open_in_memory(32).unwrap(),
        raced: AtomicBool::new(false),
    });
    let mut session = BookmarkSession::open(Arc::clone(&store) as Arc<dyn RemoteStore>, "alice").unwrap();
    assert!(session.snapshot().is_empty());

    assert_eq!(session.pump_events(), 1);
    assert_eq!(session.snapshot().len(), 1);
    assert_eq!(session.snapshot()[0].title, "Late");
}

#[test]
fn test_failed_initial_read_releases_subscription() {
    let store = flaky(true);
    store.fail_reads.store(true, Ordering::SeqCst);

    let result = BookmarkSession::open(Arc::clone(&store) as Arc<dyn RemoteStore>, "alice");

    assert!(matches!(result, Err(StoreError::Unauthorized(_))));
    assert_eq!(store.inner.feed().subscriber_count(), 0);
}
