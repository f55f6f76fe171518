//! Unit tests for the in-process change feed.

use chrono::{TimeZone, Utc};
use serde_json::json;

use smartmarks::services::change_feed::ChangeFeed;
use smartmarks::types::bookmark::Bookmark;
use smartmarks::types::change::ChangeEvent;

fn bookmark(id: &str, user_id: &str) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: "Docs".to_string(),
        url: "https://example.com".to_string(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

#[test]
fn test_insert_reaches_only_the_owner() {
    let feed = ChangeFeed::new(8);
    let mut alice = feed.subscribe("alice").unwrap();
    let mut bob = feed.subscribe("bob").unwrap();

    let delivered = feed.publish_insert(&bookmark("b1", "alice"));

    assert_eq!(delivered, 1);
    let payload = alice.try_next().expect("alice should receive the insert");
    assert_eq!(
        ChangeEvent::from_payload(&payload),
        Some(ChangeEvent::Insert(bookmark("b1", "alice")))
    );
    assert!(bob.try_next().is_none());
}

#[test]
fn test_delete_reaches_every_subscriber() {
    let feed = ChangeFeed::new(8);
    let mut alice = feed.subscribe("alice").unwrap();
    let mut bob = feed.subscribe("bob").unwrap();

    let delivered = feed.publish_delete("b1");

    assert_eq!(delivered, 2);
    assert!(alice.try_next().is_some());
    assert!(bob.try_next().is_some());
}

#[test]
fn test_events_arrive_in_publish_order() {
    let feed = ChangeFeed::new(8);
    let mut sub = feed.subscribe("alice").unwrap();

    feed.publish(&ChangeEvent::Insert(bookmark("b1", "alice")));
    feed.publish(&ChangeEvent::Delete { id: "b1".to_string() });

    let first = ChangeEvent::from_payload(&sub.try_next().unwrap());
    let second = ChangeEvent::from_payload(&sub.try_next().unwrap());
    assert!(matches!(first, Some(ChangeEvent::Insert(_))));
    assert_eq!(second, Some(ChangeEvent::Delete { id: "b1".to_string() }));
    assert!(sub.try_next().is_none());
}

#[test]
fn test_full_queue_drops_new_payloads() {
    let feed = ChangeFeed::new(2);
    let mut sub = feed.subscribe("alice").unwrap();

    for n in 0..5 {
        feed.publish_payload(None, json!({ "n": n }));
    }

    assert_eq!(sub.try_next(), Some(json!({ "n": 0 })));
    assert_eq!(sub.try_next(), Some(json!({ "n": 1 })));
    assert!(sub.try_next().is_none());
}

#[test]
fn test_zero_capacity_is_clamped() {
    let feed = ChangeFeed::new(0);
    let mut sub = feed.subscribe("alice").unwrap();

    assert_eq!(feed.publish_payload(None, json!({})), 1);
    assert!(sub.try_next().is_some());
}

#[test]
fn test_drop_releases_subscriber() {
    let feed = ChangeFeed::new(8);
    let sub = feed.subscribe("alice").unwrap();
    let _other = feed.subscribe("alice").unwrap();
    assert_eq!(feed.subscriber_count(), 2);

    drop(sub);

    assert_eq!(feed.subscriber_count(), 1);
    assert_eq!(feed.publish(&ChangeEvent::Insert(bookmark("b1", "alice"))), 1);
}

#[test]
fn test_close_unregisters_subscriber() {
    let feed = ChangeFeed::new(8);
    let sub = feed.subscribe("alice").unwrap();
    assert!(!sub.is_closed());

    sub.close();

    assert_eq!(feed.subscriber_count(), 0);
    assert_eq!(feed.publish(&ChangeEvent::Insert(bookmark("b1", "alice"))), 0);
}

#[test]
fn test_clones_share_the_registry() {
    let feed = ChangeFeed::new(8);
    let publisher = feed.clone();
    let mut sub = feed.subscribe("alice").unwrap();

    assert_eq!(publisher.subscriber_count(), 1);
    publisher.publish(&ChangeEvent::Insert(bookmark("b1", "alice")));
    assert!(sub.try_next().is_some());
}
