//! Property-based tests for the BookmarkView reconciler.
//!
//! Random interleavings of seeds, insert events and delete events must keep
//! the view free of duplicate ids and ordered newest first, and replaying
//! any event must not change the result.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use smartmarks::managers::bookmark_view::BookmarkView;
use smartmarks::types::bookmark::Bookmark;
use smartmarks::types::change::ChangeEvent;

const USER: &str = "owner";

#[derive(Debug, Clone)]
enum Op {
    Insert { id: u8, secs: i64, foreign: bool },
    Delete { id: u8 },
    Seed(Vec<(u8, i64)>),
}

fn bookmark(id: u8, secs: i64, user_id: &str) -> Bookmark {
    Bookmark {
        id: format!("b{}", id),
        user_id: user_id.to_string(),
        title: format!("Title {}", id),
        url: format!("https://{}.example.com", id),
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u8..16, 0i64..1_000, prop::bool::weighted(0.15))
            .prop_map(|(id, secs, foreign)| Op::Insert { id, secs, foreign }),
        3 => (0u8..16).prop_map(|id| Op::Delete { id }),
        1 => prop::collection::vec((0u8..16, 0i64..1_000), 0..10).prop_map(Op::Seed),
    ]
}

fn apply(view: &mut BookmarkView, op: &Op) {
    match op {
        Op::Insert { id, secs, foreign } => {
            let owner = if *foreign { "intruder" } else { USER };
            view.apply_insert_event(bookmark(*id, *secs, owner));
        }
        Op::Delete { id } => {
            view.apply_delete_event(&format!("b{}", id));
        }
        Op::Seed(rows) => {
            view.seed(rows.iter().map(|(id, secs)| bookmark(*id, *secs, USER)).collect());
        }
    }
}

fn assert_invariants(view: &BookmarkView) -> Result<(), TestCaseError> {
    let items = view.snapshot();
    let unique: HashSet<&str> = items.iter().map(|b| b.id.as_str()).collect();
    prop_assert_eq!(unique.len(), items.len(), "duplicate ids in view");
    prop_assert!(
        items.windows(2).all(|w| w[0].created_at >= w[1].created_at),
        "view not ordered newest first"
    );
    prop_assert!(items.iter().all(|b| b.user_id == USER), "foreign row in view");
    Ok(())
}

proptest! {
    #[test]
    fn view_stays_unique_and_sorted(ops in prop::collection::vec(arb_op(), 0..60)) {
        let mut view = BookmarkView::new(USER);
        for op in &ops {
            apply(&mut view, op);
            assert_invariants(&view)?;
        }
    }

    #[test]
    fn replaying_an_event_is_a_noop(
        ops in prop::collection::vec(arb_op(), 0..40),
        last in arb_op(),
    ) {
        let mut view = BookmarkView::new(USER);
        for op in &ops {
            apply(&mut view, op);
        }
        if !matches!(last, Op::Seed(_)) {
            apply(&mut view, &last);
            let once = view.snapshot().to_vec();
            apply(&mut view, &last);
            prop_assert_eq!(view.snapshot(), once.as_slice());
        }
    }

    #[test]
    fn in_order_inserts_are_prepended(count in 1usize..30) {
        let mut view = BookmarkView::new(USER);
        for n in 0..count {
            let b = bookmark(n as u8, n as i64, USER);
            view.apply_insert_event(b.clone());
            prop_assert_eq!(&view.snapshot()[0], &b);
        }
        prop_assert_eq!(view.len(), count);
    }

    #[test]
    fn payload_path_matches_direct_path(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut direct = BookmarkView::new(USER);
        let mut via_payload = BookmarkView::new(USER);
        for op in &ops {
            apply(&mut direct, op);
            match op {
                Op::Insert { id, secs, foreign } => {
                    let owner = if *foreign { "intruder" } else { USER };
                    via_payload.apply_payload(&ChangeEvent::Insert(bookmark(*id, *secs, owner)).to_payload());
                }
                Op::Delete { id } => {
                    via_payload.apply_payload(&ChangeEvent::Delete { id: format!("b{}", id) }.to_payload());
                }
                Op::Seed(_) => apply(&mut via_payload, op),
            }
        }
        prop_assert_eq!(direct.snapshot(), via_payload.snapshot());
    }
}
