//! Selection tracking under out-of-order detail fetch completions.

use std::sync::Arc;
use trackline::data::{Comment, Issue, IssuePage, Priority};
use trackline::sync::{
    DetailFetcher, PageFetcher, SelectionTracker, SyncController, SyncEvent, SyncStatus,
};

fn issue(id: &str) -> Issue {
    Issue {
        id: id.to_string(),
        identifier: format!("ENG-{id}"),
        title: format!("Issue {id}"),
        description: None,
        state: "Todo".to_string(),
        state_id: None,
        assignee: None,
        assignee_id: None,
        priority: Priority::NoPriority,
        url: String::new(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        team_id: None,
        project_id: None,
        archived: false,
        labels: vec![],
        parent: None,
        children: vec![],
        comments: vec![],
    }
}

fn detailed(id: &str) -> Issue {
    let mut full = issue(id);
    full.description = Some(format!("Full description for {id}"));
    full.comments = vec![Comment {
        id: format!("comment-{id}"),
        body: "Looks good".to_string(),
        author: Some("reviewer".to_string()),
        created_at: chrono::Utc::now(),
    }];
    full
}

fn pending_pages() -> PageFetcher {
    Arc::new(|_params, _cursor| Box::pin(futures::future::pending()))
}

fn pending_details() -> DetailFetcher {
    Arc::new(|_id| Box::pin(futures::future::pending()))
}

/// Controller pre-loaded with a record set, detail fetches never resolve
/// on their own so completions can be injected in any order.
fn controller_with(ids: &[&str]) -> SyncController {
    let mut sync = SyncController::new(pending_pages(), pending_details());
    let generation = sync.generation();
    sync.apply(SyncEvent::Page {
        generation,
        page: IssuePage {
            issues: ids.iter().map(|id| issue(id)).collect(),
            end_cursor: None,
            has_more: false,
        },
        number: 1,
        fetched: ids.len(),
    });
    sync
}

#[tokio::test]
async fn selecting_publishes_provisional_record_immediately() {
    let mut sync = controller_with(&["a", "b"]);

    assert!(sync.select("b"));
    let selected = sync.selected().expect("selection set");
    assert_eq!(selected.id, "b");
    // List-derived record: no detail payload yet.
    assert!(selected.comments.is_empty());
    assert!(sync.selection().is_fetching());
}

#[tokio::test]
async fn late_completion_for_superseded_selection_is_discarded() {
    let mut sync = controller_with(&["a", "b"]);

    sync.select("a");
    sync.select("b");

    // a's detail arrives after b was selected.
    let applied = sync.apply(SyncEvent::Detail {
        id: "a".to_string(),
        result: Ok(detailed("a")),
    });
    assert!(!applied);
    assert_eq!(sync.selected().map(|i| i.id.as_str()), Some("b"));
    assert!(sync.selection().is_fetching());

    // b's own completion still lands.
    let applied = sync.apply(SyncEvent::Detail {
        id: "b".to_string(),
        result: Ok(detailed("b")),
    });
    assert!(applied);
    let selected = sync.selected().expect("selection set");
    assert_eq!(selected.id, "b");
    assert_eq!(selected.comments.len(), 1);
    assert!(!sync.selection().is_fetching());
}

#[tokio::test]
async fn failed_detail_fetch_keeps_provisional_selection() {
    let mut sync = controller_with(&["a"]);

    sync.select("a");
    let applied = sync.apply(SyncEvent::Detail {
        id: "a".to_string(),
        result: Err("network down".to_string()),
    });

    assert!(applied);
    assert_eq!(sync.selected().map(|i| i.id.as_str()), Some("a"));
    assert!(!sync.selection().is_fetching());
    assert!(matches!(sync.status(), SyncStatus::Error(_)));
}

#[tokio::test]
async fn stale_failure_after_reselection_is_ignored() {
    let mut sync = controller_with(&["a", "b"]);

    sync.select("a");
    sync.select("b");
    let applied = sync.apply(SyncEvent::Detail {
        id: "a".to_string(),
        result: Err("timeout".to_string()),
    });

    assert!(!applied);
    assert_eq!(sync.selected().map(|i| i.id.as_str()), Some("b"));
    // The newer fetch is still outstanding and no error leaked through.
    assert!(sync.selection().is_fetching());
    assert!(!matches!(sync.status(), SyncStatus::Error(_)));
}

#[tokio::test]
async fn selecting_unknown_id_is_rejected() {
    let mut sync = controller_with(&["a"]);
    assert!(!sync.select("missing"));
}

#[tokio::test]
async fn refresh_restores_previous_selection_when_still_present() {
    let mut sync = controller_with(&["a", "b", "c"]);
    sync.select("b");

    // Next first page (same generation here) re-resolves the selection.
    let generation = sync.generation();
    sync.apply(SyncEvent::Page {
        generation,
        page: IssuePage {
            issues: vec![issue("c"), issue("b")],
            end_cursor: None,
            has_more: false,
        },
        number: 1,
        fetched: 2,
    });
    assert_eq!(sync.selected().map(|i| i.id.as_str()), Some("b"));

    // When the selection vanished, fall back to the first row.
    let generation = sync.generation();
    sync.apply(SyncEvent::Page {
        generation,
        page: IssuePage {
            issues: vec![issue("x"), issue("y")],
            end_cursor: None,
            has_more: false,
        },
        number: 1,
        fetched: 2,
    });
    assert_eq!(sync.selected().map(|i| i.id.as_str()), Some("x"));
}

#[test]
fn tracker_last_selected_wins() {
    let mut tracker = SelectionTracker::default();
    tracker.begin_fetch(issue("a"));
    tracker.begin_fetch(issue("b"));

    assert!(!tracker.complete_fetch("a", detailed("a")));
    assert_eq!(tracker.selected_id(), Some("b"));

    assert!(tracker.complete_fetch("b", detailed("b")));
    assert!(!tracker.is_fetching());

    tracker.clear();
    assert!(tracker.selected().is_none());
}
