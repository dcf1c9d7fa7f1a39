//! Issue synchronization controller.
//!
//! Owns the authoritative in-memory record set and orchestrates paginated
//! fetches against the tracker API while staying correct under concurrent
//! triggers: user refresh, filter/sort/search changes, and detail-on-select
//! fetches. Three properties hold at all times:
//!
//! - at most one fetch loop is live; a refresh requested while busy lands
//!   in a single pending slot (last writer wins),
//! - a newer request always supersedes a stale one via a monotonic
//!   generation counter checked before every merge,
//! - pages merge idempotently by id, and derived rows/partitions are
//!   recomputed wholesale off the interactive path and handed to the UI
//!   thread over an mpsc channel.
//!
//! Cancellation is cooperative: a superseded loop finishes the page fetch
//! already in flight, observes the generation mismatch, and exits without
//! side effects.

use crate::data::partition::partition_by_assignee;
use crate::data::tree::{self, Row};
use crate::data::{FetchParams, Issue, IssuePage, SortField};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Page fetch boundary: params + optional cursor to one page of issues.
///
/// A boxed closure rather than a trait so tests can swap in scripted
/// fetchers the same way the production client is wired in.
pub type PageFetcher =
    Arc<dyn Fn(FetchParams, Option<String>) -> BoxFuture<'static, Result<IssuePage>> + Send + Sync>;

/// Detail fetch boundary: issue id to the full record (with comments).
pub type DetailFetcher =
    Arc<dyn Fn(String) -> BoxFuture<'static, Result<Issue>> + Send + Sync>;

/// Result from a background fetch task, applied on the UI thread.
#[derive(Debug)]
pub enum SyncEvent {
    /// One fetched page. `number` is 1-based within the refresh.
    Page {
        generation: u64,
        page: IssuePage,
        number: usize,
        fetched: usize,
    },
    /// A page fetch failed; pagination stops after this.
    PageError {
        generation: u64,
        first_page: bool,
        message: String,
    },
    /// The fetch loop exited (success, error, or preemption).
    Finished { generation: u64 },
    /// A detail fetch completed for `id`.
    Detail {
        id: String,
        result: Result<Issue, String>,
    },
}

/// Controller status surfaced to the status bar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Loading {
        page: usize,
        fetched: usize,
    },
    Error(String),
}

/// The single most-recent refresh request stored while a fetch is in
/// flight. A new request while busy overwrites this slot.
#[derive(Debug, Clone)]
struct PendingRefresh {
    params: FetchParams,
    target_id: Option<String>,
    shift_focus: bool,
}

/// Tracks which record is being detail-fetched so that out-of-order
/// completions never clobber a newer selection.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    fetching: Option<String>,
    selected: Option<Issue>,
}

impl SelectionTracker {
    /// Record `provisional` (the list-derived issue) as the selection and
    /// note that its detail fetch is in flight.
    pub fn begin_fetch(&mut self, provisional: Issue) {
        self.fetching = Some(provisional.id.clone());
        self.selected = Some(provisional);
    }

    /// Apply a completed detail fetch. Returns false (and leaves all state
    /// untouched) if a newer selection superseded this fetch.
    pub fn complete_fetch(&mut self, id: &str, issue: Issue) -> bool {
        if self.fetching.as_deref() != Some(id) {
            return false;
        }
        self.fetching = None;
        self.selected = Some(issue);
        true
    }

    /// Acknowledge a failed detail fetch, keeping the provisional
    /// selection. Returns false if the fetch was already superseded.
    pub fn fail_fetch(&mut self, id: &str) -> bool {
        if self.fetching.as_deref() != Some(id) {
            return false;
        }
        self.fetching = None;
        true
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.is_some()
    }

    pub fn selected(&self) -> Option<&Issue> {
        self.selected.as_ref()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_ref().map(|i| i.id.as_str())
    }

    pub fn clear(&mut self) {
        self.fetching = None;
        self.selected = None;
    }
}

/// Synchronization controller. Owned by the UI thread; background tasks
/// never touch it directly, they send [`SyncEvent`]s instead.
pub struct SyncController {
    fetch_page: PageFetcher,
    fetch_detail: DetailFetcher,

    owner_id: String,
    issues: Vec<Issue>,
    index: HashMap<String, usize>,
    expanded: HashMap<String, bool>,

    generation: Arc<AtomicU64>,
    busy: bool,
    pending: Option<PendingRefresh>,
    params: FetchParams,
    refresh_target: Option<String>,
    shift_focus: bool,
    focus_request: bool,

    selection: SelectionTracker,
    status: SyncStatus,
    has_more: bool,
    last_refresh: Option<DateTime<Utc>>,

    mine_rows: Vec<Row>,
    other_rows: Vec<Row>,

    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: mpsc::Receiver<SyncEvent>,
}

impl SyncController {
    pub fn new(fetch_page: PageFetcher, fetch_detail: DetailFetcher) -> Self {
        let (events_tx, events_rx) = mpsc::channel(100);
        Self {
            fetch_page,
            fetch_detail,
            owner_id: String::new(),
            issues: Vec::new(),
            index: HashMap::new(),
            expanded: HashMap::new(),
            generation: Arc::new(AtomicU64::new(0)),
            busy: false,
            pending: None,
            params: FetchParams::default(),
            refresh_target: None,
            shift_focus: false,
            focus_request: false,
            selection: SelectionTracker::default(),
            status: SyncStatus::Idle,
            has_more: false,
            last_refresh: None,
            mine_rows: Vec::new(),
            other_rows: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh orchestration
    // ─────────────────────────────────────────────────────────────────────

    /// Request a refresh with the given parameters.
    ///
    /// If a fetch loop is already running, the request lands in the single
    /// pending slot (overwriting any previous one) and the generation is
    /// bumped so the in-flight loop stops paginating. Otherwise the
    /// generation is bumped and a new sequential fetch loop is spawned.
    pub fn request_refresh(
        &mut self,
        params: FetchParams,
        target_id: Option<String>,
        shift_focus: bool,
    ) {
        if self.busy {
            tracing::debug!(target_id = ?target_id, "sync: queueing refresh while busy");
            self.pending = Some(PendingRefresh {
                params,
                target_id,
                shift_focus,
            });
            // Preempt the in-flight loop at its next generation check.
            self.generation.fetch_add(1, Ordering::SeqCst);
            return;
        }

        self.busy = true;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.params = params.clone();
        self.refresh_target = target_id;
        self.shift_focus = shift_focus;
        self.status = SyncStatus::Loading {
            page: 0,
            fetched: 0,
        };
        tracing::debug!(
            generation,
            search = %params.search,
            order_by = ?params.order_by,
            "sync: starting refresh"
        );

        let fetch = Arc::clone(&self.fetch_page);
        let counter = Arc::clone(&self.generation);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let mut cursor: Option<String> = None;
            let mut number = 0usize;
            let mut fetched = 0usize;

            loop {
                let result = (fetch)(params.clone(), cursor.clone()).await;
                if counter.load(Ordering::SeqCst) != generation {
                    // Superseded while the request was in flight; the page
                    // (or error) is abandoned without side effects.
                    tracing::debug!(generation, "sync: fetch loop preempted");
                    break;
                }
                match result {
                    Ok(page) => {
                        number += 1;
                        fetched += page.issues.len();
                        let has_more = page.has_more;
                        cursor = page.end_cursor.clone();
                        crate::util::send_or_log(
                            &tx,
                            SyncEvent::Page {
                                generation,
                                page,
                                number,
                                fetched,
                            },
                            "sync page",
                        )
                        .await;
                        if !has_more {
                            break;
                        }
                    }
                    Err(err) => {
                        crate::util::send_or_log(
                            &tx,
                            SyncEvent::PageError {
                                generation,
                                first_page: number == 0,
                                message: err.to_string(),
                            },
                            "sync page error",
                        )
                        .await;
                        break;
                    }
                }
            }

            crate::util::send_or_log(&tx, SyncEvent::Finished { generation }, "sync finished")
                .await;
        });
    }

    /// Drain and apply all pending events without blocking. Returns the
    /// number of applied events that published a new snapshot.
    pub fn poll(&mut self) -> usize {
        let mut published = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.apply(event) {
                published += 1;
            }
        }
        published
    }

    /// Await the next event from the background tasks.
    pub async fn recv_event(&mut self) -> Option<SyncEvent> {
        self.events_rx.recv().await
    }

    /// Apply one event to the authoritative state. Returns true when the
    /// event published a new rows/partitions/selection/status snapshot;
    /// stale results and loop bookkeeping return false.
    pub fn apply(&mut self, event: SyncEvent) -> bool {
        match event {
            SyncEvent::Page {
                generation,
                page,
                number,
                fetched,
            } => {
                if generation != self.generation.load(Ordering::SeqCst) {
                    tracing::debug!(generation, "sync: discarding stale page");
                    return false;
                }
                let first = number == 1;
                if first {
                    self.issues = page.issues;
                } else {
                    self.merge_unseen(page.issues);
                }
                if self.params.order_by == SortField::Priority {
                    sort_issues_by_priority(&mut self.issues);
                }
                self.reindex();
                self.has_more = page.has_more;
                self.status = SyncStatus::Loading {
                    page: number,
                    fetched,
                };
                self.rebuild();
                tracing::debug!(generation, page = number, fetched, "sync: merged page");

                if first {
                    let target = self
                        .refresh_target
                        .take()
                        .or_else(|| self.selection.selected_id().map(str::to_string));
                    self.resolve_selection(target);
                    if self.shift_focus {
                        self.focus_request = true;
                    }
                }
                true
            }
            SyncEvent::PageError {
                generation,
                first_page,
                message,
            } => {
                if generation != self.generation.load(Ordering::SeqCst) {
                    tracing::debug!(generation, "sync: discarding stale fetch error");
                    return false;
                }
                tracing::error!(generation, first_page, %message, "sync: page fetch failed");
                // First-page failures leave the record set untouched; later
                // failures keep the pages already merged.
                self.status = SyncStatus::Error(message);
                true
            }
            SyncEvent::Finished { generation } => {
                if !self.busy {
                    return false;
                }
                tracing::debug!(generation, "sync: fetch loop finished");
                self.busy = false;
                if matches!(self.status, SyncStatus::Loading { .. }) {
                    self.status = SyncStatus::Idle;
                    self.last_refresh = Some(Utc::now());
                }
                if let Some(pending) = self.pending.take() {
                    self.request_refresh(pending.params, pending.target_id, pending.shift_focus);
                }
                false
            }
            SyncEvent::Detail { id, result } => match result {
                Ok(issue) => {
                    let applied = self.selection.complete_fetch(&id, issue);
                    if !applied {
                        tracing::debug!(%id, "sync: discarding superseded detail fetch");
                    }
                    applied
                }
                Err(message) => {
                    if self.selection.fail_fetch(&id) {
                        tracing::error!(%id, %message, "sync: detail fetch failed");
                        self.status = SyncStatus::Error(message);
                        true
                    } else {
                        false
                    }
                }
            },
        }
    }

    /// Hard context reset: clear all shared state and invalidate any
    /// in-flight work. The generation never resets, it only increases.
    pub fn reset(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.issues.clear();
        self.index.clear();
        self.expanded.clear();
        self.pending = None;
        self.refresh_target = None;
        self.selection.clear();
        self.has_more = false;
        self.status = SyncStatus::Idle;
        self.rebuild();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Selection
    // ─────────────────────────────────────────────────────────────────────

    /// Select an issue: publish its list-derived version immediately as the
    /// provisional selection and fetch the full record in the background.
    /// Returns false if the id is not in the record set.
    pub fn select(&mut self, id: &str) -> bool {
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        let provisional = self.issues[i].clone();
        tracing::debug!(identifier = %provisional.identifier, "sync: issue selected");
        self.selection.begin_fetch(provisional);

        let fetch = Arc::clone(&self.fetch_detail);
        let tx = self.events_tx.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            let result = (fetch)(id.clone()).await.map_err(|e| e.to_string());
            crate::util::send_or_log(&tx, SyncEvent::Detail { id, result }, "detail result").await;
        });
        true
    }

    /// Pick the post-refresh selection: the requested target if present,
    /// else the first row of "mine", else the first row of "other".
    fn resolve_selection(&mut self, target: Option<String>) {
        let chosen = target
            .filter(|id| self.index.contains_key(id))
            .or_else(|| self.first_selectable_id());
        match chosen {
            Some(id) => {
                self.select(&id);
            }
            None => self.selection.clear(),
        }
    }

    fn first_selectable_id(&self) -> Option<String> {
        self.mine_rows
            .iter()
            .chain(self.other_rows.iter())
            .find(|row| self.index.contains_key(&row.id))
            .map(|row| row.id.clone())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expansion
    // ─────────────────────────────────────────────────────────────────────

    /// Toggle expand/collapse for one issue. A no-op (no re-derive, no
    /// publish) when the issue has no children or is not in the set.
    pub fn toggle_expanded(&mut self, id: &str) -> bool {
        let Some(&i) = self.index.get(id) else {
            tracing::debug!(%id, "sync: toggle on unknown issue");
            return false;
        };
        if self.issues[i].children.is_empty() {
            return false;
        }
        tree::toggle_expanded(&mut self.expanded, id);
        self.rebuild();
        true
    }

    pub fn expand_all(&mut self) {
        tree::expand_all(&mut self.expanded, &self.issues);
        self.rebuild();
    }

    pub fn collapse_all(&mut self) {
        tree::collapse_all(&mut self.expanded);
        self.rebuild();
    }

    /// Change the owner identity used for the mine/other partition.
    /// Re-derives synchronously; no network call.
    pub fn set_owner(&mut self, owner_id: impl Into<String>) {
        let owner_id = owner_id.into();
        if owner_id == self.owner_id {
            return;
        }
        self.owner_id = owner_id;
        self.rebuild();
    }

    // ─────────────────────────────────────────────────────────────────────
    // Derivation
    // ─────────────────────────────────────────────────────────────────────

    fn merge_unseen(&mut self, new_issues: Vec<Issue>) {
        let mut seen: std::collections::HashSet<String> =
            self.issues.iter().map(|i| i.id.clone()).collect();
        for issue in new_issues {
            if seen.insert(issue.id.clone()) {
                self.issues.push(issue);
            }
        }
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, issue) in self.issues.iter().enumerate() {
            self.index.entry(issue.id.clone()).or_insert(i);
        }
    }

    fn rebuild(&mut self) {
        let (mine, other) = partition_by_assignee(&self.issues, &self.owner_id);
        let (mine_rows, _) = tree::build_rows(&mine, &self.expanded);
        let (other_rows, _) = tree::build_rows(&other, &self.expanded);
        self.mine_rows = mine_rows;
        self.other_rows = other_rows;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Snapshot accessors (valid until the next publish)
    // ─────────────────────────────────────────────────────────────────────

    pub fn mine_rows(&self) -> &[Row] {
        &self.mine_rows
    }

    pub fn other_rows(&self) -> &[Row] {
        &self.other_rows
    }

    pub fn selected(&self) -> Option<&Issue> {
        self.selection.selected()
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.index.get(id).map(|&i| &self.issues[i])
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn params(&self) -> &FetchParams {
        &self.params
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        tree::is_expanded(&self.expanded, id)
    }

    /// Whether the last applied first page asked the UI to move focus to
    /// the issue list. Reading clears the flag.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_request)
    }
}

/// Client-side priority sort: no-priority (0) sorts after Low.
fn sort_issues_by_priority(issues: &mut [Issue]) {
    issues.sort_by_key(|issue| issue.priority.sort_order());
}
