//! The controller that backs the visible history list.
//!
//! All state lives here and is only touched from the event loop. Every store
//! call runs as a spawned task that reports back through a `FeedEvent`
//! channel, tagged with the generation (and filter or window epoch) it was
//! issued under. Results that no longer match current state are dropped, so
//! nothing ever has to be cancelled at the transport level.

use super::click::{ClickDisambiguator, ClickIntent, CLICK_WINDOW};
use super::cursor::{Cursor, Filter, KindFilter, BASE_PAGE_SIZE, MAX_PAGE_SIZE};
use super::mutation;
use super::pagination::{
    PaginationController, ScrollProximity, LOAD_MORE_THRESHOLD, SCROLL_DEBOUNCE,
};
use super::refresh::{should_replace, RefreshDetector};
use super::search::{SearchController, SEARCH_DEBOUNCE};
use super::selection::{Direction, Reconcile, SelectionController};
use super::window::{FeedWindow, Page};
use crate::store::{Record, RecordStore, StoreError};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Capacity of the completion channel between spawned tasks and the loop.
const EVENT_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// Settings
// ============================================================================

/// Tunables for the engine, usually derived from [`crate::config::Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub page_size: usize,
    pub search_debounce: Duration,
    pub scroll_debounce: Duration,
    pub click_window: Duration,
    pub load_more_threshold: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: BASE_PAGE_SIZE,
            search_debounce: SEARCH_DEBOUNCE,
            scroll_debounce: SCROLL_DEBOUNCE,
            click_window: CLICK_WINDOW,
            load_more_threshold: LOAD_MORE_THRESHOLD,
        }
    }
}

// ============================================================================
// Public Types
// ============================================================================

/// Lifecycle of the window as seen by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Empty,
    Loading,
    Ready,
}

/// What caused a full reload. Decides how the selection is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    Initial,
    FilterChanged,
    Refresh,
    HistoryCleared,
}

impl ReloadReason {
    fn reconcile(self) -> Reconcile {
        match self {
            ReloadReason::Initial | ReloadReason::HistoryCleared => Reconcile::Preserve,
            ReloadReason::FilterChanged => Reconcile::PreserveOrHead,
            ReloadReason::Refresh => Reconcile::ResetToHead,
        }
    }
}

/// External operations the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Reload,
    HeadProbe,
    LoadMore,
    Activate,
    ToggleFavorite,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Reload => "reload",
            Operation::HeadProbe => "head_probe",
            Operation::LoadMore => "load_more",
            Operation::Activate => "activate",
            Operation::ToggleFavorite => "toggle_favorite",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effects requested from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// The selection changed; the element at `index` should be made visible.
    Reveal { id: i64, index: usize },
    /// A record was successfully chosen.
    Activated { id: i64 },
    /// Hide the panel.
    Dismiss,
    /// A store call failed and nothing was recovered locally.
    Failed { operation: Operation, message: String },
}

/// Completion events from spawned store calls.
#[derive(Debug)]
pub enum FeedEvent {
    Reloaded {
        generation: u64,
        filter: Filter,
        reason: ReloadReason,
        result: Result<Vec<Record>, StoreError>,
    },
    HeadProbed {
        generation: u64,
        result: Result<Option<i64>, StoreError>,
    },
    PageLoaded {
        generation: u64,
        epoch: u64,
        result: Result<Vec<Record>, StoreError>,
    },
    Activated {
        id: i64,
        result: Result<(), StoreError>,
    },
    FavoriteToggled {
        id: i64,
        result: Result<(), StoreError>,
    },
    /// A spawned task panicked instead of producing its event.
    TaskPanicked {
        operation: Operation,
        error: String,
    },
}

struct ReloadTicket {
    generation: u64,
    filter: Filter,
}

// ============================================================================
// Controller
// ============================================================================

pub struct FeedController {
    store: Arc<dyn RecordStore>,
    event_tx: mpsc::Sender<FeedEvent>,
    page_size: usize,

    window: FeedWindow,
    /// Filter the current window contents were loaded with.
    window_filter: Filter,
    /// True once the window holds a completed snapshot.
    ready: bool,

    search: SearchController,
    refresh: RefreshDetector,
    pagination: PaginationController,
    selection: SelectionController,
    clicks: ClickDisambiguator,

    reload: Option<ReloadTicket>,
    reload_generation: u64,

    effects: Vec<Effect>,
}

impl FeedController {
    /// Create a controller over `store`. The returned receiver must be
    /// drained into [`handle_event`](Self::handle_event).
    pub fn new(
        store: Arc<dyn RecordStore>,
        settings: EngineSettings,
    ) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let controller = Self {
            store,
            event_tx,
            page_size: settings.page_size.clamp(1, MAX_PAGE_SIZE),
            window: FeedWindow::new(),
            window_filter: Filter::default(),
            ready: false,
            search: SearchController::new(settings.search_debounce),
            refresh: RefreshDetector::new(),
            pagination: PaginationController::new(
                settings.load_more_threshold,
                settings.scroll_debounce,
            ),
            selection: SelectionController::new(),
            clicks: ClickDisambiguator::new(settings.click_window),
            reload: None,
            reload_generation: 0,
            effects: Vec::new(),
        };
        (controller, event_rx)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn window(&self) -> &FeedWindow {
        &self.window
    }

    pub fn records(&self) -> &[Record] {
        self.window.records()
    }

    pub fn state(&self) -> LoadState {
        if self.reload.is_some() {
            LoadState::Loading
        } else if self.ready {
            LoadState::Ready
        } else {
            LoadState::Empty
        }
    }

    pub fn filter(&self) -> &Filter {
        self.search.filter()
    }

    pub fn selected(&self) -> Option<i64> {
        self.selection.selected()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selection.index_in(&self.window)
    }

    pub fn selected_record(&self) -> Option<&Record> {
        self.selected().and_then(|id| self.window.get(id))
    }

    pub fn is_loading_more(&self) -> bool {
        self.pagination.is_loading()
    }

    /// Take every effect queued since the last call.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Earliest pending debounce or click deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.search.deadline(),
            self.pagination.deadline(),
            self.clicks.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    /// Issue the first load under the current filter.
    pub fn start(&mut self) {
        let filter = self.search.filter().clone();
        self.request_reload(filter, ReloadReason::Initial);
    }

    /// Update the filter; the reload follows after the search quiet period.
    pub fn set_filter(&mut self, keyword: &str, kind: KindFilter) {
        self.search.set_filter(keyword, kind, Instant::now());
    }

    /// Re-sync trigger: probe the head before deciding to reload.
    pub fn focus_regained(&mut self) {
        if self.reload.is_some() {
            tracing::debug!("Focus regained during reload, skipping head probe");
            return;
        }
        let filter = self.search.filter().clone();
        let cursor = Cursor::head_probe(&filter);
        let generation = self.refresh.begin(filter);
        let store = Arc::clone(&self.store);

        tracing::debug!(generation, "Probing feed head");
        self.spawn(Operation::HeadProbe, async move {
            let result = store
                .query_records(&cursor)
                .await
                .map(|records| records.first().map(|r| r.id));
            FeedEvent::HeadProbed { generation, result }
        });
    }

    /// Scroll position changed; arms the debounced page load near the tail.
    pub fn scrolled(&mut self, proximity: ScrollProximity) {
        self.pagination.maybe_load_more(proximity, Instant::now());
    }

    /// Ask for the next page without waiting for a scroll debounce.
    pub fn load_more_now(&mut self) {
        self.pagination.arm_now(Instant::now());
        self.tick();
    }

    /// Fire every deadline that has passed.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if let Some(filter) = self.search.poll(now) {
            self.request_reload(filter, ReloadReason::FilterChanged);
        }
        if self.pagination.poll(now) {
            self.load_more();
        }
        if let Some(intent) = self.clicks.poll(now) {
            self.apply_click(intent);
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Raw pointer press on a record.
    pub fn press(&mut self, id: i64) {
        let now = Instant::now();
        if let Some(intent) = self.clicks.poll(now) {
            self.apply_click(intent);
        }
        if let Some(intent) = self.clicks.press(id, now) {
            self.apply_click(intent);
        }
    }

    pub fn select(&mut self, id: i64) {
        let index = self.selection.select(id, &self.window);
        self.reveal(index);
    }

    pub fn move_selection(&mut self, direction: Direction) {
        let index = self.selection.move_neighbor(direction, &self.window);
        self.reveal(index);
    }

    pub fn select_first(&mut self) {
        let index = self.selection.select_first(&self.window);
        self.reveal(index);
    }

    pub fn select_last(&mut self) {
        let index = self.selection.select_last(&self.window);
        self.reveal(index);
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Flip the favorite flag locally and persist it in the background.
    pub fn toggle_favorite(&mut self, id: i64) {
        match mutation::apply_favorite_toggle(&mut self.window, id) {
            Some(favorite) => tracing::debug!(id, favorite, "Favorite toggled optimistically"),
            None => tracing::debug!(id, "Favorite toggled for record outside the window"),
        }
        let store = Arc::clone(&self.store);
        self.spawn(Operation::ToggleFavorite, async move {
            let result = store.toggle_favorite(id).await;
            FeedEvent::FavoriteToggled { id, result }
        });
    }

    pub fn toggle_favorite_selected(&mut self) {
        if let Some(id) = self.selected() {
            self.toggle_favorite(id);
        }
    }

    /// Choose a record. Soft-deleted records are refused.
    pub fn activate(&mut self, id: i64) {
        let Some(record) = self.window.get(id).cloned() else {
            tracing::debug!(id, "Activate ignored, record not in window");
            return;
        };
        if record.soft_deleted {
            tracing::debug!(id, "Activate ignored, record marked missing");
            return;
        }
        let store = Arc::clone(&self.store);
        self.spawn(Operation::Activate, async move {
            let result = store.activate(&record).await;
            FeedEvent::Activated { id, result }
        });
    }

    pub fn activate_selected(&mut self) {
        if let Some(id) = self.selected() {
            self.activate(id);
        }
    }

    /// Explicit cancel key: hide the panel.
    pub fn cancel(&mut self) {
        self.clicks.reset();
        self.effects.push(Effect::Dismiss);
    }

    /// The store was wiped. Drop all local state and reload from empty.
    pub fn history_cleared(&mut self) {
        tracing::info!(
            records = self.window.len(),
            "History cleared, discarding feed window"
        );
        self.window.clear();
        self.ready = false;
        self.selection.clear();
        self.clicks.reset();
        self.pagination.reset();
        self.refresh.invalidate();
        self.reload = None;

        let filter = self.search.filter().clone();
        self.request_reload(filter, ReloadReason::HistoryCleared);
    }

    // ========================================================================
    // Event Handling
    // ========================================================================

    pub fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Reloaded {
                generation,
                filter,
                reason,
                result,
            } => self.on_reloaded(generation, filter, reason, result),
            FeedEvent::HeadProbed { generation, result } => {
                self.on_head_probed(generation, result)
            }
            FeedEvent::PageLoaded {
                generation,
                epoch,
                result,
            } => self.on_page_loaded(generation, epoch, result),
            FeedEvent::Activated { id, result } => self.on_activated(id, result),
            FeedEvent::FavoriteToggled { id, result } => match result {
                Ok(()) => tracing::debug!(id, "Favorite persisted"),
                Err(e) => tracing::warn!(id, error = %e, "Failed to persist favorite toggle"),
            },
            FeedEvent::TaskPanicked { operation, error } => self.on_task_panicked(operation, error),
        }
    }

    fn on_reloaded(
        &mut self,
        generation: u64,
        filter: Filter,
        reason: ReloadReason,
        result: Result<Vec<Record>, StoreError>,
    ) {
        if !matches!(&self.reload, Some(ticket) if ticket.generation == generation) {
            tracing::debug!(
                expected = self.reload_generation,
                got = generation,
                "Ignoring stale reload (generation mismatch)"
            );
            return;
        }
        self.reload = None;

        if filter != *self.search.filter() {
            tracing::debug!(
                keyword = ?filter.keyword(),
                kind = %filter.kind(),
                "Ignoring reload for superseded filter"
            );
            return;
        }

        match result {
            Ok(records) => {
                let page = Page::from_lookahead(records, self.page_size);
                let exhausted = page.exhausted;
                self.window.replace(page);
                self.window_filter = filter;
                self.ready = true;
                self.pagination.reset();
                let index = self.selection.reconcile(&self.window, reason.reconcile());
                self.reveal(index);
                tracing::debug!(
                    ?reason,
                    count = self.window.len(),
                    exhausted,
                    "Feed window replaced"
                );
            }
            Err(e) => {
                tracing::warn!(?reason, error = %e, "Reload failed");
                self.fail(Operation::Reload, e.to_string());
            }
        }
    }

    fn on_head_probed(&mut self, generation: u64, result: Result<Option<i64>, StoreError>) {
        if !self.refresh.finish(generation, self.search.filter()) {
            tracing::debug!(generation, "Ignoring stale head probe");
            return;
        }
        match result {
            Ok(probed) => {
                let current = self.window.head_id();
                let filter = self.search.filter().clone();
                // A window that never loaded has nothing to keep.
                if !self.ready || should_replace(current, probed) || filter != self.window_filter {
                    tracing::debug!(?current, ?probed, "Feed head changed, reloading");
                    self.request_reload(filter, ReloadReason::Refresh);
                } else {
                    tracing::debug!(?current, "Feed head unchanged, keeping window");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Head probe failed");
                self.fail(Operation::HeadProbe, e.to_string());
            }
        }
    }

    fn on_page_loaded(
        &mut self,
        generation: u64,
        epoch: u64,
        result: Result<Vec<Record>, StoreError>,
    ) {
        if !self.pagination.finish(generation) || epoch != self.window.epoch() {
            tracing::debug!(generation, epoch, "Ignoring page for replaced window");
            return;
        }
        match result {
            Ok(records) => {
                let page = Page::from_lookahead(records, self.page_size);
                let exhausted = page.exhausted;
                let added = self.window.append(page);
                tracing::debug!(added, exhausted, total = self.window.len(), "Page appended");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Page load failed");
                self.fail(Operation::LoadMore, e.to_string());
            }
        }
    }

    fn on_activated(&mut self, id: i64, result: Result<(), StoreError>) {
        match result {
            Ok(()) => {
                tracing::info!(id, "Record activated");
                self.effects.push(Effect::Activated { id });
                self.effects.push(Effect::Dismiss);
            }
            Err(e) if e.is_not_found() => {
                let marked = mutation::mark_soft_deleted(&mut self.window, id);
                tracing::info!(id, marked, "Record resource missing, marked soft-deleted");
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "Activation failed");
                self.fail(Operation::Activate, e.to_string());
            }
        }
    }

    fn on_task_panicked(&mut self, operation: Operation, error: String) {
        tracing::error!(task = %operation, error = %error, "Background task panicked");
        match operation {
            Operation::Reload => self.reload = None,
            Operation::HeadProbe => self.refresh.invalidate(),
            Operation::LoadMore => self.pagination.reset(),
            Operation::Activate => {}
            Operation::ToggleFavorite => return,
        }
        self.fail(operation, format!("internal error: {}", error));
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn request_reload(&mut self, filter: Filter, reason: ReloadReason) {
        if let Some(ticket) = &self.reload {
            if ticket.filter == filter {
                tracing::debug!(
                    generation = ticket.generation,
                    ?reason,
                    "Reload already in flight for this filter, coalescing"
                );
                return;
            }
        }

        self.reload_generation = self.reload_generation.wrapping_add(1);
        let generation = self.reload_generation;
        self.reload = Some(ReloadTicket {
            generation,
            filter: filter.clone(),
        });

        let cursor = Cursor::first_page(&filter, self.page_size);
        let store = Arc::clone(&self.store);
        tracing::debug!(generation, ?reason, "Spawning full reload");
        self.spawn(Operation::Reload, async move {
            let result = store.query_records(&cursor).await;
            FeedEvent::Reloaded {
                generation,
                filter,
                reason,
                result,
            }
        });
    }

    fn load_more(&mut self) {
        if let Err(skip) = self.pagination.check(&self.window) {
            tracing::debug!(?skip, "Load more skipped");
            return;
        }
        let Some(watermark) = self.window.tail_watermark() else {
            return;
        };
        let cursor = Cursor::next_page(&self.window_filter, self.page_size, watermark);
        let generation = self.pagination.begin();
        let epoch = self.window.epoch();
        let store = Arc::clone(&self.store);

        tracing::debug!(generation, ?watermark, "Spawning page load");
        self.spawn(Operation::LoadMore, async move {
            let result = store.query_records(&cursor).await;
            FeedEvent::PageLoaded {
                generation,
                epoch,
                result,
            }
        });
    }

    fn apply_click(&mut self, intent: ClickIntent) {
        match intent {
            ClickIntent::Select(id) => self.select(id),
            ClickIntent::Activate(id) => self.activate(id),
        }
    }

    fn reveal(&mut self, index: Option<usize>) {
        let Some(index) = index else {
            return;
        };
        if let Some(record) = self.window.records().get(index) {
            self.effects.push(Effect::Reveal {
                id: record.id,
                index,
            });
        }
    }

    fn fail(&mut self, operation: Operation, message: String) {
        self.effects.push(Effect::Failed { operation, message });
    }

    fn spawn<F>(&self, operation: Operation, task: F)
    where
        F: Future<Output = FeedEvent> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match catch_task_panic(task).await {
                Ok(event) => event,
                Err(error) => FeedEvent::TaskPanicked { operation, error },
            };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(error = %e, task = %operation, "Channel send failed (receiver dropped)");
            }
        });
    }
}

/// Run `future`, turning a panic into its message.
async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(future).catch_unwind().await.map_err(|panic| {
        if let Some(s) = panic.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        }
    })
}
