//! Incremental feed and selection engine.
//!
//! Presents a reverse-chronological, filterable, incrementally loaded window
//! over the record store and keeps the user's selection stable across
//! reloads, appends and in-place patches.

mod click;
mod controller;
mod cursor;
mod mutation;
mod pagination;
mod refresh;
mod runner;
mod search;
mod selection;
mod window;

pub use click::{ClickDisambiguator, ClickIntent, CLICK_WINDOW};
pub use controller::{
    EngineSettings, Effect, FeedController, FeedEvent, LoadState, Operation, ReloadReason,
};
pub use cursor::{Cursor, Filter, KindFilter, BASE_PAGE_SIZE, MAX_PAGE_SIZE};
pub use mutation::{apply_favorite_toggle, mark_soft_deleted};
pub use pagination::{
    LoadSkip, PaginationController, ScrollProximity, LOAD_MORE_THRESHOLD, SCROLL_DEBOUNCE,
};
pub use refresh::{should_replace, RefreshDetector};
pub use runner::{apply_input, run, Action, FeedInput, Presenter};
pub use search::{SearchController, SEARCH_DEBOUNCE};
pub use selection::{Direction, Reconcile, SelectionController};
pub use window::{FeedWindow, Page};
