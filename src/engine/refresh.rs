//! Decides whether a re-sync trigger actually needs a full reload.
//!
//! When the view regains focus the engine probes the store for the head
//! record under the active filter. Only a differing head justifies replacing
//! the window; an unchanged head keeps the rendered list and the selection
//! exactly as they are.

use super::cursor::Filter;

/// True when the probed head differs from the materialized head.
///
/// Two absent heads (empty window, empty store) count as fresh.
pub fn should_replace(current_head: Option<i64>, probed_head: Option<i64>) -> bool {
    current_head != probed_head
}

/// Tracks the outstanding head probe.
///
/// A newer probe supersedes an older one by generation; nothing is cancelled.
#[derive(Debug, Default)]
pub struct RefreshDetector {
    generation: u64,
    pending: Option<(u64, Filter)>,
}

impl RefreshDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new probe for `filter` and return its generation tag.
    pub fn begin(&mut self, filter: Filter) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some((self.generation, filter));
        self.generation
    }

    /// Settle the probe tagged `generation`.
    ///
    /// Returns false when a newer probe was issued, the probe was invalidated,
    /// or the probe's filter no longer matches `current`.
    pub fn finish(&mut self, generation: u64, current: &Filter) -> bool {
        match self.pending.take() {
            Some((pending, filter)) if pending == generation => filter == *current,
            other => {
                self.pending = other;
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget any outstanding probe.
    pub fn invalidate(&mut self) {
        self.pending = None;
    }
}
