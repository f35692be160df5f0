//! Selection by record identity.
//!
//! The selected record is tracked by id, never by index, so inserting,
//! appending or patching records cannot silently move the selection to a
//! different entry. Every method that changes the selection returns the index
//! the presentation layer should scroll into view.

use super::window::FeedWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// How to treat the selection after the window was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Keep the id; fall back to the head only when nothing was selected.
    Preserve,
    /// Keep the id if it is still present, otherwise move to the head.
    PreserveOrHead,
    /// Always move to the head.
    ResetToHead,
}

#[derive(Debug, Default)]
pub struct SelectionController {
    selected: Option<i64>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    /// Live index of the selection, if it is still materialized.
    pub fn index_in(&self, window: &FeedWindow) -> Option<usize> {
        self.selected.and_then(|id| window.index_of(id))
    }

    /// Select `id` directly. Ignored when the id is not in the window.
    pub fn select(&mut self, id: i64, window: &FeedWindow) -> Option<usize> {
        let index = window.index_of(id)?;
        self.set(id, index)
    }

    /// Move to the neighbor of the current selection, clamped, no wraparound.
    ///
    /// No-op when nothing is selected or the selected record is gone.
    pub fn move_neighbor(&mut self, direction: Direction, window: &FeedWindow) -> Option<usize> {
        let current = self.index_in(window)?;
        let target = match direction {
            Direction::Prev => current.checked_sub(1)?,
            Direction::Next => current + 1,
        };
        let id = window.records().get(target)?.id;
        self.set(id, target)
    }

    pub fn select_first(&mut self, window: &FeedWindow) -> Option<usize> {
        let id = window.head_id()?;
        self.set(id, 0)
    }

    pub fn select_last(&mut self, window: &FeedWindow) -> Option<usize> {
        let last = window.len().checked_sub(1)?;
        let id = window.records()[last].id;
        self.set(id, last)
    }

    /// Bring the selection in line with a freshly replaced window.
    pub fn reconcile(&mut self, window: &FeedWindow, policy: Reconcile) -> Option<usize> {
        let present = self.selected.is_some_and(|id| window.contains(id));
        let reset = match policy {
            Reconcile::Preserve => self.selected.is_none(),
            Reconcile::PreserveOrHead => !present,
            Reconcile::ResetToHead => true,
        };
        if !reset {
            return None;
        }
        match window.head_id() {
            Some(head) => self.set(head, 0),
            None => {
                self.selected = None;
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    fn set(&mut self, id: i64, index: usize) -> Option<usize> {
        if self.selected == Some(id) {
            return None;
        }
        self.selected = Some(id);
        Some(index)
    }
}
