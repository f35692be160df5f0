//! The materialized slice of the record feed.
//!
//! `FeedWindow` is a cache: the store stays the source of truth. Every
//! mutation keeps the records strictly ordered by `(updated_at, id)`
//! descending with no duplicate ids. Rows that would break the order are
//! dropped with a warning.

use crate::store::{Record, Watermark};
use std::collections::HashSet;

/// One page as returned by the store, already split into the records to keep
/// and whether the feed has more after them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<Record>,
    pub exhausted: bool,
}

impl Page {
    /// Interpret a store response to a cursor that asked for `page_size + 1`
    /// rows. The lookahead row is dropped.
    pub fn from_lookahead(mut records: Vec<Record>, page_size: usize) -> Self {
        let exhausted = records.len() <= page_size;
        records.truncate(page_size);
        Self { records, exhausted }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedWindow {
    records: Vec<Record>,
    ids: HashSet<i64>,
    exhausted: bool,
    /// Bumped whenever the window is replaced or cleared, so results of page
    /// loads issued against an older window can be told apart.
    epoch: u64,
}

impl FeedWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn head_id(&self) -> Option<i64> {
        self.records.first().map(|r| r.id)
    }

    /// Watermark for the next page: the key of the last record.
    pub fn tail_watermark(&self) -> Option<Watermark> {
        self.records.last().map(Record::watermark)
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: i64) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Replace every record with `page`.
    pub fn replace(&mut self, page: Page) {
        self.epoch = self.epoch.wrapping_add(1);
        self.records.clear();
        self.ids.clear();
        self.exhausted = page.exhausted;
        self.extend_ordered(page.records);
    }

    /// Append a page to the tail. Returns how many records were added.
    pub fn append(&mut self, page: Page) -> usize {
        let before = self.records.len();
        self.extend_ordered(page.records);
        if page.exhausted {
            self.exhausted = true;
        }
        self.records.len() - before
    }

    /// Apply `patch` to the record with `id` in place. Position and every other
    /// record are untouched. Returns false when the id is not materialized.
    pub fn patch(&mut self, id: i64, patch: impl FnOnce(&mut Record)) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                patch(record);
                true
            }
            None => false,
        }
    }

    /// Drop everything, including the exhaustion flag.
    pub fn clear(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.records.clear();
        self.ids.clear();
        self.exhausted = false;
    }

    fn extend_ordered(&mut self, incoming: Vec<Record>) {
        self.records.reserve(incoming.len());
        for record in incoming {
            if let Some(tail) = self.tail_watermark() {
                if !record.is_older_than(tail) {
                    tracing::warn!(
                        id = record.id,
                        updated_at = record.updated_at,
                        tail_id = tail.id,
                        tail_updated_at = tail.updated_at,
                        "Dropping out-of-order or duplicate record"
                    );
                    continue;
                }
            }
            if !self.ids.insert(record.id) {
                tracing::warn!(id = record.id, "Dropping record already in window");
                continue;
            }
            self.records.push(record);
        }
    }
}
