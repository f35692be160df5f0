//! The record store port.
//!
//! The engine never owns persistence. Everything it knows about the clipboard
//! history comes through [`RecordStore`], which the host injects as an
//! `Arc<dyn RecordStore>`. The SQLite implementation in [`crate::storage`] is
//! one such store; tests use small in-process fakes.

use crate::engine::Cursor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures reported by a [`RecordStore`].
///
/// Only `NotFound` carries meaning for the engine; everything else is a
/// transport failure that is surfaced and left for the next trigger to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The record, or the resource behind it, no longer exists.
    #[error("Record {0} no longer exists")]
    NotFound(i64),

    /// The store could not be reached or the request failed.
    #[error("Store request failed: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

// ============================================================================
// Record
// ============================================================================

/// Kind of clipboard payload a record holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Text,
    Image,
    File,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Text => "text",
            RecordKind::Image => "image",
            RecordKind::File => "file",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(RecordKind::Text),
            "image" => Ok(RecordKind::Image),
            "file" => Ok(RecordKind::File),
            other => Err(format!("unknown record kind '{}'", other)),
        }
    }
}

/// Pixel dimensions of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Position of a record in the feed ordering.
///
/// The feed is sorted by `updated_at` descending with ties broken by `id`
/// descending, so a record is "older" than another exactly when its key
/// compares less. A cursor watermark is the key of the last materialized
/// record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark {
    pub updated_at: i64,
    pub id: i64,
}

/// Immutable snapshot of one clipboard history entry.
///
/// Timestamps are unix milliseconds. `soft_deleted` is never read from or
/// written to the store; it only marks entries whose resource vanished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub kind: RecordKind,
    pub value: String,
    pub thumbnail: Option<String>,
    pub size: Option<u64>,
    pub image_dimensions: Option<ImageDimensions>,
    pub created_at: i64,
    pub updated_at: i64,
    pub favorite: bool,
    #[serde(default)]
    pub soft_deleted: bool,
}

impl Record {
    /// Ordering key of this record in the feed.
    pub fn watermark(&self) -> Watermark {
        Watermark {
            updated_at: self.updated_at,
            id: self.id,
        }
    }

    /// True when this record sorts strictly after `watermark` in the feed.
    pub fn is_older_than(&self, watermark: Watermark) -> bool {
        self.watermark() < watermark
    }
}

// ============================================================================
// Store Port
// ============================================================================

/// Query and mutation contract the engine consumes.
///
/// `query_records` must be idempotent and free of side effects: the engine
/// freely re-issues it for head probes and reloads.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return at most `cursor.limit` records matching the cursor's filter,
    /// newest first, strictly older than the watermark when one is set.
    async fn query_records(&self, cursor: &Cursor) -> Result<Vec<Record>, StoreError>;

    /// Flip the persisted favorite flag of a record.
    async fn toggle_favorite(&self, id: i64) -> Result<(), StoreError>;

    /// Perform the "choose" side effect for a record.
    ///
    /// Fails with [`StoreError::NotFound`] when the record or its underlying
    /// resource is gone.
    async fn activate(&self, record: &Record) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, updated_at: i64) -> Record {
        Record {
            id,
            kind: RecordKind::Text,
            value: format!("value {}", id),
            thumbnail: None,
            size: None,
            image_dimensions: None,
            created_at: updated_at,
            updated_at,
            favorite: false,
            soft_deleted: false,
        }
    }

    #[test]
    fn test_older_by_updated_at() {
        let newer = record(1, 2_000);
        let older = record(2, 1_000);
        assert!(older.is_older_than(newer.watermark()));
        assert!(!newer.is_older_than(older.watermark()));
    }

    #[test]
    fn test_ties_broken_by_id_descending() {
        let high = record(9, 1_000);
        let low = record(3, 1_000);
        assert!(low.is_older_than(high.watermark()));
        assert!(!high.is_older_than(low.watermark()));
        assert!(!high.is_older_than(high.watermark()));
    }

    #[test]
    fn test_record_kind_parse() {
        assert_eq!("TEXT".parse::<RecordKind>(), Ok(RecordKind::Text));
        assert_eq!("file".parse::<RecordKind>(), Ok(RecordKind::File));
        assert!("video".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_not_found_is_distinct() {
        assert!(StoreError::NotFound(4).is_not_found());
        assert!(!StoreError::Transport("closed".into()).is_not_found());
    }
}
