use crate::store::{ImageDimensions, Record, RecordKind, StoreError};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has locked the history database
    #[error("The clipboard history database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A stored row could not be decoded
    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Transport(err.to_string())
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// A clipboard capture to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub value: String,
    pub thumbnail: Option<String>,
    pub size: Option<u64>,
    pub image_dimensions: Option<ImageDimensions>,
}

impl NewRecord {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: RecordKind::Text,
            size: Some(value.len() as u64),
            value,
            thumbnail: None,
            image_dimensions: None,
        }
    }

    pub fn file(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            kind: RecordKind::File,
            value: path.into(),
            thumbnail: None,
            size,
            image_dimensions: None,
        }
    }

    pub fn image(
        value: impl Into<String>,
        thumbnail: Option<String>,
        dimensions: ImageDimensions,
    ) -> Self {
        Self {
            kind: RecordKind::Image,
            value: value.into(),
            thumbnail,
            size: None,
            image_dimensions: Some(dimensions),
        }
    }
}

/// Internal row type for record queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecordDbRow {
    pub id: i64,
    pub kind: String,
    pub value: String,
    pub thumbnail: Option<String>,
    pub size: Option<i64>,
    pub image_width: Option<i64>,
    pub image_height: Option<i64>,
    pub favorite: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RecordDbRow {
    pub(crate) fn into_record(self) -> Result<Record, DatabaseError> {
        let kind = self
            .kind
            .parse::<RecordKind>()
            .map_err(|reason| DatabaseError::Corrupt {
                id: self.id,
                reason,
            })?;
        let image_dimensions = match (self.image_width, self.image_height) {
            (Some(width), Some(height)) => Some(ImageDimensions {
                width: u32::try_from(width).unwrap_or(0),
                height: u32::try_from(height).unwrap_or(0),
            }),
            _ => None,
        };
        Ok(Record {
            id: self.id,
            kind,
            value: self.value,
            thumbnail: self.thumbnail,
            size: self.size.and_then(|s| u64::try_from(s).ok()),
            image_dimensions,
            created_at: self.created_at,
            updated_at: self.updated_at,
            favorite: self.favorite,
            soft_deleted: false,
        })
    }
}
