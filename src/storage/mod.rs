mod records;
mod schema;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, NewRecord};

use crate::engine::Cursor;
use crate::store::{Record, RecordKind, RecordStore, StoreError};
use async_trait::async_trait;

#[async_trait]
impl RecordStore for Database {
    async fn query_records(&self, cursor: &Cursor) -> Result<Vec<Record>, StoreError> {
        Ok(Database::query_records(self, cursor).await?)
    }

    async fn toggle_favorite(&self, id: i64) -> Result<(), StoreError> {
        match Database::toggle_favorite(self, id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// A record can be chosen while its row exists and, for files, while the
    /// path is still on disk.
    async fn activate(&self, record: &Record) -> Result<(), StoreError> {
        let stored = self
            .get_record(record.id)
            .await?
            .ok_or(StoreError::NotFound(record.id))?;

        if stored.kind == RecordKind::File {
            let exists = tokio::fs::try_exists(&stored.value).await.unwrap_or(false);
            if !exists {
                tracing::debug!(id = stored.id, path = %stored.value, "File behind record is gone");
                return Err(StoreError::NotFound(stored.id));
            }
        }
        Ok(())
    }
}
