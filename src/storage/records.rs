use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{DatabaseError, NewRecord, RecordDbRow};
use crate::engine::{Cursor, MAX_PAGE_SIZE};
use crate::store::Record;

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of records returned from any single query (OOM protection)
const MAX_RECORDS: i64 = 2000;

// A full engine page plus its lookahead row must fit under the cap.
const _: () = assert!(MAX_PAGE_SIZE < MAX_RECORDS as usize);

const RECORD_COLUMNS: &str = "id, kind, value, thumbnail, size, image_width, image_height, \
                              favorite, created_at, updated_at";

/// Escape LIKE metacharacters so the keyword matches literally.
fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Database {
    // ========================================================================
    // Record Mutations
    // ========================================================================

    /// Store a clipboard capture, returning its id.
    ///
    /// Copying the same value again does not create a second row: the
    /// existing record is moved to the head instead. Timestamps are kept
    /// strictly increasing so the latest capture is always the feed head,
    /// even when two land within the same millisecond.
    pub async fn add_record(&self, record: &NewRecord) -> Result<i64, DatabaseError> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let existing: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM records
            WHERE kind = ? AND value = ?
            ORDER BY updated_at DESC, id DESC
            LIMIT 1
        "#,
        )
        .bind(record.kind.as_str())
        .bind(&record.value)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match existing {
            Some((id,)) => {
                sqlx::query(
                    r#"
                    UPDATE records
                    SET updated_at = MAX(?, (SELECT COALESCE(MAX(updated_at), 0) + 1 FROM records))
                    WHERE id = ?
                "#,
                )
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                tracing::debug!(id, kind = %record.kind, "Duplicate capture moved to head");
                id
            }
            None => {
                let size = record.size.and_then(|s| i64::try_from(s).ok());
                let (width, height) = match record.image_dimensions {
                    Some(d) => (Some(i64::from(d.width)), Some(i64::from(d.height))),
                    None => (None, None),
                };
                let (id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO records
                        (kind, value, thumbnail, size, image_width, image_height,
                         favorite, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, 0, ?,
                            MAX(?, (SELECT COALESCE(MAX(updated_at), 0) + 1 FROM records)))
                    RETURNING id
                "#,
                )
                .bind(record.kind.as_str())
                .bind(&record.value)
                .bind(&record.thumbnail)
                .bind(size)
                .bind(width)
                .bind(height)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                tracing::debug!(id, kind = %record.kind, "Record inserted");
                id
            }
        };

        tx.commit().await?;
        Ok(id)
    }

    /// Atomically toggle the favorite flag, returning the new value, or
    /// `None` when the record does not exist.
    pub async fn toggle_favorite(&self, id: i64) -> Result<Option<bool>, DatabaseError> {
        let result: Option<(bool,)> =
            sqlx::query_as("UPDATE records SET favorite = NOT favorite WHERE id = ? RETURNING favorite")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(result.map(|(favorite,)| favorite))
    }

    /// Delete every record except the most recent one, returning how many
    /// were removed.
    pub async fn clear_history(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            DELETE FROM records WHERE id NOT IN (
                SELECT id FROM records
                ORDER BY updated_at DESC, id DESC
                LIMIT 1
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!(removed = result.rows_affected(), "History cleared");
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Record Queries
    // ========================================================================

    /// One page of the feed for `cursor`, newest first.
    ///
    /// Order is `(updated_at, id)` descending, and the watermark excludes
    /// everything not strictly older than it, so consecutive pages never
    /// overlap or skip records that share a timestamp.
    pub async fn query_records(&self, cursor: &Cursor) -> Result<Vec<Record>, DatabaseError> {
        let limit = i64::try_from(cursor.limit)
            .unwrap_or(MAX_RECORDS)
            .min(MAX_RECORDS);

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("SELECT ");
        builder.push(RECORD_COLUMNS);
        builder.push(" FROM records WHERE 1 = 1");

        if let Some(keyword) = &cursor.keyword {
            builder
                .push(" AND kind IN ('text', 'file') AND value LIKE ")
                .push_bind(format!("%{}%", escape_like(keyword)))
                .push(" ESCAPE '\\'");
        }
        if let Some(kind) = cursor.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if cursor.favorite_only {
            builder.push(" AND favorite = 1");
        }
        if let Some(watermark) = cursor.watermark {
            builder
                .push(" AND (updated_at < ")
                .push_bind(watermark.updated_at)
                .push(" OR (updated_at = ")
                .push_bind(watermark.updated_at)
                .push(" AND id < ")
                .push_bind(watermark.id)
                .push("))");
        }
        builder
            .push(" ORDER BY updated_at DESC, id DESC LIMIT ")
            .push_bind(limit);

        let rows = builder
            .build_query_as::<RecordDbRow>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            limit,
            keyword = ?cursor.keyword,
            kind = ?cursor.kind,
            favorite_only = cursor.favorite_only,
            watermark = ?cursor.watermark,
            rows = rows.len(),
            "query_records"
        );

        rows.into_iter().map(RecordDbRow::into_record).collect()
    }

    /// Get a single record by its ID.
    pub async fn get_record(&self, id: i64) -> Result<Option<Record>, DatabaseError> {
        let row = sqlx::query_as::<_, RecordDbRow>(&format!(
            "SELECT {} FROM records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RecordDbRow::into_record).transpose()
    }

    /// Total number of stored records.
    pub async fn count_records(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b\\c"), "a\\_b\\\\c");
    }
}
