//! Integration tests for the SQLite record store.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use clipfeed::engine::{Cursor, Filter, KindFilter};
use clipfeed::storage::{Database, NewRecord};
use clipfeed::store::{ImageDimensions, RecordKind, RecordStore, StoreError};
use pretty_assertions::assert_eq;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

/// Insert `values` as text records, oldest first, returning their ids.
async fn seed_text(db: &Database, values: &[&str]) -> Vec<i64> {
    let mut ids = Vec::new();
    for value in values {
        ids.push(db.add_record(&NewRecord::text(*value)).await.unwrap());
    }
    ids
}

fn all(limit: usize) -> Cursor {
    Cursor {
        limit,
        ..Cursor::first_page(&Filter::default(), limit)
    }
}

fn filtered(keyword: &str, kind: KindFilter) -> Cursor {
    Cursor::first_page(&Filter::new(keyword, kind), 100)
}

async fn values(db: &Database, cursor: &Cursor) -> Vec<String> {
    db.query_records(cursor)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.value)
        .collect()
}

// ============================================================================
// Insert and Ordering
// ============================================================================

#[tokio::test]
async fn test_records_come_back_newest_first() {
    let db = test_db().await;
    let ids = seed_text(&db, &["first", "second", "third"]).await;

    let records = db.query_records(&all(10)).await.unwrap();
    let got: Vec<i64> = records.iter().map(|r| r.id).collect();
    assert_eq!(got, ids.iter().rev().copied().collect::<Vec<_>>());
    assert!(records
        .windows(2)
        .all(|pair| pair[0].watermark() > pair[1].watermark()));
}

#[tokio::test]
async fn test_duplicate_capture_moves_to_head() {
    let db = test_db().await;
    let ids = seed_text(&db, &["alpha", "beta", "gamma"]).await;

    let again = db.add_record(&NewRecord::text("alpha")).await.unwrap();
    assert_eq!(again, ids[0]);
    assert_eq!(db.count_records().await.unwrap(), 3);
    assert_eq!(values(&db, &all(10)).await, vec!["alpha", "gamma", "beta"]);
}

#[tokio::test]
async fn test_same_value_different_kind_is_distinct() {
    let db = test_db().await;
    db.add_record(&NewRecord::text("/tmp/report.pdf")).await.unwrap();
    db.add_record(&NewRecord::file("/tmp/report.pdf", Some(10)))
        .await
        .unwrap();
    assert_eq!(db.count_records().await.unwrap(), 2);
}

#[tokio::test]
async fn test_image_fields_round_trip() {
    let db = test_db().await;
    let id = db
        .add_record(&NewRecord::image(
            "data:image/png;base64,AAAA",
            Some("thumb.png".to_string()),
            ImageDimensions {
                width: 640,
                height: 480,
            },
        ))
        .await
        .unwrap();

    let record = db.get_record(id).await.unwrap().unwrap();
    assert_eq!(record.kind, RecordKind::Image);
    assert_eq!(record.thumbnail.as_deref(), Some("thumb.png"));
    assert_eq!(
        record.image_dimensions,
        Some(ImageDimensions {
            width: 640,
            height: 480
        })
    );
    assert!(!record.favorite);
    assert!(!record.soft_deleted);
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_keyword_is_case_insensitive_over_text_and_files() {
    let db = test_db().await;
    db.add_record(&NewRecord::text("Meeting NOTES")).await.unwrap();
    db.add_record(&NewRecord::file("/home/me/notes.txt", None))
        .await
        .unwrap();
    db.add_record(&NewRecord::image(
        "notes-screenshot",
        None,
        ImageDimensions {
            width: 1,
            height: 1,
        },
    ))
    .await
    .unwrap();
    db.add_record(&NewRecord::text("unrelated")).await.unwrap();

    assert_eq!(
        values(&db, &filtered("notes", KindFilter::All)).await,
        vec!["/home/me/notes.txt", "Meeting NOTES"]
    );
}

#[tokio::test]
async fn test_keyword_folds_ascii_case_only() {
    let db = test_db().await;
    seed_text(&db, &["le café", "le cafÉ", "LE CAFE"]).await;

    assert_eq!(
        values(&db, &filtered("CAFÉ", KindFilter::All)).await,
        vec!["le cafÉ"]
    );
    assert_eq!(
        values(&db, &filtered("cafe", KindFilter::All)).await,
        vec!["LE CAFE"]
    );
}

#[tokio::test]
async fn test_keyword_wildcards_match_literally() {
    let db = test_db().await;
    seed_text(&db, &["1000 reasons", "100% sure", "snake_case", "snakeXcase"]).await;

    assert_eq!(
        values(&db, &filtered("100%", KindFilter::All)).await,
        vec!["100% sure"]
    );
    assert_eq!(
        values(&db, &filtered("e_c", KindFilter::All)).await,
        vec!["snake_case"]
    );
}

#[tokio::test]
async fn test_kind_and_favorite_filters() {
    let db = test_db().await;
    let text = db.add_record(&NewRecord::text("hello")).await.unwrap();
    let file = db
        .add_record(&NewRecord::file("/tmp/a.txt", None))
        .await
        .unwrap();
    db.toggle_favorite(file).await.unwrap();

    let files = db
        .query_records(&filtered("", KindFilter::Kind(RecordKind::File)))
        .await
        .unwrap();
    assert_eq!(files.iter().map(|r| r.id).collect::<Vec<_>>(), vec![file]);

    let favorites = db
        .query_records(&filtered("", KindFilter::Favorite))
        .await
        .unwrap();
    assert_eq!(favorites.iter().map(|r| r.id).collect::<Vec<_>>(), vec![file]);

    let texts = db
        .query_records(&filtered("hel", KindFilter::Kind(RecordKind::Text)))
        .await
        .unwrap();
    assert_eq!(texts.iter().map(|r| r.id).collect::<Vec<_>>(), vec![text]);
}

// ============================================================================
// Watermark Paging
// ============================================================================

#[tokio::test]
async fn test_watermark_pages_cover_everything_once() {
    let db = test_db().await;
    let values_in: Vec<String> = (0..23).map(|i| format!("clip {}", i)).collect();
    let refs: Vec<&str> = values_in.iter().map(String::as_str).collect();
    seed_text(&db, &refs).await;

    let filter = Filter::default();
    let mut seen = Vec::new();
    let mut cursor = Cursor {
        limit: 5,
        ..Cursor::first_page(&filter, 5)
    };
    loop {
        let page = db.query_records(&cursor).await.unwrap();
        let Some(last) = page.last() else { break };
        cursor = Cursor {
            limit: 5,
            ..Cursor::next_page(&filter, 5, last.watermark())
        };
        seen.extend(page.into_iter().map(|r| r.value));
    }

    let expected: Vec<String> = values_in.into_iter().rev().collect();
    assert_eq!(seen, expected);
}

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_toggle_favorite_flips_and_reports_missing() {
    let db = test_db().await;
    let id = db.add_record(&NewRecord::text("pin me")).await.unwrap();

    assert_eq!(db.toggle_favorite(id).await.unwrap(), Some(true));
    assert_eq!(db.toggle_favorite(id).await.unwrap(), Some(false));
    assert_eq!(db.toggle_favorite(id + 100).await.unwrap(), None);

    let err = RecordStore::toggle_favorite(&db, id + 100).await.unwrap_err();
    assert_eq!(err, StoreError::NotFound(id + 100));
}

#[tokio::test]
async fn test_clear_history_keeps_newest() {
    let db = test_db().await;
    let ids = seed_text(&db, &["a", "b", "c", "d"]).await;

    assert_eq!(db.clear_history().await.unwrap(), 3);
    let remaining = db.query_records(&all(10)).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[3]);
}

#[tokio::test]
async fn test_clear_empty_history() {
    let db = test_db().await;
    assert_eq!(db.clear_history().await.unwrap(), 0);
}

// ============================================================================
// Activation
// ============================================================================

#[tokio::test]
async fn test_activate_text_record() {
    let db = test_db().await;
    let id = db.add_record(&NewRecord::text("copy me")).await.unwrap();
    let record = db.get_record(id).await.unwrap().unwrap();
    assert_eq!(RecordStore::activate(&db, &record).await, Ok(()));
}

#[tokio::test]
async fn test_activate_missing_file_is_not_found() {
    let db = test_db().await;
    let dir = std::env::temp_dir().join("clipfeed_store_test_activate");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("present.txt");
    std::fs::write(&path, "x").unwrap();
    let path_str = path.to_str().unwrap();

    let id = db
        .add_record(&NewRecord::file(path_str, Some(1)))
        .await
        .unwrap();
    let record = db.get_record(id).await.unwrap().unwrap();
    assert_eq!(RecordStore::activate(&db, &record).await, Ok(()));

    std::fs::remove_file(&path).unwrap();
    assert_eq!(
        RecordStore::activate(&db, &record).await,
        Err(StoreError::NotFound(id))
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_activate_deleted_row_is_not_found() {
    let db = test_db().await;
    let ids = seed_text(&db, &["old", "new"]).await;
    let old = db.get_record(ids[0]).await.unwrap().unwrap();

    db.clear_history().await.unwrap();
    assert_eq!(
        RecordStore::activate(&db, &old).await,
        Err(StoreError::NotFound(ids[0]))
    );
}

// ============================================================================
// Opening
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_database_file_is_user_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = std::env::temp_dir().join("clipfeed_store_test_perms");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("history.db");
    std::fs::remove_file(&path).ok();

    let db = Database::open(path.to_str().unwrap()).await.unwrap();
    db.add_record(&NewRecord::text("secret")).await.unwrap();

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    // Reopening runs migrations again without touching data.
    drop(db);
    let db = Database::open(path.to_str().unwrap()).await.unwrap();
    assert_eq!(db.count_records().await.unwrap(), 1);

    std::fs::remove_dir_all(&dir).ok();
}
