//! Optimistic in-place patches.
//!
//! These apply synchronously to the window and are never ordered against
//! in-flight reloads. A later reload is an authoritative snapshot and may
//! overwrite them.

use super::window::FeedWindow;

/// Flip the local favorite flag for `id`. Returns the new value, or `None`
/// when the record is not materialized.
///
/// Not rolled back if the store later rejects the toggle; the user can
/// re-issue it.
pub fn apply_favorite_toggle(window: &mut FeedWindow, id: i64) -> Option<bool> {
    let mut flipped = None;
    window.patch(id, |record| {
        record.favorite = !record.favorite;
        flipped = Some(record.favorite);
    });
    flipped
}

/// Mark `id` as soft-deleted: its resource is gone, but it stays in place.
pub fn mark_soft_deleted(window: &mut FeedWindow, id: i64) -> bool {
    window.patch(id, |record| record.soft_deleted = true)
}
