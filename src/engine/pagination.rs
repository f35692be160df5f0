use super::window::FeedWindow;
use std::time::Duration;
use tokio::time::Instant;

/// Default quiet period between a scroll event and the page request.
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(200);

/// Fraction of a viewport below which the tail is considered near.
pub const LOAD_MORE_THRESHOLD: f64 = 0.5;

/// Remaining scroll distance, in the presentation layer's own units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollProximity {
    /// Distance left to scroll in the scroll direction.
    pub remaining: f64,
    /// Extent of one viewport in the same direction.
    pub viewport: f64,
}

impl ScrollProximity {
    pub fn new(remaining: f64, viewport: f64) -> Self {
        Self {
            remaining,
            viewport,
        }
    }

    pub fn is_near_end(&self, threshold: f64) -> bool {
        self.viewport > 0.0 && self.remaining < self.viewport * threshold
    }
}

/// Why a due page load was not issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSkip {
    Exhausted,
    EmptyWindow,
    AlreadyLoading,
}

/// Issues "next page" requests with at most one outstanding per window.
#[derive(Debug)]
pub struct PaginationController {
    threshold: f64,
    debounce: Duration,
    deadline: Option<Instant>,
    generation: u64,
    in_flight: Option<u64>,
}

impl PaginationController {
    pub fn new(threshold: f64, debounce: Duration) -> Self {
        Self {
            threshold,
            debounce,
            deadline: None,
            generation: 0,
            in_flight: None,
        }
    }

    /// Arm (or re-arm) the debounce when the viewport is close to the tail.
    /// Returns whether it armed.
    pub fn maybe_load_more(&mut self, proximity: ScrollProximity, now: Instant) -> bool {
        if !proximity.is_near_end(self.threshold) {
            return false;
        }
        self.deadline = Some(now + self.debounce);
        true
    }

    /// Request a load immediately, skipping the debounce.
    pub fn arm_now(&mut self, now: Instant) {
        self.deadline = Some(now);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the debounce has elapsed. Consumes the deadline.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn check(&self, window: &FeedWindow) -> Result<(), LoadSkip> {
        if self.in_flight.is_some() {
            Err(LoadSkip::AlreadyLoading)
        } else if window.is_exhausted() {
            Err(LoadSkip::Exhausted)
        } else if window.is_empty() {
            Err(LoadSkip::EmptyWindow)
        } else {
            Ok(())
        }
    }

    /// Mark a page request as outstanding and return its generation tag.
    pub fn begin(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = Some(self.generation);
        self.generation
    }

    /// Settle the request tagged `generation`. False when it was superseded
    /// by a window replacement.
    pub fn finish(&mut self, generation: u64) -> bool {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Forget the outstanding request and any armed debounce. Used when the
    /// window is replaced or cleared.
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::window::Page;
    use crate::store::{Record, RecordKind};

    fn window_with(count: i64, exhausted: bool) -> FeedWindow {
        let records = (0..count)
            .rev()
            .map(|id| Record {
                id,
                kind: RecordKind::Text,
                value: String::new(),
                thumbnail: None,
                size: None,
                image_dimensions: None,
                created_at: id,
                updated_at: id,
                favorite: false,
                soft_deleted: false,
            })
            .collect();
        let mut window = FeedWindow::new();
        window.replace(Page { records, exhausted });
        window
    }

    #[test]
    fn test_proximity_threshold() {
        assert!(ScrollProximity::new(40.0, 100.0).is_near_end(0.5));
        assert!(!ScrollProximity::new(50.0, 100.0).is_near_end(0.5));
        assert!(!ScrollProximity::new(0.0, 0.0).is_near_end(0.5));
    }

    #[test]
    fn test_arms_only_near_end() {
        let now = Instant::now();
        let mut pagination = PaginationController::new(LOAD_MORE_THRESHOLD, SCROLL_DEBOUNCE);
        assert!(!pagination.maybe_load_more(ScrollProximity::new(300.0, 100.0), now));
        assert_eq!(pagination.deadline(), None);
        assert!(pagination.maybe_load_more(ScrollProximity::new(10.0, 100.0), now));
        assert!(!pagination.poll(now + Duration::from_millis(199)));
        assert!(pagination.poll(now + Duration::from_millis(200)));
        assert!(!pagination.poll(now + Duration::from_millis(400)));
    }

    #[test]
    fn test_guards() {
        let mut pagination = PaginationController::new(LOAD_MORE_THRESHOLD, SCROLL_DEBOUNCE);
        assert_eq!(
            pagination.check(&FeedWindow::new()),
            Err(LoadSkip::EmptyWindow)
        );
        assert_eq!(
            pagination.check(&window_with(3, true)),
            Err(LoadSkip::Exhausted)
        );

        let window = window_with(3, false);
        assert_eq!(pagination.check(&window), Ok(()));
        let generation = pagination.begin();
        assert_eq!(pagination.check(&window), Err(LoadSkip::AlreadyLoading));
        assert!(pagination.finish(generation));
        assert_eq!(pagination.check(&window), Ok(()));
    }

    #[test]
    fn test_reset_orphans_in_flight() {
        let mut pagination = PaginationController::new(LOAD_MORE_THRESHOLD, SCROLL_DEBOUNCE);
        let generation = pagination.begin();
        pagination.reset();
        assert!(!pagination.is_loading());
        assert!(!pagination.finish(generation));
    }
}
