use super::cursor::{Filter, KindFilter};
use std::time::Duration;
use tokio::time::Instant;

/// Default quiet period before a filter change triggers a reload.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Owns keyword and kind filter state and debounces reloads.
///
/// The filter itself updates immediately so in-flight results can be checked
/// against it; only the reload request waits for the quiet period.
#[derive(Debug)]
pub struct SearchController {
    filter: Filter,
    debounce: Duration,
    deadline: Option<Instant>,
}

impl SearchController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            filter: Filter::default(),
            debounce,
            deadline: None,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Record new filter intent and restart the quiet period.
    pub fn set_filter(&mut self, keyword: &str, kind: KindFilter, now: Instant) {
        self.filter = Filter::new(keyword, kind);
        self.deadline = Some(now + self.debounce);
        tracing::debug!(
            keyword = %keyword,
            kind = %kind,
            "Filter changed, reload debounced"
        );
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the filter to reload with once the quiet period has elapsed.
    /// Fires at most once per burst of `set_filter` calls.
    pub fn poll(&mut self, now: Instant) -> Option<Filter> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(self.filter.clone())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordKind;

    #[test]
    fn test_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut search = SearchController::new(SEARCH_DEBOUNCE);
        search.set_filter("a", KindFilter::All, start);
        search.set_filter("ab", KindFilter::All, start + Duration::from_millis(100));

        // 200ms after the first call but only 100ms after the second.
        assert_eq!(search.poll(start + Duration::from_millis(200)), None);

        let fired = search.poll(start + Duration::from_millis(300));
        assert_eq!(fired, Some(Filter::new("ab", KindFilter::All)));
        assert_eq!(search.poll(start + Duration::from_millis(400)), None);
    }

    #[test]
    fn test_filter_updates_before_debounce() {
        let now = Instant::now();
        let mut search = SearchController::new(SEARCH_DEBOUNCE);
        search.set_filter("cat", KindFilter::Favorite, now);
        assert_eq!(search.filter().keyword(), Some("cat"));
        assert_eq!(search.filter().kind(), KindFilter::Favorite);
    }

    #[test]
    fn test_image_kind_clears_keyword() {
        let now = Instant::now();
        let mut search = SearchController::new(SEARCH_DEBOUNCE);
        search.set_filter("cat", KindFilter::Kind(RecordKind::Image), now);
        assert_eq!(search.filter().keyword(), None);
    }
}
