//! Splits a raw press stream into select and activate intents.
//!
//! A first press arms a deferred select. A second press on the same record
//! before the arming window runs out cancels it and activates instead. No
//! native double-click event is needed.

use std::time::Duration;
use tokio::time::Instant;

/// Default arming window.
pub const CLICK_WINDOW: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickIntent {
    Select(i64),
    Activate(i64),
}

#[derive(Debug)]
pub struct ClickDisambiguator {
    window: Duration,
    armed: Option<(i64, Instant)>,
}

impl ClickDisambiguator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            armed: None,
        }
    }

    /// Feed one press on record `id`.
    ///
    /// Returns `Activate` immediately for a second press on the armed record;
    /// otherwise arms (or re-arms) a deferred select and returns `None`. A
    /// press on a different record replaces the pending select. Callers
    /// should [`poll`](Self::poll) first so an expired arming is delivered
    /// rather than paired with this press.
    pub fn press(&mut self, id: i64, now: Instant) -> Option<ClickIntent> {
        match self.armed {
            Some((armed_id, deadline)) if armed_id == id && now < deadline => {
                self.armed = None;
                Some(ClickIntent::Activate(id))
            }
            _ => {
                self.armed = Some((id, now + self.window));
                None
            }
        }
    }

    /// Deliver the deferred select once its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<ClickIntent> {
        match self.armed {
            Some((id, deadline)) if now >= deadline => {
                self.armed = None;
                Some(ClickIntent::Select(id))
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.armed.map(|(_, deadline)| deadline)
    }

    pub fn reset(&mut self) {
        self.armed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_single_press_selects_after_window() {
        let t0 = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_WINDOW);
        assert_eq!(clicks.press(7, t0), None);
        assert_eq!(clicks.poll(t0 + ms(149)), None);
        assert_eq!(clicks.poll(t0 + ms(150)), Some(ClickIntent::Select(7)));
        assert_eq!(clicks.poll(t0 + ms(500)), None);
    }

    #[test]
    fn test_double_press_activates_without_select() {
        let t0 = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_WINDOW);
        assert_eq!(clicks.press(7, t0), None);
        assert_eq!(clicks.press(7, t0 + ms(90)), Some(ClickIntent::Activate(7)));
        assert_eq!(clicks.deadline(), None);
        assert_eq!(clicks.poll(t0 + ms(500)), None);
    }

    #[test]
    fn test_press_on_other_record_rearms() {
        let t0 = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_WINDOW);
        clicks.press(7, t0);
        assert_eq!(clicks.press(8, t0 + ms(50)), None);
        assert_eq!(clicks.poll(t0 + ms(160)), None);
        assert_eq!(clicks.poll(t0 + ms(200)), Some(ClickIntent::Select(8)));
    }

    #[test]
    fn test_slow_second_press_arms_again() {
        let t0 = Instant::now();
        let mut clicks = ClickDisambiguator::new(CLICK_WINDOW);
        clicks.press(7, t0);
        assert_eq!(clicks.poll(t0 + ms(200)), Some(ClickIntent::Select(7)));
        assert_eq!(clicks.press(7, t0 + ms(210)), None);
        assert_eq!(clicks.deadline(), Some(t0 + ms(360)));
    }
}
