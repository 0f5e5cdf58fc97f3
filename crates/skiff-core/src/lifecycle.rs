//! App lifecycle helpers
//!
//! Window visibility flickers when the OS shuffles windows, so a change only
//! counts once it has held for the debounce delay. New-tab requests that
//! arrive while the app is in the background wait in a FIFO queue until it
//! comes back.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use skiff_tabs::TabId;

#[derive(Debug)]
pub struct VisibilityDebouncer {
    delay: Duration,
    pending: Option<(bool, Instant)>,
}

impl VisibilityDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Note a raw visibility change. A newer change restarts the delay.
    pub fn record(&mut self, visible: bool, now: Instant) {
        self.pending = Some((visible, now));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Settled visibility, once the delay has passed. `None` while the
    /// change is still settling or if it matches `current`.
    pub fn poll(&mut self, now: Instant, current: bool) -> Option<bool> {
        let (visible, at) = self.pending?;
        if now.saturating_duration_since(at) < self.delay {
            return None;
        }
        self.pending = None;
        (visible != current).then_some(visible)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTabRequest {
    pub url: String,
    pub title: String,
    pub parent_tab_id: TabId,
}

#[derive(Debug, Default)]
pub struct DeferredRequests {
    queue: VecDeque<NewTabRequest>,
}

impl DeferredRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: NewTabRequest) {
        self.queue.push_back(request);
    }

    pub fn drain(&mut self) -> Vec<NewTabRequest> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_settles_after_delay() {
        let start = Instant::now();
        let mut debouncer = VisibilityDebouncer::new(Duration::from_millis(1000));

        debouncer.record(false, start);
        assert_eq!(debouncer.poll(start + Duration::from_millis(500), true), None);
        assert_eq!(
            debouncer.poll(start + Duration::from_millis(1000), true),
            Some(false)
        );
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_flicker_absorbed() {
        let start = Instant::now();
        let mut debouncer = VisibilityDebouncer::new(Duration::from_millis(1000));

        debouncer.record(false, start);
        debouncer.record(true, start + Duration::from_millis(200));
        assert_eq!(debouncer.poll(start + Duration::from_millis(1100), true), None);
        assert_eq!(debouncer.poll(start + Duration::from_millis(1300), true), None);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_deferred_requests_fifo() {
        let mut deferred = DeferredRequests::new();
        for (i, url) in ["https://a.example", "https://b.example"].iter().enumerate() {
            deferred.push(NewTabRequest {
                url: url.to_string(),
                title: String::new(),
                parent_tab_id: i as TabId + 1,
            });
        }

        let drained = deferred.drain();
        assert_eq!(drained[0].url, "https://a.example");
        assert_eq!(drained[1].parent_tab_id, 2);
        assert!(deferred.is_empty());
    }
}
