//! Per-tab navigation history
//!
//! The persisted back/forward list of one tab. Only the cursor position
//! leaks into `TabRecord` (as entry counts behind and ahead of it).

use serde::{Deserialize, Serialize};

/// Where a tab's history cursor points after a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStep {
    pub url: String,
    pub title: String,
    pub previous_link: u32,
    pub next_link: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabHistory {
    entries: Vec<(String, String)>,
    position: usize,
}

impl TabHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<(String, String)>, position: usize) -> Self {
        let position = position.min(entries.len().saturating_sub(1));
        Self { entries, position }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Record a fresh navigation. Forward entries are dropped.
    pub fn push(&mut self, url: &str, title: &str) -> HistoryStep {
        if let Some((current, _)) = self.entries.get(self.position) {
            if current == url {
                // Reload or redirect to the same URL, keep the list as is
                return self.current_step();
            }
        }

        if !self.entries.is_empty() {
            self.entries.truncate(self.position + 1);
        }
        self.entries.push((url.to_string(), title.to_string()));
        self.position = self.entries.len() - 1;
        self.current_step()
    }

    pub fn set_title(&mut self, title: &str) {
        if let Some(entry) = self.entries.get_mut(self.position) {
            entry.1 = title.to_string();
        }
    }

    pub fn back(&mut self) -> Option<HistoryStep> {
        if self.position == 0 || self.entries.is_empty() {
            return None;
        }
        self.position -= 1;
        Some(self.current_step())
    }

    pub fn forward(&mut self) -> Option<HistoryStep> {
        if self.position + 1 >= self.entries.len() {
            return None;
        }
        self.position += 1;
        Some(self.current_step())
    }

    pub fn previous_link(&self) -> u32 {
        if self.entries.is_empty() {
            0
        } else {
            self.position as u32
        }
    }

    pub fn next_link(&self) -> u32 {
        self.entries
            .len()
            .saturating_sub(self.position + 1) as u32
    }

    pub fn current_step(&self) -> HistoryStep {
        let (url, title) = self
            .entries
            .get(self.position)
            .cloned()
            .unwrap_or_default();
        HistoryStep {
            url,
            title,
            previous_link: self.previous_link(),
            next_link: self.next_link(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_and_forward() {
        let mut history = TabHistory::new();
        history.push("https://a.example", "A");
        history.push("https://b.example", "B");
        let step = history.push("https://c.example", "C");
        assert_eq!((step.previous_link, step.next_link), (2, 0));

        let back = history.back().unwrap();
        assert_eq!(back.url, "https://b.example");
        assert_eq!((back.previous_link, back.next_link), (1, 1));

        let forward = history.forward().unwrap();
        assert_eq!(forward.url, "https://c.example");
        assert!(history.forward().is_none());
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let mut history = TabHistory::new();
        history.push("https://a.example", "A");
        history.push("https://b.example", "B");
        history.back();
        let step = history.push("https://c.example", "C");

        assert_eq!(history.len(), 2);
        assert_eq!((step.previous_link, step.next_link), (1, 0));
    }

    #[test]
    fn test_same_url_is_not_duplicated() {
        let mut history = TabHistory::new();
        history.push("https://a.example", "A");
        history.push("https://a.example", "A again");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_empty_history() {
        let mut history = TabHistory::new();
        assert!(history.back().is_none());
        assert!(history.forward().is_none());
        assert_eq!((history.previous_link(), history.next_link()), (0, 0));
    }
}
