//! Tab record
//!
//! Persisted metadata for one browser tab. A record stays valid whether or
//! not a live page currently backs the tab.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TabError;
use crate::history::HistoryStep;
use crate::Result;

/// Positive tab identifier. Zero is reserved for "no tab".
pub type TabId = u32;

pub const NO_TAB: TabId = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabRecord {
    /// Unique, immutable once assigned
    pub tab_id: TabId,
    /// Current URL
    pub url: String,
    /// Page title
    pub title: String,
    /// Path of the last captured thumbnail
    pub thumbnail_path: Option<String>,
    /// Tab that spawned this one, `NO_TAB` when opened by the user
    pub parent_tab_id: TabId,
    /// History entries behind the current one
    pub previous_link: u32,
    /// History entries ahead of the current one
    pub next_link: u32,
    pub created_at: DateTime<Utc>,
    /// Drives the most-recently-active-first ordering
    pub last_active_at: DateTime<Utc>,
}

impl TabRecord {
    pub fn new(tab_id: TabId, url: String, title: String, parent_tab_id: TabId) -> Result<Self> {
        if tab_id == NO_TAB {
            return Err(TabError::InvalidTabId(tab_id));
        }
        validate_url(&url)?;

        let now = Utc::now();

        Ok(Self {
            tab_id,
            url,
            title,
            thumbnail_path: None,
            parent_tab_id,
            previous_link: 0,
            next_link: 0,
            created_at: now,
            last_active_at: now,
        })
    }

    pub fn can_go_back(&self) -> bool {
        self.previous_link > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.next_link > 0
    }

    /// Opened by a page script rather than by the user.
    pub fn is_script_opened(&self) -> bool {
        self.parent_tab_id != NO_TAB
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Mirror a history pointer move into the record.
    pub fn apply_step(&mut self, step: &HistoryStep) {
        self.url = step.url.clone();
        self.title = step.title.clone();
        self.previous_link = step.previous_link;
        self.next_link = step.next_link;
    }

    /// Get display title (with fallback to URL)
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Empty URLs are allowed for tabs that have not loaded anything yet.
pub fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Ok(());
    }
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| TabError::InvalidUrl(format!("{}: {}", url, e)))
}
