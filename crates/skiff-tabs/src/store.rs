//! Tab persistence collaborator
//!
//! The tab model talks to storage only through `TabStore`. Writes are
//! synchronous calls; notifications the real store would deliver
//! asynchronously are queued and drained by whoever drives the model.

use serde::{Deserialize, Serialize};

use crate::history::HistoryStep;
use crate::tab::{TabId, TabRecord};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    /// A thumbnail path was persisted for `tab_id`.
    ThumbPathChanged {
        url: String,
        path: String,
        tab_id: TabId,
    },
}

pub trait TabStore: Send + Sync {
    /// All persisted tabs, most recently active first.
    fn load_tabs(&self) -> Result<Vec<TabRecord>>;

    /// Insert or replace a record. A tab without history gets its URL as
    /// the first entry.
    fn save_tab(&self, tab: &TabRecord) -> Result<()>;

    fn remove_tab(&self, tab_id: TabId) -> Result<()>;

    /// Push a navigation onto the tab's history.
    fn navigate(&self, tab_id: TabId, url: &str, title: &str) -> Result<HistoryStep>;

    fn update_title(&self, tab_id: TabId, title: &str) -> Result<()>;

    fn go_back(&self, tab_id: TabId) -> Result<Option<HistoryStep>>;

    fn go_forward(&self, tab_id: TabId) -> Result<Option<HistoryStep>>;

    /// Persist a thumbnail path and queue `StoreEvent::ThumbPathChanged`.
    fn update_thumb_path(&self, url: &str, path: &str, tab_id: TabId) -> Result<()>;

    fn drain_events(&self) -> Vec<StoreEvent>;
}
