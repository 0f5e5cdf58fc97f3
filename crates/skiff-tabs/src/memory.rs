//! In-memory tab store

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TabError;
use crate::history::{HistoryStep, TabHistory};
use crate::store::{StoreEvent, TabStore};
use crate::tab::{TabId, TabRecord};
use crate::Result;

#[derive(Debug, Clone)]
struct StoredTab {
    record: TabRecord,
    history: TabHistory,
}

/// Volatile `TabStore`, used for private sessions and tests.
pub struct MemoryTabStore {
    tabs: Arc<RwLock<HashMap<TabId, StoredTab>>>,
    events: Arc<Mutex<Vec<StoreEvent>>>,
}

impl MemoryTabStore {
    pub fn new() -> Self {
        Self {
            tabs: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seed the store with records, as if read back from disk.
    pub fn with_tabs(tabs: Vec<TabRecord>) -> Self {
        let store = Self::new();
        for tab in tabs {
            let mut history = TabHistory::new();
            if !tab.url.is_empty() {
                history.push(&tab.url, &tab.title);
            }
            store.tabs.write().insert(
                tab.tab_id,
                StoredTab {
                    record: tab,
                    history,
                },
            );
        }
        store
    }

    pub fn history(&self, tab_id: TabId) -> Option<TabHistory> {
        self.tabs.read().get(&tab_id).map(|t| t.history.clone())
    }

    fn step<F>(&self, tab_id: TabId, f: F) -> Result<Option<HistoryStep>>
    where
        F: FnOnce(&mut TabHistory) -> Option<HistoryStep>,
    {
        let mut tabs = self.tabs.write();
        let stored = tabs.get_mut(&tab_id).ok_or(TabError::NotFound(tab_id))?;
        let step = f(&mut stored.history);
        if let Some(step) = &step {
            stored.record.apply_step(step);
        }
        Ok(step)
    }
}

impl Default for MemoryTabStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryTabStore {
    fn clone(&self) -> Self {
        Self {
            tabs: Arc::clone(&self.tabs),
            events: Arc::clone(&self.events),
        }
    }
}

impl TabStore for MemoryTabStore {
    fn load_tabs(&self) -> Result<Vec<TabRecord>> {
        let mut tabs: Vec<TabRecord> = self
            .tabs
            .read()
            .values()
            .map(|t| t.record.clone())
            .collect();
        tabs.sort_by(|a, b| {
            b.last_active_at
                .cmp(&a.last_active_at)
                .then(b.tab_id.cmp(&a.tab_id))
        });
        Ok(tabs)
    }

    fn save_tab(&self, tab: &TabRecord) -> Result<()> {
        let mut tabs = self.tabs.write();
        let stored = tabs.entry(tab.tab_id).or_insert_with(|| StoredTab {
            record: tab.clone(),
            history: TabHistory::new(),
        });
        stored.record = tab.clone();
        if stored.history.is_empty() && !tab.url.is_empty() {
            stored.history.push(&tab.url, &tab.title);
        }
        Ok(())
    }

    fn remove_tab(&self, tab_id: TabId) -> Result<()> {
        self.tabs.write().remove(&tab_id);
        Ok(())
    }

    fn navigate(&self, tab_id: TabId, url: &str, title: &str) -> Result<HistoryStep> {
        let mut tabs = self.tabs.write();
        let stored = tabs.get_mut(&tab_id).ok_or(TabError::NotFound(tab_id))?;
        let step = stored.history.push(url, title);
        stored.record.apply_step(&step);
        Ok(step)
    }

    fn update_title(&self, tab_id: TabId, title: &str) -> Result<()> {
        let mut tabs = self.tabs.write();
        let stored = tabs.get_mut(&tab_id).ok_or(TabError::NotFound(tab_id))?;
        stored.history.set_title(title);
        stored.record.title = title.to_string();
        Ok(())
    }

    fn go_back(&self, tab_id: TabId) -> Result<Option<HistoryStep>> {
        self.step(tab_id, TabHistory::back)
    }

    fn go_forward(&self, tab_id: TabId) -> Result<Option<HistoryStep>> {
        self.step(tab_id, TabHistory::forward)
    }

    fn update_thumb_path(&self, url: &str, path: &str, tab_id: TabId) -> Result<()> {
        {
            let mut tabs = self.tabs.write();
            let stored = tabs.get_mut(&tab_id).ok_or(TabError::NotFound(tab_id))?;
            stored.record.thumbnail_path = Some(path.to_string());
        }
        self.events.lock().push(StoreEvent::ThumbPathChanged {
            url: url.to_string(),
            path: path.to_string(),
            tab_id,
        });
        Ok(())
    }

    fn drain_events(&self) -> Vec<StoreEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}
