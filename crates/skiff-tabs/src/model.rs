//! Tab Model
//!
//! Ordered list of tab records, the active tab and the pending new-tab
//! intent. Ordering is most-recently-active first: activating or adding a
//! tab moves it to the front, which is also the eviction priority the
//! live page pool uses.
//!
//! Mutations never call back into the container. They queue
//! `TabModelEvent`s that the container drains in FIFO order.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::history::HistoryStep;
use crate::store::TabStore;
use crate::tab::{validate_url, TabId, TabRecord, NO_TAB};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabModelEvent {
    ActiveTabChanged { old: TabId, new: TabId },
    TabAdded(TabId),
    TabClosed(TabId),
    CountChanged,
    Loaded,
    /// A page asked for a new window; parent is the requesting tab.
    NewTabRequested {
        url: String,
        title: String,
        parent_tab_id: TabId,
    },
    UpdateActiveThumbnail,
}

/// Data bridging an engine new-window request to the tab it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTabIntent {
    pub url: String,
    pub title: String,
    /// Tab that was active when the request came in
    pub previous_tab_id: TabId,
    pub parent_tab_id: TabId,
}

pub struct TabModel {
    tabs: Vec<TabRecord>,
    active_tab_id: TabId,
    next_tab_id: TabId,
    loaded: bool,
    new_tab: Option<NewTabIntent>,
    back_forward_navigation: bool,
    store: Arc<dyn TabStore>,
    events: VecDeque<TabModelEvent>,
}

impl TabModel {
    pub fn new(store: Arc<dyn TabStore>) -> Self {
        Self {
            tabs: Vec::new(),
            active_tab_id: NO_TAB,
            next_tab_id: 1,
            loaded: false,
            new_tab: None,
            back_forward_navigation: false,
            store,
            events: VecDeque::new(),
        }
    }

    /// Read persisted tabs once. The first (most recent) becomes active.
    pub fn load(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let tabs = self.store.load_tabs()?;
        self.next_tab_id = tabs.iter().map(|t| t.tab_id).max().unwrap_or(0) + 1;
        self.tabs = tabs;
        self.loaded = true;

        let old = self.active_tab_id;
        self.active_tab_id = self.tabs.first().map(|t| t.tab_id).unwrap_or(NO_TAB);

        tracing::info!(
            count = self.tabs.len(),
            active_tab_id = self.active_tab_id,
            "Loaded tab model"
        );

        if old != self.active_tab_id {
            self.push_event(TabModelEvent::ActiveTabChanged {
                old,
                new: self.active_tab_id,
            });
        }
        self.push_event(TabModelEvent::CountChanged);
        self.push_event(TabModelEvent::Loaded);
        Ok(())
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn store(&self) -> &Arc<dyn TabStore> {
        &self.store
    }

    pub fn tabs(&self) -> &[TabRecord] {
        &self.tabs
    }

    /// Tab ids in priority order.
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(|t| t.tab_id).collect()
    }

    pub fn count(&self) -> usize {
        self.tabs.len()
    }

    pub fn get(&self, tab_id: TabId) -> Option<&TabRecord> {
        self.tabs.iter().find(|t| t.tab_id == tab_id)
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.get(tab_id).is_some()
    }

    pub fn active_tab_id(&self) -> TabId {
        self.active_tab_id
    }

    pub fn active_tab(&self) -> Option<&TabRecord> {
        self.get(self.active_tab_id)
    }

    /// Id the next added tab will get.
    pub fn next_tab_id(&self) -> TabId {
        self.next_tab_id
    }

    /// Add a tab and make it active. A pending intent supplies the parent
    /// and is consumed.
    pub fn add_tab(&mut self, url: &str, title: &str) -> Result<TabId> {
        let tab_id = self.next_tab_id;
        self.insert_tab(tab_id, url, title)?;
        Ok(tab_id)
    }

    fn insert_tab(&mut self, tab_id: TabId, url: &str, title: &str) -> Result<()> {
        validate_url(url)?;
        let parent_tab_id = self
            .new_tab
            .take()
            .map(|intent| intent.parent_tab_id)
            .unwrap_or(NO_TAB);

        let tab = TabRecord::new(tab_id, url.to_string(), title.to_string(), parent_tab_id)?;
        self.store.save_tab(&tab)?;

        self.next_tab_id = self.next_tab_id.max(tab_id + 1);
        self.tabs.insert(0, tab);

        tracing::info!(tab_id = tab_id, url = %url, parent_tab_id = parent_tab_id, "Added tab");

        self.push_event(TabModelEvent::TabAdded(tab_id));
        self.push_event(TabModelEvent::CountChanged);

        let old = self.active_tab_id;
        self.active_tab_id = tab_id;
        self.push_event(TabModelEvent::ActiveTabChanged { old, new: tab_id });
        Ok(())
    }

    /// Make `tab_id` active and move it to the front.
    pub fn activate_tab_by_id(&mut self, tab_id: TabId) -> bool {
        let Some(index) = self.tabs.iter().position(|t| t.tab_id == tab_id) else {
            tracing::debug!(tab_id = tab_id, "Ignoring activation of unknown tab");
            return false;
        };

        let mut tab = self.tabs.remove(index);
        tab.touch();
        if let Err(e) = self.store.save_tab(&tab) {
            tracing::warn!(tab_id = tab_id, error = %e, "Failed to persist tab activation");
        }
        self.tabs.insert(0, tab);

        let old = self.active_tab_id;
        if old != tab_id {
            self.active_tab_id = tab_id;
            self.push_event(TabModelEvent::ActiveTabChanged { old, new: tab_id });
        }
        true
    }

    /// Remove a tab. When it was active, the new front tab takes over.
    pub fn remove_tab_by_id(&mut self, tab_id: TabId) -> bool {
        let Some(index) = self.tabs.iter().position(|t| t.tab_id == tab_id) else {
            return false;
        };

        self.tabs.remove(index);
        if let Err(e) = self.store.remove_tab(tab_id) {
            tracing::warn!(tab_id = tab_id, error = %e, "Failed to remove persisted tab");
        }

        tracing::info!(tab_id = tab_id, "Closed tab");

        self.push_event(TabModelEvent::TabClosed(tab_id));
        self.push_event(TabModelEvent::CountChanged);

        if self.active_tab_id == tab_id {
            let new = self.tabs.first().map(|t| t.tab_id).unwrap_or(NO_TAB);
            if let Some(tab) = self.tabs.first_mut() {
                tab.touch();
                if let Err(e) = self.store.save_tab(tab) {
                    tracing::warn!(tab_id = tab.tab_id, error = %e, "Failed to persist tab activation");
                }
            }
            self.active_tab_id = new;
            self.push_event(TabModelEvent::ActiveTabChanged { old: tab_id, new });
        }
        true
    }

    /// Mirror a URL reported by the tab's page.
    ///
    /// A URL for the not-yet-existing `next_tab_id` creates the tab when a
    /// new-tab intent is pending or the model is empty: that is how pages
    /// opened by the engine become tabs.
    pub fn update_url(&mut self, tab_id: TabId, url: &str) -> Result<()> {
        if tab_id == NO_TAB {
            return Ok(());
        }

        if !self.contains(tab_id) {
            if tab_id == self.next_tab_id && (self.new_tab.is_some() || self.tabs.is_empty()) {
                let title = self
                    .new_tab
                    .as_ref()
                    .map(|intent| intent.title.clone())
                    .unwrap_or_default();
                return self.insert_tab(tab_id, url, &title);
            }
            tracing::debug!(tab_id = tab_id, url = %url, "URL change for unknown tab");
            return Ok(());
        }

        if self.back_forward_navigation {
            // The URL change is the result of a history replay, the
            // pointer has already moved.
            self.back_forward_navigation = false;
            if let Some(tab) = self.get_mut(tab_id) {
                tab.url = url.to_string();
            }
            return Ok(());
        }

        let title = self.get(tab_id).map(|t| t.title.clone()).unwrap_or_default();
        let step = self.store.navigate(tab_id, url, &title)?;
        if let Some(tab) = self.get_mut(tab_id) {
            tab.url = url.to_string();
            tab.previous_link = step.previous_link;
            tab.next_link = step.next_link;
        }
        Ok(())
    }

    pub fn update_title(&mut self, tab_id: TabId, title: &str) -> Result<()> {
        let Some(tab) = self.get_mut(tab_id) else {
            return Ok(());
        };
        if tab.title == title {
            return Ok(());
        }
        tab.title = title.to_string();
        self.store.update_title(tab_id, title)
    }

    /// In-memory only; the store already holds the path.
    pub fn update_thumbnail_path(&mut self, tab_id: TabId, path: &str) {
        if let Some(tab) = self.get_mut(tab_id) {
            tab.thumbnail_path = if path.is_empty() {
                None
            } else {
                Some(path.to_string())
            };
        }
    }

    pub fn go_back(&mut self, tab_id: TabId) -> Option<HistoryStep> {
        let result = self.store.go_back(tab_id);
        self.apply_history_move(tab_id, result)
    }

    pub fn go_forward(&mut self, tab_id: TabId) -> Option<HistoryStep> {
        let result = self.store.go_forward(tab_id);
        self.apply_history_move(tab_id, result)
    }

    fn apply_history_move(
        &mut self,
        tab_id: TabId,
        result: Result<Option<HistoryStep>>,
    ) -> Option<HistoryStep> {
        match result {
            Ok(Some(step)) => {
                if let Some(tab) = self.get_mut(tab_id) {
                    tab.apply_step(&step);
                }
                Some(step)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(tab_id = tab_id, error = %e, "History move failed");
                None
            }
        }
    }

    pub fn set_back_forward_navigation(&mut self, value: bool) {
        self.back_forward_navigation = value;
    }

    pub fn back_forward_navigation(&self) -> bool {
        self.back_forward_navigation
    }

    // === New tab intent ===

    pub fn set_new_tab_data(
        &mut self,
        url: &str,
        title: &str,
        previous_tab_id: TabId,
        parent_tab_id: TabId,
    ) {
        self.new_tab = Some(NewTabIntent {
            url: url.to_string(),
            title: title.to_string(),
            previous_tab_id,
            parent_tab_id,
        });
    }

    pub fn has_new_tab_data(&self) -> bool {
        self.new_tab.is_some()
    }

    pub fn new_tab_data(&self) -> Option<&NewTabIntent> {
        self.new_tab.as_ref()
    }

    pub fn new_tab_url(&self) -> Option<&str> {
        self.new_tab.as_ref().map(|i| i.url.as_str())
    }

    pub fn new_tab_title(&self) -> Option<&str> {
        self.new_tab.as_ref().map(|i| i.title.as_str())
    }

    pub fn new_tab_parent_id(&self) -> TabId {
        self.new_tab
            .as_ref()
            .map(|i| i.parent_tab_id)
            .unwrap_or(NO_TAB)
    }

    pub fn new_tab_previous_tab(&self) -> TabId {
        self.new_tab
            .as_ref()
            .map(|i| i.previous_tab_id)
            .unwrap_or(NO_TAB)
    }

    pub fn reset_new_tab_data(&mut self) {
        self.new_tab = None;
    }

    // === Requests routed through the event queue ===

    pub fn request_new_tab(&mut self, url: &str, title: &str, parent_tab_id: TabId) {
        self.push_event(TabModelEvent::NewTabRequested {
            url: url.to_string(),
            title: title.to_string(),
            parent_tab_id,
        });
    }

    pub fn request_active_thumbnail(&mut self) {
        self.push_event(TabModelEvent::UpdateActiveThumbnail);
    }

    pub fn take_events(&mut self) -> Vec<TabModelEvent> {
        self.events.drain(..).collect()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    fn get_mut(&mut self, tab_id: TabId) -> Option<&mut TabRecord> {
        self.tabs.iter_mut().find(|t| t.tab_id == tab_id)
    }

    fn push_event(&mut self, event: TabModelEvent) {
        self.events.push_back(event);
    }
}
