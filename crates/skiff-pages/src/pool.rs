//! Live page pool
//!
//! Maps tab ids to live engine pages and enforces the live page cap.
//! Activation and eviction are separate steps: `activate` never evicts, so
//! the page a caller is about to show can't be destroyed under it, and
//! `enforce_max_live` can run after any event that grows the live set.

use serde::Serialize;
use std::collections::HashMap;

use skiff_tabs::{TabId, NO_TAB};

use crate::engine::{PageFactory, PageSeed, WebPage};
use crate::error::PoolError;
use crate::Result;

/// Outcome of `LivePagePool::activate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub tab_id: TabId,
    pub was_already_live: bool,
}

impl Activation {
    /// A fresh page was created.
    pub fn created(&self) -> bool {
        !self.was_already_live
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub tab_id: TabId,
    pub parent_tab_id: TabId,
    pub url: String,
    pub title: String,
    pub live: bool,
    pub observed: bool,
}

struct LivePage {
    page: Box<dyn WebPage>,
    parent_tab_id: TabId,
    thumbnail_path: Option<String>,
    observed: bool,
}

struct VirtualPage {
    seed: PageSeed,
    parent_tab_id: TabId,
}

pub struct LivePagePool {
    factory: Box<dyn PageFactory>,
    live: HashMap<TabId, LivePage>,
    virtualized: HashMap<TabId, VirtualPage>,
}

impl LivePagePool {
    pub fn new(factory: Box<dyn PageFactory>) -> Self {
        Self {
            factory,
            live: HashMap::new(),
            virtualized: HashMap::new(),
        }
    }

    /// Get the factory ready. Repeated calls are cheap.
    pub fn initialize(&mut self) -> Result<()> {
        if self.factory.is_ready() {
            return Ok(());
        }
        self.factory.initialize()?;
        if self.factory.is_ready() {
            tracing::debug!("Page factory initialized");
            Ok(())
        } else {
            Err(PoolError::NotInitialized)
        }
    }

    pub fn initialized(&self) -> bool {
        self.factory.is_ready()
    }

    /// Ensure `tab_id` has a live page. Never evicts.
    pub fn activate(&mut self, tab_id: TabId, parent_tab_id: TabId) -> Result<Activation> {
        if tab_id == NO_TAB {
            return Err(PoolError::InvalidTabId(tab_id));
        }
        if !self.factory.is_ready() {
            return Err(PoolError::NotInitialized);
        }

        if self.live.contains_key(&tab_id) {
            return Ok(Activation {
                tab_id,
                was_already_live: true,
            });
        }

        let virtual_page = self.virtualized.get(&tab_id);
        let parent_tab_id = match (parent_tab_id, virtual_page) {
            (NO_TAB, Some(v)) => v.parent_tab_id,
            (parent, _) => parent,
        };
        let seed = virtual_page.map(|v| v.seed.clone());

        let page = self
            .factory
            .create_page(tab_id, parent_tab_id, seed.as_ref())?;
        self.virtualized.remove(&tab_id);

        tracing::info!(
            tab_id = tab_id,
            parent_tab_id = parent_tab_id,
            restored = seed.is_some(),
            live_count = self.live.len() + 1,
            "Created live page"
        );

        self.live.insert(
            tab_id,
            LivePage {
                page,
                parent_tab_id,
                thumbnail_path: seed.and_then(|s| s.thumbnail_path),
                observed: false,
            },
        );

        Ok(Activation {
            tab_id,
            was_already_live: false,
        })
    }

    /// Destroy the live page of `tab_id`.
    ///
    /// With `virtualize`, the tab keeps a seed to rebuild its page later;
    /// otherwise the tab is forgotten (it was closed). Returns whether a
    /// live page was destroyed.
    pub fn release(&mut self, tab_id: TabId, virtualize: bool) -> bool {
        let Some(mut entry) = self.live.remove(&tab_id) else {
            if !virtualize {
                self.virtualized.remove(&tab_id);
            }
            return false;
        };

        // Observers go before the page does
        entry.observed = false;

        if virtualize {
            let seed = PageSeed {
                url: entry.page.url(),
                title: entry.page.title(),
                thumbnail_path: entry.thumbnail_path.take(),
            };
            self.virtualized.insert(
                tab_id,
                VirtualPage {
                    seed,
                    parent_tab_id: entry.parent_tab_id,
                },
            );
        } else {
            self.virtualized.remove(&tab_id);
        }

        self.factory.destroy_page(entry.page);

        tracing::info!(
            tab_id = tab_id,
            virtualize = virtualize,
            live_count = self.live.len(),
            "Released live page"
        );

        true
    }

    /// Virtualize surplus pages.
    ///
    /// `order` is the tab priority, highest first. The active tab is always
    /// kept; of the others, the first `max - 1` live ones are kept and the
    /// rest are virtualized lowest priority first while the live count
    /// exceeds `max`. `max` is at least 1.
    ///
    /// The bound covers tabs in `order` only. Live pages missing from it are
    /// placeholders for tabs not created yet and are left alone, so the live
    /// count may exceed `max` by those until they become tabs or are
    /// released.
    pub fn enforce_max_live(
        &mut self,
        order: &[TabId],
        active_tab_id: TabId,
        max: usize,
    ) -> Vec<TabId> {
        let max = max.max(1);
        if self.live.len() <= max {
            return Vec::new();
        }

        let mut candidates: Vec<TabId> = order
            .iter()
            .copied()
            .filter(|id| *id != active_tab_id && self.live.contains_key(id))
            .collect();

        let mut evicted = Vec::new();
        while self.live.len() > max {
            let Some(tab_id) = candidates.pop() else {
                break;
            };
            if self.release(tab_id, true) {
                evicted.push(tab_id);
            }
        }

        if !evicted.is_empty() {
            tracing::debug!(
                evicted = ?evicted,
                max = max,
                active_tab_id = active_tab_id,
                "Virtualized surplus pages"
            );
        }

        evicted
    }

    /// Tab that opened `tab_id`, or `NO_TAB`.
    pub fn parent_of(&self, tab_id: TabId) -> TabId {
        self.live
            .get(&tab_id)
            .map(|e| e.parent_tab_id)
            .or_else(|| self.virtualized.get(&tab_id).map(|v| v.parent_tab_id))
            .unwrap_or(NO_TAB)
    }

    pub fn page(&self, tab_id: TabId) -> Option<&dyn WebPage> {
        self.live.get(&tab_id).map(|e| e.page.as_ref())
    }

    pub fn page_mut(&mut self, tab_id: TabId) -> Option<&mut (dyn WebPage + 'static)> {
        self.live.get_mut(&tab_id).map(|e| e.page.as_mut())
    }

    pub fn is_live(&self, tab_id: TabId) -> bool {
        self.live.contains_key(&tab_id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn seed(&self, tab_id: TabId) -> Option<&PageSeed> {
        self.virtualized.get(&tab_id).map(|v| &v.seed)
    }

    /// Subscribe to a live page's events. True only the first time.
    pub fn observe(&mut self, tab_id: TabId) -> bool {
        match self.live.get_mut(&tab_id) {
            Some(entry) if !entry.observed => {
                entry.observed = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_observed(&self, tab_id: TabId) -> bool {
        self.live.get(&tab_id).map(|e| e.observed).unwrap_or(false)
    }

    pub fn set_thumbnail(&mut self, tab_id: TabId, path: Option<String>) {
        if let Some(entry) = self.live.get_mut(&tab_id) {
            entry.thumbnail_path = path;
        } else if let Some(v) = self.virtualized.get_mut(&tab_id) {
            v.seed.thumbnail_path = path;
        }
    }

    /// Snapshot of every known page, live ones first.
    pub fn dump_pages(&self) -> Vec<PageSummary> {
        let mut summaries: Vec<PageSummary> = self
            .live
            .iter()
            .map(|(tab_id, entry)| PageSummary {
                tab_id: *tab_id,
                parent_tab_id: entry.parent_tab_id,
                url: entry.page.url(),
                title: entry.page.title(),
                live: true,
                observed: entry.observed,
            })
            .collect();
        summaries.sort_by_key(|s| s.tab_id);

        let mut virtual_pages: Vec<PageSummary> = self
            .virtualized
            .iter()
            .map(|(tab_id, v)| PageSummary {
                tab_id: *tab_id,
                parent_tab_id: v.parent_tab_id,
                url: v.seed.url.clone(),
                title: v.seed.title.clone(),
                live: false,
                observed: false,
            })
            .collect();
        virtual_pages.sort_by_key(|s| s.tab_id);
        summaries.extend(virtual_pages);

        for summary in &summaries {
            tracing::info!(
                tab_id = summary.tab_id,
                parent_tab_id = summary.parent_tab_id,
                live = summary.live,
                url = %summary.url,
                "Page"
            );
        }

        summaries
    }

    /// Destroy every live page.
    pub fn clear(&mut self) {
        let ids: Vec<TabId> = self.live.keys().copied().collect();
        for tab_id in ids {
            self.release(tab_id, false);
        }
        self.virtualized.clear();
    }
}

impl Drop for LivePagePool {
    fn drop(&mut self) {
        self.clear();
    }
}
