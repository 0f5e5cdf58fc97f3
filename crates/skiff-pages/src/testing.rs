//! Scripted in-memory engine
//!
//! `FakeEngine` hands out a `PageFactory` whose pages keep their state in
//! shared cells, so a test can drive a page (finish a load, change the
//! title) and inspect what the pool or container did to it.

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use skiff_tabs::TabId;

use crate::engine::{PageFactory, PageSeed, WebPage};
use crate::error::PoolError;
use crate::Result;

#[derive(Debug, Clone, Default)]
pub struct FakePageState {
    pub tab_id: TabId,
    pub parent_tab_id: TabId,
    /// URL the page was created at, from its seed
    pub initial_url: Option<String>,
    pub history: Vec<String>,
    pub position: usize,
    pub title: String,
    pub load_progress: u8,
    pub content_height: f64,
    pub dom_content_loaded: bool,
    pub visible: bool,
    /// Explicit `navigate` calls, in order
    pub navigations: Vec<String>,
    pub back_calls: u32,
    pub forward_calls: u32,
}

impl FakePageState {
    pub fn url(&self) -> String {
        self.history.get(self.position).cloned().unwrap_or_default()
    }
}

struct EngineState {
    ready: bool,
    fail_create: HashSet<TabId>,
    pages: HashMap<TabId, Arc<Mutex<FakePageState>>>,
    created: Vec<TabId>,
    destroyed: Vec<TabId>,
    surface: Option<RgbaImage>,
}

#[derive(Clone)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                ready: false,
                fail_create: HashSet::new(),
                pages: HashMap::new(),
                created: Vec::new(),
                destroyed: Vec::new(),
                surface: Some(RgbaImage::from_pixel(48, 64, Rgba([200, 40, 40, 255]))),
            })),
        }
    }

    pub fn factory(&self) -> Box<dyn PageFactory> {
        Box::new(FakeFactory {
            engine: self.clone(),
        })
    }

    /// Tabs pages were created for, in creation order.
    pub fn created(&self) -> Vec<TabId> {
        self.state.lock().created.clone()
    }

    pub fn destroyed(&self) -> Vec<TabId> {
        self.state.lock().destroyed.clone()
    }

    /// Snapshot of the live page bound to `tab_id`.
    pub fn page(&self, tab_id: TabId) -> Option<FakePageState> {
        let cell = self.state.lock().pages.get(&tab_id).cloned()?;
        let snapshot = cell.lock().clone();
        Some(snapshot)
    }

    pub fn with_page<R>(&self, tab_id: TabId, f: impl FnOnce(&mut FakePageState) -> R) -> Option<R> {
        let cell = self.state.lock().pages.get(&tab_id).cloned()?;
        let mut page = cell.lock();
        Some(f(&mut page))
    }

    /// Complete the current load of `tab_id`.
    pub fn finish_load(&self, tab_id: TabId) {
        self.with_page(tab_id, |page| {
            page.load_progress = 100;
            page.dom_content_loaded = true;
        });
    }

    pub fn fail_creation_for(&self, tab_id: TabId) {
        self.state.lock().fail_create.insert(tab_id);
    }

    /// Image every page returns from `grab_surface`; `None` means nothing
    /// has painted yet.
    pub fn set_surface(&self, surface: Option<RgbaImage>) {
        self.state.lock().surface = surface;
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

struct FakeFactory {
    engine: FakeEngine,
}

impl PageFactory for FakeFactory {
    fn initialize(&mut self) -> Result<()> {
        self.engine.state.lock().ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.engine.state.lock().ready
    }

    fn create_page(
        &mut self,
        tab_id: TabId,
        parent_tab_id: TabId,
        seed: Option<&PageSeed>,
    ) -> Result<Box<dyn WebPage>> {
        let mut engine = self.engine.state.lock();
        if engine.fail_create.contains(&tab_id) {
            return Err(PoolError::CreateFailed {
                tab_id,
                reason: "engine refused".to_string(),
            });
        }

        let mut page = FakePageState {
            tab_id,
            parent_tab_id,
            ..Default::default()
        };
        if let Some(seed) = seed {
            page.title = seed.title.clone();
            if !seed.url.is_empty() {
                page.initial_url = Some(seed.url.clone());
                page.history.push(seed.url.clone());
            }
        }

        let cell = Arc::new(Mutex::new(page));
        engine.pages.insert(tab_id, Arc::clone(&cell));
        engine.created.push(tab_id);

        Ok(Box::new(FakePage {
            state: cell,
            engine: self.engine.clone(),
        }))
    }

    fn destroy_page(&mut self, page: Box<dyn WebPage>) {
        let tab_id = page.tab_id();
        let mut engine = self.engine.state.lock();
        engine.pages.remove(&tab_id);
        engine.destroyed.push(tab_id);
    }
}

struct FakePage {
    state: Arc<Mutex<FakePageState>>,
    engine: FakeEngine,
}

impl WebPage for FakePage {
    fn tab_id(&self) -> TabId {
        self.state.lock().tab_id
    }

    fn url(&self) -> String {
        self.state.lock().url()
    }

    fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    fn load_progress(&self) -> u8 {
        self.state.lock().load_progress
    }

    fn content_height(&self) -> f64 {
        self.state.lock().content_height
    }

    fn dom_content_loaded(&self) -> bool {
        self.state.lock().dom_content_loaded
    }

    fn can_go_back(&self) -> bool {
        self.state.lock().position > 0
    }

    fn can_go_forward(&self) -> bool {
        let page = self.state.lock();
        page.position + 1 < page.history.len()
    }

    fn navigate(&mut self, url: &str) {
        let mut page = self.state.lock();
        if !page.history.is_empty() {
            let keep = page.position + 1;
            page.history.truncate(keep);
        }
        page.history.push(url.to_string());
        page.position = page.history.len() - 1;
        page.navigations.push(url.to_string());
        page.load_progress = 0;
        page.dom_content_loaded = false;
    }

    fn go_back(&mut self) {
        let mut page = self.state.lock();
        page.back_calls += 1;
        if page.position > 0 {
            page.position -= 1;
        }
    }

    fn go_forward(&mut self) {
        let mut page = self.state.lock();
        page.forward_calls += 1;
        if page.position + 1 < page.history.len() {
            page.position += 1;
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.state.lock().visible = visible;
    }

    fn grab_surface(&self) -> Option<RgbaImage> {
        self.engine.state.lock().surface.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_page_history() {
        let engine = FakeEngine::new();
        let mut factory = engine.factory();
        factory.initialize().unwrap();
        let mut page = factory.create_page(1, 0, None).unwrap();

        page.navigate("https://a.example");
        page.navigate("https://b.example");
        assert!(page.can_go_back());
        page.go_back();
        assert_eq!(page.url(), "https://a.example");
        assert!(page.can_go_forward());

        page.navigate("https://c.example");
        assert!(!page.can_go_forward());
        assert_eq!(engine.page(1).unwrap().history.len(), 2);
    }
}
