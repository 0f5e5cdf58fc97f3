//! Container behaviour against the scripted engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use skiff_core::{
    ActivationState, Config, Container, ContainerEvent, MemoryTabStore, PageEvent, Phase,
    TabModel, TabRecord, TabStore,
};
use skiff_pages::testing::FakeEngine;
use tempfile::TempDir;
use tokio::runtime::{Handle, Runtime};

struct Harness {
    container: Container,
    engine: FakeEngine,
    store: MemoryTabStore,
    _runtime: Option<Runtime>,
    dir: TempDir,
}

impl Harness {
    fn new(tabs: Vec<TabRecord>) -> Self {
        let runtime = Runtime::new().unwrap();
        let handle = runtime.handle().clone();
        Self::build(tabs, handle, Some(runtime), |_| {})
    }

    fn with_config(tabs: Vec<TabRecord>, configure: impl FnOnce(&mut Config)) -> Self {
        let runtime = Runtime::new().unwrap();
        let handle = runtime.handle().clone();
        Self::build(tabs, handle, Some(runtime), configure)
    }

    /// For use inside a tokio test.
    fn current(tabs: Vec<TabRecord>, configure: impl FnOnce(&mut Config)) -> Self {
        Self::build(tabs, Handle::current(), None, configure)
    }

    fn build(
        tabs: Vec<TabRecord>,
        handle: Handle,
        runtime: Option<Runtime>,
        configure: impl FnOnce(&mut Config),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path().to_path_buf());
        config.cache_dir = dir.path().join("cache");
        configure(&mut config);

        let store = MemoryTabStore::with_tabs(tabs);
        let model = TabModel::new(Arc::new(store.clone()));
        let engine = FakeEngine::new();
        let container = Container::new(config, model, engine.factory(), handle);

        Self {
            container,
            engine,
            store,
            _runtime: runtime,
            dir,
        }
    }

    /// Load tabs, signal readiness and let the engine report the first URL.
    fn start(&mut self) {
        self.container.load_tabs().unwrap();
        self.container.set_ready_to_load(true);
        if let Some(tab_id) = self.container.active_tab() {
            self.report_url(tab_id);
        }
    }

    fn report_url(&mut self, tab_id: u32) {
        self.container.handle_page_event(tab_id, PageEvent::UrlChanged);
    }

    fn finish_load(&mut self, tab_id: u32) {
        self.engine.finish_load(tab_id);
        self.container
            .handle_page_event(tab_id, PageEvent::LoadProgressChanged(100));
        self.container
            .handle_page_event(tab_id, PageEvent::DomContentLoaded);
    }
}

fn tab(tab_id: u32, url: &str, age_secs: i64) -> TabRecord {
    let mut record = TabRecord::new(tab_id, url.to_string(), String::new(), 0).unwrap();
    record.last_active_at = chrono::Utc::now() - chrono::Duration::seconds(age_secs);
    record
}

#[test]
fn test_activation_refused_before_model_loaded() {
    let mut h = Harness::new(vec![]);

    assert!(!h.container.activate_page(7, false));
    assert!(h.engine.created().is_empty());
    assert_eq!(h.container.active_tab(), None);
}

#[test]
fn test_startup_loads_most_recent_tab() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 60), tab(2, "https://b.example/", 0)]);
    h.container.load_tabs().unwrap();

    // Bound but not loaded until the UI is ready
    assert_eq!(h.container.active_tab(), Some(2));
    assert!(h.engine.page(2).unwrap().navigations.is_empty());
    assert_eq!(h.container.activation_state(), ActivationState::Idle);

    h.container.set_ready_to_load(true);
    assert_eq!(h.engine.page(2).unwrap().navigations, vec!["https://b.example/"]);
    assert_eq!(h.container.activation_state(), ActivationState::Loading);
    assert!(h.container.take_events().contains(&ContainerEvent::TriggerLoad {
        url: "https://b.example/".to_string(),
        title: String::new(),
    }));

    h.finish_load(2);
    assert_eq!(h.container.activation_state(), ActivationState::Idle);
    assert_eq!(h.container.load_progress(), 100);
    assert_eq!(h.engine.created(), vec![2]);
}

#[test]
fn test_empty_model_loads_home_page_into_placeholder() {
    let mut h = Harness::new(vec![]);
    h.container.load_tabs().unwrap();

    // Placeholder page for the first tab id
    assert_eq!(h.container.active_tab(), Some(1));
    assert_eq!(h.container.model().count(), 0);

    h.container.set_ready_to_load(true);
    assert_eq!(h.engine.page(1).unwrap().navigations, vec!["about:blank"]);

    h.report_url(1);
    assert_eq!(h.container.model().count(), 1);
    assert_eq!(h.container.model().active_tab_id(), 1);
    assert_eq!(h.engine.created(), vec![1]);
}

#[test]
fn test_virtualized_tab_restores_its_url() {
    let mut h = Harness::with_config(
        vec![tab(1, "https://a.example/", 60), tab(2, "https://b.example/", 0)],
        |config| config.max_live_tab_count = 1,
    );
    h.start();

    h.container.activate_tab(1);
    assert!(!h.container.pool().is_live(2));
    assert_eq!(h.container.pool().seed(2).unwrap().url, "https://b.example/");
    h.report_url(1);

    h.container.activate_tab(2);
    let page = h.engine.page(2).unwrap();
    assert_eq!(page.initial_url.as_deref(), Some("https://b.example/"));
    assert!(page.navigations.is_empty());
    assert_eq!(h.container.url(), "https://b.example/");
    assert!(!h.container.pool().is_live(1));
    assert_eq!(h.container.activation_state(), ActivationState::Idle);
}

#[test]
fn test_cap_evicts_lowest_priority_tab() {
    let tabs = (1..=6).map(|id| tab(id, &format!("https://t{}.example/", id), 100 - id as i64)).collect();
    let mut h = Harness::with_config(tabs, |config| config.max_live_tab_count = 10);
    h.start();
    for id in 1..=6 {
        h.container.activate_tab(id);
    }
    h.container.activate_tab(3);
    assert_eq!(h.container.pool().live_count(), 6);

    h.container.set_max_live_tab_count(5);
    assert_eq!(h.container.pool().live_count(), 5);
    assert!(h.container.pool().is_live(3));
    // Order is now [3, 6, 5, 4, 2, 1]
    assert!(!h.container.pool().is_live(1));
}

#[test]
fn test_cap_never_below_one() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 10), tab(2, "https://b.example/", 0)]);
    h.start();
    h.container.activate_tab(1);

    h.container.set_max_live_tab_count(0);
    assert_eq!(h.container.max_live_tab_count(), 1);
    assert_eq!(h.container.pool().live_tab_ids(), vec![1]);
}

#[test]
fn test_forward_then_back_restores_flags() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();
    for url in ["https://b.example/", "https://c.example/"] {
        h.container.load(url, "");
        h.report_url(1);
    }
    assert!(h.container.can_go_back());
    assert!(!h.container.can_go_forward());

    h.container.go_back();
    h.report_url(1);
    let before = (h.container.can_go_back(), h.container.can_go_forward());
    assert_eq!(before, (true, true));

    h.container.go_forward();
    let (back, forward) = h.container.navigation_flags();
    assert_eq!((back.get(), forward.get()), (true, false));
    assert_eq!(forward.phase(), Phase::Optimistic);

    h.container.go_back();
    assert_eq!((h.container.can_go_back(), h.container.can_go_forward()), before);

    h.report_url(1);
    let (back, forward) = h.container.navigation_flags();
    assert!(back.is_confirmed() && forward.is_confirmed());
    assert_eq!((back.get(), forward.get()), before);
    assert_eq!(h.container.url(), "https://b.example/");
}

#[test]
fn test_back_without_engine_history_replays_store() {
    let store_seed = tab(1, "https://a.example/", 0);
    let mut h = Harness::new(vec![store_seed]);
    h.store.navigate(1, "https://b.example/", "B").unwrap();
    h.start();
    assert!(h.container.can_go_back());

    h.container.go_back();
    let page = h.engine.page(1).unwrap();
    assert_eq!(page.back_calls, 0);
    assert_eq!(page.navigations.last().map(String::as_str), Some("https://a.example/"));

    h.report_url(1);
    let record = h.container.model().get(1).unwrap();
    assert_eq!(record.url, "https://a.example/");
    assert_eq!((record.previous_link, record.next_link), (0, 1));
    assert!(!h.container.model().back_forward_navigation());
}

#[test]
fn test_new_tab_request_deferred_while_in_background() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();

    h.container.set_foreground(false);
    h.container.handle_page_event(
        1,
        PageEvent::NewWindowRequested {
            url: "https://popup.example/".to_string(),
            title: "Popup".to_string(),
        },
    );
    assert_eq!(h.container.pending_new_tab_requests(), 1);
    assert_eq!(h.container.active_tab(), None);
    assert!(!h.engine.page(1).unwrap().visible);
    assert_eq!(h.engine.created(), vec![1]);

    h.container.set_foreground(true);
    assert_eq!(h.container.pending_new_tab_requests(), 0);
    assert_eq!(h.container.active_tab(), Some(2));
    h.report_url(2);

    h.container.set_foreground(false);
    h.container.set_foreground(true);

    let model = h.container.model();
    assert_eq!(model.count(), 2);
    assert_eq!(model.active_tab_id(), 2);
    assert_eq!(model.get(2).unwrap().parent_tab_id, 1);
    assert_eq!(model.get(2).unwrap().title, "Popup");
    assert_eq!(h.engine.created(), vec![1, 2]);
}

#[test]
fn test_script_opened_tab_may_close_itself() {
    let mut child = tab(2, "https://b.example/", 0);
    child.parent_tab_id = 1;
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 30), child]);
    h.start();
    assert_eq!(h.container.parent_tab_id(2), 1);

    h.container.handle_page_event(2, PageEvent::WindowCloseRequested);
    assert_eq!(h.container.model().count(), 1);
    assert_eq!(h.container.active_tab(), Some(1));
    assert!(h.engine.destroyed().contains(&2));
    assert!(h.container.pool().seed(2).is_none());
}

#[test]
fn test_user_opened_tab_cannot_close_itself() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();

    h.container.handle_page_event(1, PageEvent::WindowCloseRequested);
    assert_eq!(h.container.model().count(), 1);
    assert!(h.container.pool().is_live(1));
}

#[test]
fn test_closing_active_tab_switches_to_next() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 30), tab(2, "https://b.example/", 0)]);
    h.start();

    assert!(h.container.close_tab(2));
    assert_eq!(h.container.active_tab(), Some(1));
    assert!(!h.container.pool().is_live(2));
    assert_eq!(h.engine.page(1).unwrap().navigations, vec!["https://a.example/"]);

    assert!(h.container.close_tab(1));
    assert_eq!(h.container.active_tab(), None);
    assert_eq!(h.container.thumbnail_path(), None);
    assert_eq!(h.container.pool().live_count(), 0);
}

#[test]
fn test_download_in_new_tab_returns_to_previous_page() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();

    h.container.handle_page_event(
        1,
        PageEvent::NewWindowRequested {
            url: "https://files.example/report.pdf".to_string(),
            title: String::new(),
        },
    );
    assert_eq!(h.container.active_tab(), Some(2));
    assert!(h.container.model().has_new_tab_data());

    h.container.on_download_started();
    assert_eq!(h.container.active_tab(), Some(1));
    assert!(!h.container.model().has_new_tab_data());
    assert_eq!(h.container.model().count(), 1);
    assert_eq!(h.engine.destroyed(), vec![2]);
}

#[test]
fn test_selecting_requesting_tab_drops_new_tab_placeholder() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();

    h.container.handle_page_event(
        1,
        PageEvent::NewWindowRequested {
            url: "https://popup.example/".to_string(),
            title: String::new(),
        },
    );
    assert_eq!(h.container.active_tab(), Some(2));
    assert_eq!(h.container.model().active_tab_id(), 1);

    assert!(h.container.activate_tab(1));
    assert_eq!(h.container.active_tab(), Some(1));
    assert!(!h.container.model().has_new_tab_data());
    assert!(!h.container.pool().is_live(2));
    assert_eq!(h.engine.destroyed(), vec![2]);
    assert_eq!(h.container.url(), "https://a.example/");
}

#[test]
fn test_failed_recreation_leaves_tab_virtual() {
    let mut h = Harness::with_config(
        vec![tab(1, "https://a.example/", 60), tab(2, "https://b.example/", 0)],
        |config| config.max_live_tab_count = 1,
    );
    h.start();
    h.container.activate_tab(1);
    h.report_url(1);
    assert!(!h.container.pool().is_live(2));

    h.engine.fail_creation_for(2);
    assert!(h.container.activate_tab(2));

    assert_eq!(h.container.model().active_tab_id(), 2);
    assert_eq!(h.container.active_tab(), None);
    assert!(h.container.pool().seed(2).is_some());
    // Persisted metadata stands in for the missing page
    assert_eq!(h.container.url(), "https://b.example/");
    assert!(!h.engine.page(1).unwrap().visible);
    assert_eq!(h.container.activation_state(), ActivationState::Idle);
}

#[test]
fn test_events_from_released_page_ignored() {
    let mut h = Harness::with_config(
        vec![tab(1, "https://a.example/", 60), tab(2, "https://b.example/", 0)],
        |config| config.max_live_tab_count = 1,
    );
    h.start();
    h.container.activate_tab(1);

    h.container.handle_page_event(2, PageEvent::WindowCloseRequested);
    h.container.handle_page_event(2, PageEvent::TitleChanged);
    assert_eq!(h.container.model().count(), 2);
}

#[test]
fn test_visibility_change_debounced() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();
    h.container.take_events();

    let start = Instant::now();
    h.container.window_visibility_changed(false, start);
    assert!(!h.container.poll_visibility(start + Duration::from_millis(500)));
    assert!(h.container.foreground());

    assert!(h.container.poll_visibility(start + Duration::from_millis(1000)));
    assert!(h.container.background());
    assert!(!h.container.foreground());

    let events = h.container.take_events();
    assert!(events.contains(&ContainerEvent::BackgroundChanged(true)));
    assert!(events.contains(&ContainerEvent::ForegroundChanged(false)));
}

#[test]
fn test_visibility_flicker_absorbed() {
    let mut h = Harness::new(vec![]);
    let start = Instant::now();

    h.container.window_visibility_changed(false, start);
    h.container.window_visibility_changed(true, start + Duration::from_millis(100));
    assert!(!h.container.poll_visibility(start + Duration::from_secs(2)));
    assert!(h.container.foreground());
}

#[test]
fn test_input_panel_follows_height() {
    let mut h = Harness::new(vec![]);

    h.container.set_input_panel_height(440.0);
    assert!(h.container.input_panel_visible());

    h.container.set_input_panel_height(120.0);
    assert!(h.container.input_panel_visible());

    h.container.set_input_panel_height(0.0);
    assert!(!h.container.input_panel_visible());
}

#[test]
fn test_stale_input_panel_hidden_on_foreground() {
    let mut h = Harness::new(vec![]);
    h.container.set_input_panel_height(440.0);
    assert!(h.container.input_panel_visible());

    // Keyboard closes while a dialog holds the foreground
    h.container.set_foreground(false);
    h.container.set_input_panel_height(0.0);
    assert!(h.container.input_panel_visible());

    h.container.set_foreground(true);
    assert!(!h.container.input_panel_visible());
}

#[test]
fn test_ime_opens_panel_only_from_pointer() {
    let mut h = Harness::new(vec![tab(1, "https://a.example/", 0)]);
    h.start();

    h.container.handle_page_event(
        1,
        PageEvent::ImeStateChanged {
            opened: true,
            by_pointer: false,
        },
    );
    assert!(!h.container.input_panel_visible());

    h.container.handle_page_event(
        1,
        PageEvent::ImeStateChanged {
            opened: true,
            by_pointer: true,
        },
    );
    assert!(h.container.input_panel_visible());
}

#[test]
fn test_dump_pages() {
    let mut h = Harness::with_config(
        vec![tab(1, "https://a.example/", 60), tab(2, "https://b.example/", 0)],
        |config| config.max_live_tab_count = 1,
    );
    h.start();
    h.container.activate_tab(1);

    let pages = h.container.dump_pages();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages.iter().filter(|p| p.live).count(), 1);
}

#[tokio::test]
async fn test_capture_updates_thumbnail() {
    let mut h = Harness::current(vec![tab(1, "https://a.example/", 0)], |_| {});
    h.start();
    h.finish_load(1);

    assert!(h.container.wait_for_capture().await);

    let expected = h.dir.path().join("cache/tab-1-thumb.png");
    assert_eq!(h.container.thumbnail_path(), Some(expected.to_str().unwrap()));
    assert!(expected.is_file());
    assert_eq!(
        h.container.model().get(1).unwrap().thumbnail_path.as_deref(),
        expected.to_str()
    );
    assert_eq!(
        h.store.load_tabs().unwrap()[0].thumbnail_path.as_deref(),
        expected.to_str()
    );
}

#[tokio::test]
async fn test_failed_capture_changes_nothing() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let cache_dir = blocker.path().to_path_buf();
    let mut h = Harness::current(vec![tab(1, "https://a.example/", 0)], move |config| {
        config.cache_dir = cache_dir
    });
    h.start();
    h.finish_load(1);
    h.container.take_events();

    assert!(h.container.wait_for_capture().await);

    assert_eq!(h.container.thumbnail_path(), None);
    assert!(!h
        .container
        .take_events()
        .iter()
        .any(|e| matches!(e, ContainerEvent::ThumbnailPathChanged(_))));
    assert_eq!(h.store.load_tabs().unwrap()[0].thumbnail_path, None);
    assert_eq!(h.container.model().get(1).unwrap().thumbnail_path, None);
}

#[tokio::test]
async fn test_no_capture_while_popup_open() {
    let mut h = Harness::current(vec![tab(1, "https://a.example/", 0)], |_| {});
    h.start();
    h.container.set_popup_active(true);
    h.finish_load(1);

    assert!(!h.container.wait_for_capture().await);
}

#[tokio::test]
async fn test_drop_waits_for_capture() {
    let mut h = Harness::current(vec![tab(1, "https://a.example/", 0)], |_| {});
    h.start();
    h.finish_load(1);

    let engine = h.engine.clone();
    drop(h.container);
    assert_eq!(engine.destroyed(), vec![1]);
}
