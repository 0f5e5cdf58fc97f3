//! Web container
//!
//! Drives the live page pool from tab model events. All control flow is
//! serialized through `pump`: model and store events are drained in FIFO
//! order and dispatched to the handlers below, and every public operation
//! pumps before returning. Property changes are reported as
//! `ContainerEvent`s for the UI layer to drain.

use std::time::{Duration, Instant};
use tokio::runtime::Handle;

use skiff_pages::{LivePagePool, PageEvent, PageFactory, PageSummary};
use skiff_tabs::{StoreEvent, TabId, TabModel, TabModelEvent, NO_TAB};

use crate::config::Config;
use crate::lifecycle::{DeferredRequests, NewTabRequest, VisibilityDebouncer};
use crate::nav::TwoPhase;
use crate::state::ActivationState;
use crate::thumbnail::{CaptureRequest, CropRect, ScreenCapture, ThumbnailCapturer};
use crate::Result;

/// Screen geometry relevant to thumbnails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub screen_width: u32,
    pub toolbar_height: u32,
    pub portrait: bool,
    pub full_screen: bool,
    /// Clockwise rotation of the rendered surface, in degrees
    pub rotation: u32,
    /// The browser window has input focus
    pub window_active: bool,
}

impl Viewport {
    /// Edge of the square thumbnail crop.
    pub fn thumbnail_size(&self) -> u32 {
        if !self.portrait && !self.full_screen {
            self.screen_width.saturating_sub(self.toolbar_height)
        } else {
            self.screen_width
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            screen_width: 480,
            toolbar_height: 0,
            portrait: true,
            full_screen: false,
            rotation: 0,
            window_active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEvent {
    ActiveTabChanged(Option<TabId>),
    CanGoBackChanged(bool),
    CanGoForwardChanged(bool),
    LoadProgressChanged(u8),
    ThumbnailPathChanged(Option<String>),
    TitleChanged(String),
    UrlChanged(String),
    ContentHeightChanged(f64),
    ForegroundChanged(bool),
    BackgroundChanged(bool),
    InputPanelVisibleChanged(bool),
    InputPanelHeightChanged(f64),
    MaxLiveTabCountChanged(usize),
    ReadyToLoadChanged(bool),
    StateChanged(ActivationState),
    /// The container started loading `url` on its own
    TriggerLoad { url: String, title: String },
}

pub struct Container {
    config: Config,
    model: TabModel,
    pool: LivePagePool,
    capturer: ThumbnailCapturer,
    /// Tab whose live page is shown; set only once activation completed
    active_tab: Option<TabId>,
    can_go_back: TwoPhase<bool>,
    can_go_forward: TwoPhase<bool>,
    load_progress: u8,
    thumbnail_path: Option<String>,
    foreground: bool,
    background: bool,
    window_visible: bool,
    popup_active: bool,
    viewport: Viewport,
    input_panel_visible: bool,
    input_panel_height: f64,
    max_live_tab_count: usize,
    ready_to_load: bool,
    state: ActivationState,
    events: Vec<ContainerEvent>,
    deferred: DeferredRequests,
    debouncer: VisibilityDebouncer,
    pumping: bool,
}

impl Container {
    pub fn new(
        config: Config,
        model: TabModel,
        factory: Box<dyn PageFactory>,
        runtime: Handle,
    ) -> Self {
        let capturer = ThumbnailCapturer::new(runtime, config.cache_dir.clone());
        let debouncer = VisibilityDebouncer::new(Duration::from_millis(config.visibility_debounce_ms));
        let max_live_tab_count = config.max_live_tab_count.max(1);

        Self {
            config,
            model,
            pool: LivePagePool::new(factory),
            capturer,
            active_tab: None,
            can_go_back: TwoPhase::new(false),
            can_go_forward: TwoPhase::new(false),
            load_progress: 0,
            thumbnail_path: None,
            foreground: true,
            background: false,
            window_visible: true,
            popup_active: false,
            viewport: Viewport::default(),
            input_panel_visible: false,
            input_panel_height: 0.0,
            max_live_tab_count,
            ready_to_load: false,
            state: ActivationState::Idle,
            events: Vec::new(),
            deferred: DeferredRequests::new(),
            debouncer,
            pumping: false,
        }
    }

    // === Properties ===

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model(&self) -> &TabModel {
        &self.model
    }

    pub fn pool(&self) -> &LivePagePool {
        &self.pool
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.active_tab
    }

    pub fn is_active_tab(&self, tab_id: TabId) -> bool {
        self.active_tab == Some(tab_id)
    }

    pub fn can_go_back(&self) -> bool {
        self.can_go_back.get()
    }

    pub fn can_go_forward(&self) -> bool {
        self.can_go_forward.get()
    }

    /// Both flags with their phase, back first.
    pub fn navigation_flags(&self) -> (TwoPhase<bool>, TwoPhase<bool>) {
        (self.can_go_back, self.can_go_forward)
    }

    pub fn load_progress(&self) -> u8 {
        self.load_progress
    }

    pub fn thumbnail_path(&self) -> Option<&str> {
        self.thumbnail_path.as_deref()
    }

    pub fn title(&self) -> String {
        self.active_page_value(|p| p.title(), |t| t.title.clone())
    }

    pub fn url(&self) -> String {
        self.active_page_value(|p| p.url(), |t| t.url.clone())
    }

    pub fn content_height(&self) -> f64 {
        self.active_tab
            .and_then(|id| self.pool.page(id))
            .map(|p| p.content_height())
            .unwrap_or(0.0)
    }

    pub fn foreground(&self) -> bool {
        self.foreground
    }

    pub fn background(&self) -> bool {
        self.background
    }

    pub fn input_panel_visible(&self) -> bool {
        self.input_panel_visible
    }

    pub fn input_panel_height(&self) -> f64 {
        self.input_panel_height
    }

    pub fn max_live_tab_count(&self) -> usize {
        self.max_live_tab_count
    }

    pub fn activation_state(&self) -> ActivationState {
        self.state
    }

    pub fn ready_to_load(&self) -> bool {
        self.ready_to_load
    }

    pub fn parent_tab_id(&self, tab_id: TabId) -> TabId {
        self.pool.parent_of(tab_id)
    }

    pub fn take_events(&mut self) -> Vec<ContainerEvent> {
        std::mem::take(&mut self.events)
    }

    // === Tab operations ===

    pub fn load_tabs(&mut self) -> Result<()> {
        self.model.load()?;
        self.pump();
        Ok(())
    }

    pub fn add_tab(&mut self, url: &str, title: &str) -> Result<TabId> {
        let tab_id = self.model.add_tab(url, title)?;
        self.pump();
        Ok(tab_id)
    }

    pub fn activate_tab(&mut self, tab_id: TabId) -> bool {
        let unchanged = self.model.active_tab_id() == tab_id;
        let activated = self.model.activate_tab_by_id(tab_id);
        if activated && unchanged && !self.is_active_tab(tab_id) {
            // A new tab placeholder or a background request holds the page
            if let Some(placeholder) = self.active_tab.filter(|id| !self.model.contains(*id)) {
                self.release_page(placeholder, false);
            }
            self.model.reset_new_tab_data();
            self.on_active_tab_changed(NO_TAB, tab_id);
        }
        self.pump();
        activated
    }

    pub fn close_tab(&mut self, tab_id: TabId) -> bool {
        let removed = self.model.remove_tab_by_id(tab_id);
        self.pump();
        removed
    }

    // === Event pump ===

    /// Drain and dispatch queued model and store events until both queues
    /// are empty. Calls made while pumping return immediately.
    pub fn pump(&mut self) {
        if self.pumping {
            return;
        }
        self.pumping = true;

        loop {
            let model_events = self.model.take_events();
            let store_events = self.model.store().drain_events();
            if model_events.is_empty() && store_events.is_empty() {
                break;
            }

            for event in model_events {
                self.dispatch_model_event(event);
            }
            for event in store_events {
                self.dispatch_store_event(event);
            }
        }

        self.pumping = false;
    }

    fn dispatch_model_event(&mut self, event: TabModelEvent) {
        tracing::trace!(event = ?event, "Dispatching model event");
        match event {
            TabModelEvent::ActiveTabChanged { old, new } => self.on_active_tab_changed(old, new),
            TabModelEvent::TabAdded(_) => self.manage_max_tab_count(),
            TabModelEvent::TabClosed(tab_id) => self.release_page(tab_id, false),
            TabModelEvent::CountChanged => {}
            TabModelEvent::Loaded => self.on_model_loaded(),
            TabModelEvent::NewTabRequested {
                url,
                title,
                parent_tab_id,
            } => self.on_new_tab_requested(NewTabRequest {
                url,
                title,
                parent_tab_id,
            }),
            TabModelEvent::UpdateActiveThumbnail => self.update_thumbnail(),
        }
    }

    fn dispatch_store_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::ThumbPathChanged { url, path, tab_id } => {
                self.on_page_thumbnail_changed(&url, &path, tab_id)
            }
        }
    }

    // === Activation ===

    fn on_active_tab_changed(&mut self, old: TabId, new: TabId) {
        if new == NO_TAB {
            self.set_thumbnail_path(None);
            self.confirm_navigation_flags(false, false);
            return;
        }

        let Some(tab) = self.model.get(new) else {
            return;
        };
        let (back, forward) = (tab.can_go_back(), tab.can_go_forward());
        let thumbnail = tab.thumbnail_path.clone();
        let (url, title) = (tab.url.clone(), tab.title.clone());

        self.confirm_navigation_flags(back, forward);
        self.set_thumbnail_path(thumbnail);

        if old == new {
            return;
        }

        if self.model.has_new_tab_data() {
            // The intent drives loading
            tracing::debug!(tab_id = new, "Tab switch deferred to new tab intent");
            return;
        }

        self.activate_page(new, true);
        if !self.is_active_tab(new) {
            // The tab stays virtual; its record stands in for the page
            if let Some(previous) = self.active_tab {
                if let Some(page) = self.pool.page_mut(previous) {
                    page.set_visible(false);
                }
                self.set_active_tab(None);
            }
            self.notify_page_changed();
        } else {
            let shows_url = self
                .pool
                .page(new)
                .map(|p| p.url() == url)
                .unwrap_or(false);
            if !shows_url && !url.is_empty() {
                if self.ready_to_load {
                    self.trigger_load(&url, &title);
                } else {
                    self.transition(ActivationState::Idle);
                }
            } else {
                self.transition(ActivationState::LoadSkippedSamePage);
                self.transition(ActivationState::Idle);
            }
        }

        self.manage_max_tab_count();
    }

    /// Bind a live page for `tab_id` as the active page.
    ///
    /// Refused before the model has loaded unless `force` is set. Returns
    /// true only when a new page was created.
    pub fn activate_page(&mut self, tab_id: TabId, force: bool) -> bool {
        if !(self.model.loaded() || force) {
            tracing::debug!(tab_id = tab_id, "Activation refused before tab model loaded");
            return false;
        }
        if let Err(e) = self.pool.initialize() {
            tracing::warn!(tab_id = tab_id, error = %e, "Page pool unavailable");
            return false;
        }

        self.transition(ActivationState::Activating);

        let parent_tab_id = self
            .model
            .get(tab_id)
            .map(|t| t.parent_tab_id)
            .unwrap_or_else(|| self.model.new_tab_parent_id());

        let activation = match self.pool.activate(tab_id, parent_tab_id) {
            Ok(activation) => activation,
            Err(e) => {
                tracing::warn!(tab_id = tab_id, error = %e, "Failed to activate page");
                self.transition(ActivationState::Idle);
                return false;
            }
        };

        if let Some(previous) = self.active_tab.filter(|id| *id != tab_id) {
            if let Some(page) = self.pool.page_mut(previous) {
                page.set_visible(false);
            }
        }
        let foreground = self.foreground;
        if let Some(page) = self.pool.page_mut(tab_id) {
            page.set_visible(foreground);
        }
        self.pool.observe(tab_id);
        self.set_active_tab(Some(tab_id));

        let progress = self.pool.page(tab_id).map(|p| p.load_progress()).unwrap_or(0);
        self.set_load_progress(progress);
        self.notify_page_changed();

        tracing::debug!(
            tab_id = tab_id,
            created = activation.created(),
            live_count = self.pool.live_count(),
            "Activated page"
        );

        if activation.created() {
            self.manage_max_tab_count();
        }
        activation.created()
    }

    /// Destroy the live page of `tab_id`, virtualizing it or forgetting it.
    pub fn release_page(&mut self, tab_id: TabId, virtualize: bool) {
        self.pool.release(tab_id, virtualize);

        if self.is_active_tab(tab_id) {
            self.set_active_tab(None);
            self.notify_page_changed();
            self.set_thumbnail_path(None);
        }

        if !virtualize {
            self.model.reset_new_tab_data();
        }
    }

    /// Virtualize surplus pages around the active one.
    pub fn manage_max_tab_count(&mut self) {
        if !self.pool.initialized() {
            return;
        }
        let order = self.model.tab_ids();
        let active = self.active_tab.unwrap_or_else(|| self.model.active_tab_id());
        self.pool
            .enforce_max_live(&order, active, self.max_live_tab_count);
    }

    fn on_model_loaded(&mut self) {
        // With tabs, the active tab change already bound a page
        if self.active_tab.is_none() {
            let placeholder = self.model.next_tab_id();
            self.activate_page(placeholder, true);
            self.transition(ActivationState::Idle);
        }
        if self.ready_to_load {
            self.on_ready_to_load();
        }
    }

    // === Loading ===

    pub fn set_ready_to_load(&mut self, ready: bool) {
        if self.ready_to_load == ready {
            return;
        }
        self.ready_to_load = ready;
        self.events.push(ContainerEvent::ReadyToLoadChanged(ready));
        if ready {
            self.on_ready_to_load();
        }
        self.pump();
    }

    fn on_ready_to_load(&mut self) {
        if !self.ready_to_load || !self.model.loaded() {
            return;
        }

        if let Some(intent) = self.model.new_tab_data().cloned() {
            self.load(&intent.url, &intent.title);
        } else if let Some(tab) = self.model.active_tab() {
            let (url, title) = (tab.url.clone(), tab.title.clone());
            self.model.reset_new_tab_data();
            self.trigger_load(&url, &title);
        } else {
            let home_page = self.config.home_page.clone();
            self.trigger_load(&home_page, "");
        }
    }

    fn trigger_load(&mut self, url: &str, title: &str) {
        self.events.push(ContainerEvent::TriggerLoad {
            url: url.to_string(),
            title: title.to_string(),
        });
        self.load(url, title);
    }

    /// Navigate to `url`.
    ///
    /// With a new tab intent pending, or no tabs at all, the page for the
    /// next tab id takes the load and its first URL change creates the tab.
    pub fn load(&mut self, url: &str, title: &str) {
        if !self.model.loaded() {
            tracing::debug!(url = %url, "Load refused before tab model loaded");
            return;
        }
        if url.is_empty() {
            return;
        }

        let target = if self.model.has_new_tab_data() || self.model.count() == 0 {
            self.model.next_tab_id()
        } else {
            self.model.active_tab_id()
        };

        if !self.is_active_tab(target) {
            self.activate_page(target, true);
        }
        let Some(page) = self.pool.page_mut(target) else {
            tracing::debug!(tab_id = target, url = %url, "No live page to load into");
            self.transition(ActivationState::Idle);
            return;
        };

        page.navigate(url);
        tracing::info!(tab_id = target, url = %url, "Loading");

        if !title.is_empty() && self.model.get(target).is_some_and(|t| t.title.is_empty()) {
            if let Err(e) = self.model.update_title(target, title) {
                tracing::warn!(tab_id = target, error = %e, "Failed to store title");
            }
        }

        self.transition(ActivationState::Loading);
        self.set_load_progress(0);
        self.pump();
    }

    // === Back / forward ===

    pub fn go_back(&mut self) {
        self.navigate_history(Direction::Back);
    }

    pub fn go_forward(&mut self) {
        self.navigate_history(Direction::Forward);
    }

    fn navigate_history(&mut self, direction: Direction) {
        let Some(tab_id) = self.active_tab else {
            return;
        };
        let allowed = match direction {
            Direction::Back => self.can_go_back.get(),
            Direction::Forward => self.can_go_forward.get(),
        };
        if !allowed || !self.model.contains(tab_id) {
            return;
        }

        self.model.set_back_forward_navigation(true);
        let step = match direction {
            Direction::Back => self.model.go_back(tab_id),
            Direction::Forward => self.model.go_forward(tab_id),
        };

        // Moving one way always makes the other way possible
        match direction {
            Direction::Back => {
                let back = step.as_ref().is_some_and(|s| s.previous_link > 0);
                self.set_optimistic_flags(back, true);
            }
            Direction::Forward => {
                let forward = step.as_ref().is_some_and(|s| s.next_link > 0);
                self.set_optimistic_flags(true, forward);
            }
        }

        let engine_has_history = self
            .pool
            .page(tab_id)
            .map(|p| match direction {
                Direction::Back => p.can_go_back(),
                Direction::Forward => p.can_go_forward(),
            })
            .unwrap_or(false);

        if engine_has_history {
            if let Some(page) = self.pool.page_mut(tab_id) {
                match direction {
                    Direction::Back => page.go_back(),
                    Direction::Forward => page.go_forward(),
                }
            }
            self.transition(ActivationState::Loading);
        } else {
            match step {
                // Replay persisted history into a page that has none
                Some(step) if step.url != "about:blank" => {
                    tracing::debug!(tab_id = tab_id, url = %step.url, "Replaying persisted history");
                    self.load(&step.url, &step.title);
                }
                _ => self.model.set_back_forward_navigation(false),
            }
        }

        self.pump();
    }

    fn set_optimistic_flags(&mut self, back: bool, forward: bool) {
        if self.can_go_back.set_optimistic(back) {
            self.events.push(ContainerEvent::CanGoBackChanged(back));
        }
        if self.can_go_forward.set_optimistic(forward) {
            self.events.push(ContainerEvent::CanGoForwardChanged(forward));
        }
    }

    fn confirm_navigation_flags(&mut self, back: bool, forward: bool) {
        if self.can_go_back.confirm(back) {
            self.events.push(ContainerEvent::CanGoBackChanged(back));
        }
        if self.can_go_forward.confirm(forward) {
            self.events.push(ContainerEvent::CanGoForwardChanged(forward));
        }
    }

    // === Page events ===

    /// Deliver an engine event from the page bound to `tab_id`.
    pub fn handle_page_event(&mut self, tab_id: TabId, event: PageEvent) {
        if !self.pool.is_observed(tab_id) {
            tracing::debug!(tab_id = tab_id, event = ?event, "Event from detached page");
            return;
        }
        let active = self.is_active_tab(tab_id);

        match event {
            PageEvent::UrlChanged => self.on_page_url_changed(tab_id, active),
            PageEvent::TitleChanged => {
                let title = self.pool.page(tab_id).map(|p| p.title()).unwrap_or_default();
                if let Err(e) = self.model.update_title(tab_id, &title) {
                    tracing::warn!(tab_id = tab_id, error = %e, "Failed to store title");
                }
                if active {
                    self.events.push(ContainerEvent::TitleChanged(title));
                }
            }
            PageEvent::LoadProgressChanged(progress) => {
                if active {
                    self.set_load_progress(progress.min(100));
                    if progress >= 100 {
                        self.finish_loading();
                    }
                }
            }
            PageEvent::ContentHeightChanged => {
                if active {
                    let height = self.content_height();
                    self.events.push(ContainerEvent::ContentHeightChanged(height));
                }
            }
            PageEvent::DomContentLoaded => {
                if active {
                    self.finish_loading();
                    self.model.request_active_thumbnail();
                }
            }
            PageEvent::WindowCloseRequested => self.close_window(tab_id),
            PageEvent::NewWindowRequested { url, title } => {
                self.model.request_new_tab(&url, &title, tab_id)
            }
            PageEvent::ImeStateChanged { opened, by_pointer } => {
                // Only a pointer tap opens the panel, script focus does not
                if active && opened && by_pointer && self.foreground {
                    self.set_input_panel_visible(true);
                }
            }
        }

        self.pump();
    }

    fn on_page_url_changed(&mut self, tab_id: TabId, active: bool) {
        let Some(page) = self.pool.page(tab_id) else {
            return;
        };
        let url = page.url();
        let (engine_back, engine_forward) = (page.can_go_back(), page.can_go_forward());

        if let Err(e) = self.model.update_url(tab_id, &url) {
            tracing::warn!(tab_id = tab_id, url = %url, error = %e, "Failed to store URL");
        }

        if active {
            if let Some(tab) = self.model.get(tab_id) {
                let back = tab.can_go_back() || engine_back;
                let forward = tab.can_go_forward() || engine_forward;
                self.confirm_navigation_flags(back, forward);
            }
            self.events.push(ContainerEvent::UrlChanged(url));
        }
    }

    fn finish_loading(&mut self) {
        if self.state == ActivationState::Loading {
            self.transition(ActivationState::Idle);
        }
    }

    /// Script asked to close its window. Only tabs opened by another tab
    /// may close themselves; the opener becomes active.
    pub fn close_window(&mut self, tab_id: TabId) {
        let parent_tab_id = match self.pool.parent_of(tab_id) {
            NO_TAB => self
                .model
                .get(tab_id)
                .map(|t| t.parent_tab_id)
                .unwrap_or(NO_TAB),
            parent => parent,
        };

        if parent_tab_id == NO_TAB {
            tracing::debug!(tab_id = tab_id, "Ignoring close request from user-opened tab");
            return;
        }

        tracing::info!(tab_id = tab_id, parent_tab_id = parent_tab_id, "Closing script-opened tab");
        self.model.activate_tab_by_id(parent_tab_id);
        self.model.remove_tab_by_id(tab_id);
        self.pump();
    }

    // === New tab bridging ===

    fn on_new_tab_requested(&mut self, request: NewTabRequest) {
        if self.foreground {
            let previous = self
                .active_tab
                .unwrap_or_else(|| self.model.active_tab_id());
            self.model.set_new_tab_data(
                &request.url,
                &request.title,
                previous,
                request.parent_tab_id,
            );
            self.trigger_load(&request.url, &request.title);
        } else {
            // No live page may appear while nobody can see it
            if let Some(tab_id) = self.active_tab {
                if let Some(page) = self.pool.page_mut(tab_id) {
                    page.set_visible(false);
                }
                self.set_active_tab(None);
            }
            tracing::debug!(url = %request.url, "Deferring new tab request while in background");
            self.deferred.push(request);
        }
    }

    pub fn pending_new_tab_requests(&self) -> usize {
        self.deferred.len()
    }

    /// A load in a new tab turned out to be a download: drop the tab's page
    /// and go back to the page the request came from.
    pub fn on_download_started(&mut self) {
        let Some(active) = self.active_tab else {
            return;
        };
        if !self.model.has_new_tab_data() || self.model.count() == 0 {
            return;
        }

        let previous = self.model.new_tab_previous_tab();
        self.release_page(active, false);
        if previous != NO_TAB {
            self.activate_page(previous, false);
            self.transition(ActivationState::Idle);
        }
        self.pump();
    }

    // === Lifecycle ===

    pub fn set_foreground(&mut self, foreground: bool) {
        if self.foreground == foreground {
            return;
        }
        self.foreground = foreground;
        self.events.push(ContainerEvent::ForegroundChanged(foreground));

        if foreground {
            // The keyboard may have closed while a dialog covered us
            if self.input_panel_height == 0.0 && self.input_panel_visible {
                self.set_input_panel_visible(false);
            }
            for request in self.deferred.drain() {
                self.on_new_tab_requested(request);
            }
        }
        self.pump();
    }

    pub fn set_popup_active(&mut self, active: bool) {
        self.popup_active = active;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn window_visibility_changed(&mut self, visible: bool, now: Instant) {
        self.window_visible = visible;
        self.debouncer.record(visible, now);
    }

    /// Apply a visibility change that has settled. Returns whether the
    /// background state changed.
    pub fn poll_visibility(&mut self, now: Instant) -> bool {
        let Some(visible) = self.debouncer.poll(now, !self.background) else {
            return false;
        };
        if visible != self.window_visible {
            return false;
        }

        self.background = !visible;
        self.events.push(ContainerEvent::BackgroundChanged(self.background));
        self.set_foreground(visible);
        true
    }

    pub fn set_input_panel_height(&mut self, height: f64) {
        if self.input_panel_height == height {
            return;
        }
        self.input_panel_height = height;

        if self.foreground {
            let open_height = self.config.input_panel_height(self.viewport.portrait);
            if height == 0.0 {
                self.set_input_panel_visible(false);
            } else if height == open_height {
                self.set_input_panel_visible(true);
            }
        }

        self.events.push(ContainerEvent::InputPanelHeightChanged(height));
    }

    fn set_input_panel_visible(&mut self, visible: bool) {
        if self.input_panel_visible != visible {
            self.input_panel_visible = visible;
            self.events.push(ContainerEvent::InputPanelVisibleChanged(visible));
        }
    }

    pub fn set_max_live_tab_count(&mut self, count: usize) {
        let count = count.max(1);
        if self.max_live_tab_count == count {
            return;
        }
        self.max_live_tab_count = count;
        self.events.push(ContainerEvent::MaxLiveTabCountChanged(count));
        self.manage_max_tab_count();
    }

    // === Thumbnails ===

    /// Snapshot the active page, when it is loaded and visible.
    pub fn capture_screen(&mut self) {
        let Some(tab_id) = self.active_tab else {
            return;
        };
        let Some(page) = self.pool.page(tab_id) else {
            return;
        };
        if !self.viewport.window_active || !page.dom_content_loaded() || self.popup_active {
            tracing::debug!(tab_id = tab_id, "Skipping capture of hidden or loading page");
            return;
        }
        let Some(image) = page.grab_surface() else {
            return;
        };

        self.capturer.start(CaptureRequest {
            url: page.url(),
            image,
            crop: CropRect::square(self.viewport.thumbnail_size()),
            tab_id,
            rotate: self.viewport.rotation,
        });
    }

    fn update_thumbnail(&mut self) {
        let active = self.model.active_tab_id();
        if active != NO_TAB && self.is_active_tab(active) {
            self.capture_screen();
        }
    }

    /// Apply finished captures without waiting.
    pub fn process_captures(&mut self) {
        while let Some(result) = self.capturer.try_next() {
            self.screen_capture_ready(result);
        }
    }

    /// Wait for the capture in flight and apply it. Returns false when none
    /// was running.
    pub async fn wait_for_capture(&mut self) -> bool {
        match self.capturer.next().await {
            Some(result) => {
                self.screen_capture_ready(result);
                true
            }
            None => false,
        }
    }

    fn screen_capture_ready(&mut self, result: Result<ScreenCapture>) {
        let capture = match result {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(error = %e, "Thumbnail capture failed");
                return;
            }
        };

        let path = capture.path.to_string_lossy().into_owned();
        if self.is_active_tab(capture.tab_id) {
            // Shown right away, the store round trip comes later
            self.set_thumbnail_path(Some(path.clone()));
        }
        self.pool.set_thumbnail(capture.tab_id, Some(path.clone()));

        let key = strip_fragment(&capture.url);
        if let Err(e) = self
            .model
            .store()
            .update_thumb_path(&key, &path, capture.tab_id)
        {
            tracing::warn!(tab_id = capture.tab_id, error = %e, "Failed to store thumbnail path");
        }
        self.pump();
    }

    fn on_page_thumbnail_changed(&mut self, _url: &str, path: &str, tab_id: TabId) {
        if self.is_active_tab(tab_id) {
            self.set_thumbnail_path((!path.is_empty()).then(|| path.to_string()));
        }
        self.model.update_thumbnail_path(tab_id, path);
    }

    pub fn dump_pages(&self) -> Vec<PageSummary> {
        self.pool.dump_pages()
    }

    // === Helpers ===

    fn active_page_value(
        &self,
        from_page: impl Fn(&dyn skiff_pages::WebPage) -> String,
        from_tab: impl Fn(&skiff_tabs::TabRecord) -> String,
    ) -> String {
        if let Some(page) = self.active_tab.and_then(|id| self.pool.page(id)) {
            return from_page(page);
        }
        self.model.active_tab().map(from_tab).unwrap_or_default()
    }

    fn notify_page_changed(&mut self) {
        let (url, title) = (self.url(), self.title());
        self.events.push(ContainerEvent::UrlChanged(url));
        self.events.push(ContainerEvent::TitleChanged(title));
    }

    fn set_active_tab(&mut self, tab_id: Option<TabId>) {
        if self.active_tab != tab_id {
            self.active_tab = tab_id;
            self.events.push(ContainerEvent::ActiveTabChanged(tab_id));
        }
    }

    fn set_load_progress(&mut self, progress: u8) {
        if self.load_progress != progress {
            self.load_progress = progress;
            self.events.push(ContainerEvent::LoadProgressChanged(progress));
        }
    }

    fn set_thumbnail_path(&mut self, path: Option<String>) {
        if self.thumbnail_path != path {
            self.thumbnail_path = path.clone();
            self.events.push(ContainerEvent::ThumbnailPathChanged(path));
        }
    }

    fn transition(&mut self, target: ActivationState) {
        if self.state == target {
            return;
        }
        if !self.state.can_transition_to(target) {
            tracing::debug!(from = %self.state, to = %target, "Ignoring invalid transition");
            return;
        }
        tracing::debug!(from = %self.state, to = %target, "Activation state");
        self.state = target;
        self.events.push(ContainerEvent::StateChanged(target));
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        // The capture reads page pixels; it must finish before pages go
        self.capturer.cancel_and_wait();
        self.pool.clear();
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Back,
    Forward,
}

/// Thumbnails are keyed by URL without fragment.
fn strip_fragment(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.fragment().is_some() => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_size() {
        let mut viewport = Viewport {
            screen_width: 800,
            toolbar_height: 60,
            ..Viewport::default()
        };
        assert_eq!(viewport.thumbnail_size(), 800);

        viewport.portrait = false;
        assert_eq!(viewport.thumbnail_size(), 740);

        viewport.full_screen = true;
        assert_eq!(viewport.thumbnail_size(), 800);
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(
            strip_fragment("https://example.com/page#section"),
            "https://example.com/page"
        );
        assert_eq!(strip_fragment("https://example.com"), "https://example.com");
        assert_eq!(strip_fragment("not a url#x"), "not a url#x");
    }
}
