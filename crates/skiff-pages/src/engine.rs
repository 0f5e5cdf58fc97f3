//! Rendering engine collaborator
//!
//! The engine itself (loading, rendering, DOM, network) lives outside this
//! workspace. These traits are the whole surface the pool and the web
//! container rely on.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use skiff_tabs::TabId;

use crate::Result;

/// One engine rendering context, bound to a single tab while live.
pub trait WebPage: Send {
    fn tab_id(&self) -> TabId;

    fn url(&self) -> String;

    fn title(&self) -> String;

    /// 0..=100
    fn load_progress(&self) -> u8;

    fn content_height(&self) -> f64;

    fn dom_content_loaded(&self) -> bool;

    /// Whether the engine's own session history can go back.
    fn can_go_back(&self) -> bool;

    fn can_go_forward(&self) -> bool;

    fn navigate(&mut self, url: &str);

    fn go_back(&mut self);

    fn go_forward(&mut self);

    fn set_visible(&mut self, visible: bool);

    /// Snapshot of the rendered surface, if the page has painted.
    fn grab_surface(&self) -> Option<RgbaImage>;
}

/// What a virtualized tab keeps so its page can be rebuilt later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSeed {
    pub url: String,
    pub title: String,
    pub thumbnail_path: Option<String>,
}

/// Creates and destroys engine pages. Creation is expensive; the pool
/// calls it only for tabs without a live page.
pub trait PageFactory: Send {
    /// Prepare the engine. Safe to call repeatedly.
    fn initialize(&mut self) -> Result<()>;

    fn is_ready(&self) -> bool;

    /// Build a page for `tab_id`. With a seed, the page starts at the
    /// seed's URL.
    fn create_page(
        &mut self,
        tab_id: TabId,
        parent_tab_id: TabId,
        seed: Option<&PageSeed>,
    ) -> Result<Box<dyn WebPage>>;

    /// Release every engine resource held by `page`.
    fn destroy_page(&mut self, page: Box<dyn WebPage>);
}

/// Notifications a live page delivers to the web container.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    UrlChanged,
    TitleChanged,
    LoadProgressChanged(u8),
    ContentHeightChanged,
    DomContentLoaded,
    /// `window.close()` from page script
    WindowCloseRequested,
    /// `window.open()` or a target=_blank link
    NewWindowRequested { url: String, title: String },
    ImeStateChanged { opened: bool, by_pointer: bool },
}
