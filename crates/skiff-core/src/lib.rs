//! Skiff Core
//!
//! The web container: keeps a bounded set of live engine pages in step
//! with an unbounded, persisted tab list.

mod config;
mod container;
mod error;
mod lifecycle;
mod nav;
mod state;
mod thumbnail;

pub use config::Config;
pub use container::{Container, ContainerEvent, Viewport};
pub use error::CoreError;
pub use lifecycle::{DeferredRequests, NewTabRequest, VisibilityDebouncer};
pub use nav::{Phase, TwoPhase};
pub use state::ActivationState;
pub use thumbnail::{
    save_to_file, thumbnail_path, CaptureRequest, CropRect, ScreenCapture, ThumbnailCapturer,
};

// Re-export the layers below
pub use skiff_pages::{
    Activation, LivePagePool, PageEvent, PageFactory, PageSeed, PageSummary, PoolError, WebPage,
};
pub use skiff_storage::{Database, StorageError};
pub use skiff_tabs::{
    MemoryTabStore, SqliteTabStore, StoreEvent, TabError, TabId, TabModel, TabModelEvent,
    TabRecord, TabStore, NO_TAB,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
