//! Page pool error types

use thiserror::Error;

use skiff_tabs::TabId;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Page factory not initialized")]
    NotInitialized,

    #[error("Invalid tab id: {0}")]
    InvalidTabId(TabId),

    #[error("No live page for tab {0}")]
    EngineUnavailable(TabId),

    #[error("Failed to create page for tab {tab_id}: {reason}")]
    CreateFailed { tab_id: TabId, reason: String },
}
