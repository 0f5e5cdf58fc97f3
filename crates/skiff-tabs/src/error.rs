//! Tab error types

use thiserror::Error;

use crate::tab::TabId;

#[derive(Error, Debug)]
pub enum TabError {
    #[error("Tab not found: {0}")]
    NotFound(TabId),

    #[error("Invalid tab id: {0}")]
    InvalidTabId(TabId),

    #[error("Storage error: {0}")]
    Storage(#[from] skiff_storage::StorageError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
