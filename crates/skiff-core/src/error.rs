//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] skiff_storage::StorageError),

    #[error("Tab error: {0}")]
    Tab(#[from] skiff_tabs::TabError),

    #[error("Page pool error: {0}")]
    Pool(#[from] skiff_pages::PoolError),

    #[error("Failed to write thumbnail {path}: {reason}")]
    ThumbnailWriteFailed { path: PathBuf, reason: String },

    #[error("Thumbnail capture cancelled")]
    CaptureCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container not initialized")]
    NotInitialized,
}
