//! Skiff Storage Layer
//!
//! SQLite-based persistence for tab records, per-tab history and settings.

mod database;
mod error;
mod migrations;

pub use database::Database;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
