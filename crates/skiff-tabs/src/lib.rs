//! Skiff Tab Model
//!
//! Persisted tab metadata and the ordered tab model the web container
//! drives. A tab here is only metadata: whether a rendering engine page
//! currently backs it is decided by the live page pool.

mod error;
mod history;
mod memory;
mod model;
mod sqlite;
mod store;
mod tab;

pub use error::TabError;
pub use history::{HistoryStep, TabHistory};
pub use memory::MemoryTabStore;
pub use model::{NewTabIntent, TabModel, TabModelEvent};
pub use sqlite::SqliteTabStore;
pub use store::{StoreEvent, TabStore};
pub use tab::{TabId, TabRecord, NO_TAB};

pub type Result<T> = std::result::Result<T, TabError>;
