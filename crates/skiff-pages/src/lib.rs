//! Skiff Live Pages
//!
//! A tab list can be arbitrarily long, but only a handful of tabs may hold
//! a rendering engine page at once. `LivePagePool` owns those pages, creates
//! them on activation and virtualizes the surplus back to plain metadata.

mod engine;
mod error;
mod pool;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::{PageEvent, PageFactory, PageSeed, WebPage};
pub use error::PoolError;
pub use pool::{Activation, LivePagePool, PageSummary};

pub use skiff_tabs::{TabId, NO_TAB};

pub type Result<T> = std::result::Result<T, PoolError>;
