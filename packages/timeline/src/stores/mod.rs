//! Storage implementations for the timeline library.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)
//! - `SqliteStore` - SQLite file-based storage (requires `sqlite` feature)
//!
//! [`TimelineStore`] layers the curated-timeline layout on top of either.

pub mod memory;
pub mod timeline;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
pub use timeline::{timeline_to_json, TimelineStore};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
