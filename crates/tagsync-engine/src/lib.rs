//! Incremental SQL-to-catalog synchronization engine.
//!
//! Tag and activity-type rows produced by operator-supplied SQL are pushed
//! to a remote catalog in marker order. Persisted cursors make every run
//! resumable; a hot-reloaded query configuration cancels runs whose query
//! changed underneath them.

#![warn(clippy::pedantic)]

pub mod activity_type;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod database;
pub mod drain;
pub mod error;
pub mod format;
pub mod result;
pub mod tag_sync;

#[cfg(test)]
pub(crate) mod testing;

// Re-export public API for convenience
pub use activity_type::{ActivityTypeHashEngine, ActivityTypeMarkerEngine};
pub use catalog::CatalogApi;
pub use config::{ConfigListener, ConfigSource, SyncSettings};
pub use coordinator::SyncCoordinator;
pub use cursor::{CursorPosition, CursorQuery, CursorStore};
pub use database::Database;
pub use drain::{DrainLoop, Drained, Interrupt};
pub use error::{ConfigError, SyncError};
pub use result::{RunOutcome, SyncReport};
pub use tag_sync::TagSyncEngine;
