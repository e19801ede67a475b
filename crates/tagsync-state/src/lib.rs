//! Sync state persistence for tagsync.
//!
//! Provides the [`StateBackend`] key-value contract with a
//! [`SqliteStateBackend`] for durable cursors and sessions and an
//! [`InMemoryStateBackend`] for tests and dry runs.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod sqlite;

pub use backend::StateBackend;
pub use error::{Result, StateError};
pub use memory::InMemoryStateBackend;
pub use sqlite::SqliteStateBackend;
