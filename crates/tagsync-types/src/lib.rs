//! Shared tagsync model types.
//!
//! Query descriptors, transient record shapes and the cursor/session
//! vocabulary used by both the state and engine crates.

#![warn(clippy::pedantic)]

pub mod query;
pub mod record;
pub mod state;

pub use query::{ActivityTypeQuery, ActivityTypeStrategy, QueryIdentity, SqlCapabilities, TagQuery};
pub use record::{ActivityTypeRecord, MarkedRecord, TagRecord};
pub use state::{CursorKeyspace, SessionId, SyncKind};
