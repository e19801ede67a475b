//! Activity-type synchronization strategies.
//!
//! Which engine handles a query is fixed when the query is parsed: see
//! [`ActivityTypeQuery::strategy`](tagsync_types::ActivityTypeQuery::strategy).

pub mod hash;
pub mod marker;

pub use hash::ActivityTypeHashEngine;
pub use marker::ActivityTypeMarkerEngine;

use tagsync_types::{ActivityTypeQuery, ActivityTypeRecord};

use crate::database::Database;
use crate::error::{Result, SyncError};

fn fetch(
    database: &dyn Database,
    query: &ActivityTypeQuery,
    marker: Option<&str>,
    exclude_codes: &[String],
) -> Result<Vec<ActivityTypeRecord>> {
    database
        .fetch_activity_type_rows(query, marker, exclude_codes)
        .map_err(|e| SyncError::Transport(e.context("fetch activity types")))
}
