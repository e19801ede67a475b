//! Source database collaborator.
//!
//! The driver and connection pool live outside the engine. Implementations
//! bind the named placeholders (`:previous_sync_marker`, `:skipped_ids`,
//! `:skipped_codes`) and map result columns onto the record shapes.

use anyhow::Result;
use tagsync_types::{ActivityTypeQuery, ActivityTypeRecord, TagRecord};

/// Row source for tag and activity-type queries.
///
/// Calls are synchronous and may block on the network.
pub trait Database: Send + Sync {
    /// Run a tag query for rows beyond `marker`, skipping `exclude_ids`.
    ///
    /// Rows must come back in ascending marker order.
    ///
    /// # Errors
    ///
    /// Returns an error when the query cannot be executed or mapped.
    fn fetch_tag_rows(
        &self,
        sql: &str,
        marker: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<TagRecord>>;

    /// Run the activity-type query.
    ///
    /// `marker` is `None` for queries without a marker column, in which
    /// case the full result set is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the query cannot be executed or mapped.
    fn fetch_activity_type_rows(
        &self,
        query: &ActivityTypeQuery,
        marker: Option<&str>,
        exclude_codes: &[String],
    ) -> Result<Vec<ActivityTypeRecord>>;

    /// Cheap liveness probe.
    fn ping(&self) -> bool;
}
