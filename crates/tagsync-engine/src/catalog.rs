//! Remote catalog collaborator.
//!
//! HTTP transport and authentication are provided by the host process.
//! Every upsert must be idempotent by business key (tag name, activity
//! type code): a batch is redelivered when a crash lands between the push
//! and the cursor write.

use anyhow::Result;
use tagsync_types::{ActivityTypeRecord, SessionId, TagRecord};

/// Upsert and session calls against the remote tag / activity-type catalog.
pub trait CatalogApi: Send + Sync {
    /// Upsert a batch of tags.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog rejects or cannot receive the batch.
    fn upsert_tags(&self, batch: &[TagRecord]) -> Result<()>;

    /// Open a sync session grouping several activity-type batches.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog cannot open a session.
    fn start_session(&self) -> Result<SessionId>;

    /// Push activity types, optionally tagged with an open session.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog rejects or cannot receive the batch.
    fn sync_activity_types(
        &self,
        batch: &[ActivityTypeRecord],
        session: Option<&SessionId>,
    ) -> Result<()>;

    /// Close a session; activity types not seen in it may be retired remotely.
    ///
    /// # Errors
    ///
    /// Returns an error when the catalog cannot complete the session.
    fn complete_session(&self, session: &SessionId) -> Result<()>;
}
