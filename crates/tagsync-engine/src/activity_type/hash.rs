//! Whole-set activity-type sync keyed by a content hash.
//!
//! The full result set is fetched on every call and compared with the hash
//! of the last delivered set. A resync also happens once the last one is
//! older than the configured maximum age, so a hash collision cannot hide
//! drift forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tagsync_state::StateBackend;
use tagsync_types::{ActivityTypeQuery, ActivityTypeRecord};

use crate::catalog::CatalogApi;
use crate::database::Database;
use crate::error::{Result, SyncError};
use crate::result::SyncReport;

pub const HASH_KEY: &str = "ACTIVITY_TYPES_HASH";
pub const LAST_SYNC_KEY: &str = "ACTIVITY_TYPES_LAST_SYNC";

pub struct ActivityTypeHashEngine {
    database: Arc<dyn Database>,
    catalog: Arc<dyn CatalogApi>,
    state: Arc<dyn StateBackend>,
    max_age: Duration,
}

impl ActivityTypeHashEngine {
    #[must_use]
    pub fn new(
        database: Arc<dyn Database>,
        catalog: Arc<dyn CatalogApi>,
        state: Arc<dyn StateBackend>,
        max_age: Duration,
    ) -> Self {
        Self {
            database,
            catalog,
            state,
            max_age,
        }
    }

    /// Send the whole set in one session if it changed or went stale.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the fetch, a catalog call or a state
    /// write fails. Hash and timestamp are only written after the session
    /// completes.
    pub fn sync(&self, query: &ActivityTypeQuery) -> Result<SyncReport> {
        let records = super::fetch(self.database.as_ref(), query, None, query.skipped_codes())?;
        let hash = content_hash(&records);

        let unchanged = self.state.get_string(HASH_KEY)?.as_deref() == Some(hash.as_str());
        let stale = self.is_stale()?;
        if unchanged && !stale {
            tracing::debug!(records = records.len(), "Activity types unchanged, skipping sync");
            return Ok(SyncReport::default());
        }

        let session = self
            .catalog
            .start_session()
            .map_err(|e| SyncError::Transport(e.context("start sync session")))?;
        tracing::info!(
            records = records.len(),
            session = %session,
            changed = !unchanged,
            "Sending activity types to sync"
        );
        self.catalog
            .sync_activity_types(&records, Some(&session))
            .map_err(|e| SyncError::Transport(e.context("sync activity types")))?;
        self.catalog
            .complete_session(&session)
            .map_err(|e| SyncError::Transport(e.context("complete sync session")))?;

        self.state.put_i64(LAST_SYNC_KEY, Utc::now().timestamp_millis())?;
        self.state.put_string(HASH_KEY, &hash)?;
        Ok(SyncReport::batch(records.len()))
    }

    /// Hash-based sync has no slow loop: every [`sync`](Self::sync) is a
    /// full re-check already.
    pub fn refresh(&self, _query: &ActivityTypeQuery) -> SyncReport {
        tracing::info!("There is no slow loop for activity type sync using hashing. Skipping...");
        SyncReport::default()
    }

    /// True when never synced or synced longer than `max_age` ago.
    fn is_stale(&self) -> Result<bool> {
        let Some(last_sync) = self.state.get_i64(LAST_SYNC_KEY)? else {
            return Ok(true);
        };
        let max_age_ms = i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX);
        Ok(Utc::now().timestamp_millis().saturating_sub(last_sync) > max_age_ms)
    }
}

/// SHA-256 over the concatenated code and description of every record.
#[must_use]
pub fn content_hash(records: &[ActivityTypeRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.code.as_bytes());
        hasher.update(record.description.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
