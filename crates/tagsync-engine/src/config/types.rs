//! Raw configuration document shapes and engine settings.
//!
//! Every document field is optional at the serde level so that the
//! validator can report all missing fields of a file in one pass instead
//! of stopping at the first deserialization error.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_BATCH_DELAY_MS: u64 = 500;
const DEFAULT_ACTIVITY_TYPE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

/// One tag query document as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TagQueryDoc {
    pub name: Option<String>,
    pub sql: Option<String>,
    pub initial_sync_marker: Option<String>,
    pub skipped_ids: Option<Vec<String>>,
    pub continuous_resync: Option<bool>,
}

/// The activity-type query document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActivityTypeQueryDoc {
    pub sql: Option<String>,
    pub initial_sync_marker: Option<String>,
    pub skipped_codes: Option<Vec<String>>,
}

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SyncSettings {
    /// Pause between batches of one drain, in milliseconds.
    pub batch_delay_ms: u64,
    /// Force a full activity-type resync once the last one is this old.
    pub activity_type_max_age_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            activity_type_max_age_secs: DEFAULT_ACTIVITY_TYPE_MAX_AGE_SECS,
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    #[must_use]
    pub fn activity_type_max_age(&self) -> Duration {
        Duration::from_secs(self.activity_type_max_age_secs)
    }
}
