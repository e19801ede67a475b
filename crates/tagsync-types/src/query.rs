//! Query descriptors.
//!
//! A query is immutable once parsed. Its [`QueryIdentity`] is derived from
//! the SQL text, the initial marker and the exclusion list only; the tag
//! query name and resync flag are deliberately left out so that renaming a
//! query keeps its persisted cursor.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder bound to the last persisted marker.
pub const PREVIOUS_MARKER_PARAM: &str = ":previous_sync_marker";
/// Placeholder bound to the tag ids to skip.
pub const SKIPPED_IDS_PARAM: &str = ":skipped_ids";
/// Placeholder bound to the activity-type codes to skip.
pub const SKIPPED_CODES_PARAM: &str = ":skipped_codes";
/// Output column carrying the marker of an activity-type row.
pub const SYNC_MARKER_COLUMN: &str = "sync_marker";

/// Number of digest bytes kept in an identity key.
const IDENTITY_BYTES: usize = 8;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable key under which a query's sync state is persisted.
///
/// Any edit of the SQL text, whitespace included, yields a new identity
/// and therefore restarts the query from its initial marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryIdentity(String);

impl QueryIdentity {
    /// Derive the identity of `(sql, initial_marker, excluded)`.
    #[must_use]
    pub fn derive(sql: &str, initial_marker: &str, excluded: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        hasher.update([0u8]);
        hasher.update(initial_marker.as_bytes());
        for value in excluded {
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
        }
        let digest = hasher.finalize();
        let hex = digest[..IDENTITY_BYTES]
            .iter()
            .fold(String::with_capacity(IDENTITY_BYTES * 2), |mut acc, b| {
                acc.push_str(&format!("{b:02x}"));
                acc
            });
        Self(hex)
    }

    /// Borrow the inner key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tag queries
// ---------------------------------------------------------------------------

/// A named tag query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub name: String,
    pub sql: String,
    pub initial_sync_marker: String,
    pub skipped_ids: Vec<String>,
    /// Walk the whole result set again in the background once drained.
    pub continuous_resync: bool,
}

impl TagQuery {
    /// Build a tag query with continuous resync enabled.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        sql: impl Into<String>,
        initial_sync_marker: impl Into<String>,
        skipped_ids: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            initial_sync_marker: initial_sync_marker.into(),
            skipped_ids,
            continuous_resync: true,
        }
    }

    #[must_use]
    pub fn with_continuous_resync(mut self, enabled: bool) -> Self {
        self.continuous_resync = enabled;
        self
    }

    #[must_use]
    pub fn identity(&self) -> QueryIdentity {
        QueryIdentity::derive(&self.sql, &self.initial_sync_marker, &self.skipped_ids)
    }
}

// ---------------------------------------------------------------------------
// Activity-type queries
// ---------------------------------------------------------------------------

/// How activity types are kept in sync with the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTypeStrategy {
    /// Whole-set comparison by content hash.
    Hash,
    /// Incremental, session-scoped batches ordered by `sync_marker`.
    Marker,
}

impl ActivityTypeStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::Marker => "marker",
        }
    }
}

impl fmt::Display for ActivityTypeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Placeholder usage detected in activity-type SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SqlCapabilities {
    pub marker_column: bool,
    pub previous_marker_param: bool,
    pub skipped_codes_param: bool,
}

impl SqlCapabilities {
    /// Scan `sql` for the activity-type placeholders.
    ///
    /// The placeholder `:previous_sync_marker` itself contains the column
    /// name, so the column is looked for with the placeholder removed.
    #[must_use]
    pub fn detect(sql: &str) -> Self {
        let previous_marker_param = sql.contains(PREVIOUS_MARKER_PARAM);
        let without_param = sql.replace(PREVIOUS_MARKER_PARAM, "");
        Self {
            marker_column: without_param.contains(SYNC_MARKER_COLUMN),
            previous_marker_param,
            skipped_codes_param: sql.contains(SKIPPED_CODES_PARAM),
        }
    }

    /// Marker strategy needs both the column and its placeholder.
    #[must_use]
    pub fn strategy(self) -> ActivityTypeStrategy {
        if self.marker_column && self.previous_marker_param {
            ActivityTypeStrategy::Marker
        } else {
            ActivityTypeStrategy::Hash
        }
    }
}

/// The single activity-type query.
///
/// The sync strategy is classified once at construction and carried with
/// the query, so validation and dispatch always agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTypeQuery {
    sql: String,
    initial_sync_marker: Option<String>,
    skipped_codes: Vec<String>,
    capabilities: SqlCapabilities,
}

impl ActivityTypeQuery {
    #[must_use]
    pub fn new(
        sql: impl Into<String>,
        initial_sync_marker: Option<String>,
        skipped_codes: Vec<String>,
    ) -> Self {
        let sql = sql.into();
        let capabilities = SqlCapabilities::detect(&sql);
        Self {
            sql,
            initial_sync_marker,
            skipped_codes,
            capabilities,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Configured initial marker, empty when the query has none.
    #[must_use]
    pub fn initial_sync_marker(&self) -> &str {
        self.initial_sync_marker.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn has_initial_sync_marker(&self) -> bool {
        self.initial_sync_marker
            .as_deref()
            .is_some_and(|m| !m.is_empty())
    }

    #[must_use]
    pub fn skipped_codes(&self) -> &[String] {
        &self.skipped_codes
    }

    #[must_use]
    pub fn capabilities(&self) -> SqlCapabilities {
        self.capabilities
    }

    #[must_use]
    pub fn strategy(&self) -> ActivityTypeStrategy {
        self.capabilities.strategy()
    }

    #[must_use]
    pub fn identity(&self) -> QueryIdentity {
        QueryIdentity::derive(&self.sql, self.initial_sync_marker(), &self.skipped_codes)
    }
}
