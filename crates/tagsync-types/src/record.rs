//! Record shapes fetched from the source database.
//!
//! Records are transient: they live for one fetch/process cycle and are
//! never persisted. Only their ids and markers reach the state store.

/// A record that carries an identifier and an ordering marker.
///
/// Cursor arithmetic only needs these two projections, so it is written
/// once against this trait and shared by tags and activity types.
pub trait MarkedRecord {
    /// Identifier used for tie suppression at the boundary marker.
    fn record_id(&self) -> &str;

    /// Ordering marker, `None` when the query exposes no marker column.
    fn sync_marker(&self) -> Option<&str>;
}

/// One row of a tag query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagRecord {
    pub id: String,
    pub tag_name: String,
    pub keyword: String,
    pub description: String,
    pub sync_marker: String,
}

impl MarkedRecord for TagRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn sync_marker(&self) -> Option<&str> {
        Some(&self.sync_marker)
    }
}

/// One row of the activity-type query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityTypeRecord {
    pub code: String,
    pub label: String,
    pub description: String,
    pub sync_marker: Option<String>,
}

impl ActivityTypeRecord {
    /// Record from a query without a marker column.
    #[must_use]
    pub fn unmarked(
        code: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            description: description.into(),
            sync_marker: None,
        }
    }
}

impl MarkedRecord for ActivityTypeRecord {
    fn record_id(&self) -> &str {
        &self.code
    }

    fn sync_marker(&self) -> Option<&str> {
        self.sync_marker.as_deref()
    }
}
