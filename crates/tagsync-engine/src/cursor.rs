//! Persisted sync cursors.
//!
//! A cursor is the last delivered marker plus the ids delivered at exactly
//! that marker. Fetch queries select rows at or beyond the marker, so the
//! ids are what keeps rows sharing the boundary value from being delivered
//! twice. Each store instance owns one keyspace of one query kind.

use std::sync::Arc;

use tagsync_state::StateBackend;
use tagsync_types::{
    ActivityTypeQuery, CursorKeyspace, MarkedRecord, QueryIdentity, SessionId, TagQuery,
};

use crate::error::{Result, SyncError};

const ID_DELIMITER: &str = "@@@";

/// Query-side view needed to key and seed a cursor.
pub trait CursorQuery {
    fn identity(&self) -> QueryIdentity;

    /// Marker used when nothing is persisted yet.
    fn initial_sync_marker(&self) -> &str;

    /// Label used in logs and errors.
    fn label(&self) -> String;
}

impl CursorQuery for TagQuery {
    fn identity(&self) -> QueryIdentity {
        TagQuery::identity(self)
    }

    fn initial_sync_marker(&self) -> &str {
        &self.initial_sync_marker
    }

    fn label(&self) -> String {
        self.name.clone()
    }
}

impl CursorQuery for ActivityTypeQuery {
    fn identity(&self) -> QueryIdentity {
        ActivityTypeQuery::identity(self)
    }

    fn initial_sync_marker(&self) -> &str {
        ActivityTypeQuery::initial_sync_marker(self)
    }

    fn label(&self) -> String {
        format!("activity_types:{}", ActivityTypeQuery::identity(self))
    }
}

/// Everything persisted for one query in one keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPosition {
    /// Persisted marker, `None` when the cursor is at the initial marker.
    pub marker: Option<String>,
    pub delivered_ids: Vec<String>,
    pub session: Option<SessionId>,
}

/// Cursor persistence for one keyspace of one query kind.
#[derive(Clone)]
pub struct CursorStore {
    backend: Arc<dyn StateBackend>,
    keyspace: CursorKeyspace,
    infix: &'static str,
}

impl CursorStore {
    /// Store for tag query cursors.
    #[must_use]
    pub fn tags(backend: Arc<dyn StateBackend>, keyspace: CursorKeyspace) -> Self {
        Self {
            backend,
            keyspace,
            infix: "",
        }
    }

    /// Store for activity-type query cursors and sessions.
    #[must_use]
    pub fn activity_types(backend: Arc<dyn StateBackend>, keyspace: CursorKeyspace) -> Self {
        Self {
            backend,
            keyspace,
            infix: "activity_type_",
        }
    }

    #[must_use]
    pub fn keyspace(&self) -> CursorKeyspace {
        self.keyspace
    }

    fn key(&self, query: &impl CursorQuery, purpose: &str) -> String {
        format!(
            "{}{}_{}{purpose}",
            self.keyspace.key_prefix(),
            query.identity(),
            self.infix
        )
    }

    #[must_use]
    pub fn marker_key(&self, query: &impl CursorQuery) -> String {
        self.key(query, "sync_marker")
    }

    #[must_use]
    pub fn delivered_ids_key(&self, query: &impl CursorQuery) -> String {
        self.key(query, "last_synced_ids")
    }

    #[must_use]
    pub fn session_key(&self, query: &impl CursorQuery) -> String {
        self.key(query, "sync_session")
    }

    /// Persisted marker, or the query's initial marker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn get_marker(&self, query: &impl CursorQuery) -> Result<String> {
        Ok(self
            .backend
            .get_string(&self.marker_key(query))?
            .unwrap_or_else(|| query.initial_sync_marker().to_string()))
    }

    /// Ids already delivered at the persisted marker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn get_delivered_ids(&self, query: &impl CursorQuery) -> Result<Vec<String>> {
        Ok(self
            .backend
            .get_string(&self.delivered_ids_key(query))?
            .map(|joined| split_ids(&joined))
            .unwrap_or_default())
    }

    /// Advance the cursor past a delivered batch.
    ///
    /// `records` must be in ascending marker order. The trailing run of
    /// records sharing the largest marker becomes the new delivered-id
    /// set, merged with the previous set when the marker did not move.
    /// An empty batch leaves the cursor untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::FetchLoop`] when a record has no marker or the
    /// batch is out of order (nothing is written in that case), and
    /// [`SyncError::State`] on storage failure.
    pub fn mark_position<R: MarkedRecord>(
        &self,
        query: &impl CursorQuery,
        records: &[R],
    ) -> Result<()> {
        let markers = records
            .iter()
            .map(|r| {
                r.sync_marker().ok_or_else(|| {
                    SyncError::FetchLoop(format!(
                        "Query {}: record {} has no sync_marker",
                        query.label(),
                        r.record_id()
                    ))
                })
            })
            .collect::<Result<Vec<&str>>>()?;

        if let Some(pair) = markers.windows(2).find(|pair| pair[0] > pair[1]) {
            return Err(SyncError::FetchLoop(format!(
                "Query {}: records must be sorted by sync_marker ascending, got '{}' before '{}'",
                query.label(),
                pair[0],
                pair[1]
            )));
        }

        let Some(&latest) = markers.last() else {
            return Ok(());
        };
        let run_ids = records
            .iter()
            .zip(&markers)
            .rev()
            .take_while(|(_, marker)| **marker == latest)
            .map(|(r, _)| r.record_id().to_string())
            .collect::<Vec<_>>()
            .into_iter()
            .rev();

        let marker_key = self.marker_key(query);
        let previous_marker = self.backend.get_string(&marker_key)?;
        let mut ids = if previous_marker.as_deref() == Some(latest) {
            self.get_delivered_ids(query)?
        } else {
            Vec::new()
        };
        for id in run_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        self.backend.put_string(&marker_key, latest)?;
        self.backend
            .put_string(&self.delivered_ids_key(query), &ids.join(ID_DELIMITER))?;
        tracing::debug!(
            query = %query.label(),
            keyspace = %self.keyspace,
            marker = latest,
            delivered = ids.len(),
            "Cursor advanced"
        );
        Ok(())
    }

    /// Forget the cursor so the next fetch starts at the initial marker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn reset(&self, query: &impl CursorQuery) -> Result<()> {
        self.backend.remove(&self.marker_key(query))?;
        self.backend.remove(&self.delivered_ids_key(query))?;
        Ok(())
    }

    /// Persisted session, ignoring empty values.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn get_session(&self, query: &impl CursorQuery) -> Result<Option<SessionId>> {
        Ok(self
            .backend
            .get_string(&self.session_key(query))?
            .filter(|s| !s.is_empty())
            .map(SessionId::new))
    }

    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn save_session(&self, query: &impl CursorQuery, session: &SessionId) -> Result<()> {
        self.backend
            .put_string(&self.session_key(query), session.as_str())?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn clear_session(&self, query: &impl CursorQuery) -> Result<()> {
        self.backend.remove(&self.session_key(query))?;
        Ok(())
    }

    /// Snapshot of everything stored for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] on storage failure.
    pub fn position(&self, query: &impl CursorQuery) -> Result<CursorPosition> {
        Ok(CursorPosition {
            marker: self.backend.get_string(&self.marker_key(query))?,
            delivered_ids: self.get_delivered_ids(query)?,
            session: self.get_session(query)?,
        })
    }
}

fn split_ids(joined: &str) -> Vec<String> {
    joined
        .split(ID_DELIMITER)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}
