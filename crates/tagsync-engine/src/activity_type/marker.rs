//! Incremental, session-scoped activity-type sync.
//!
//! Used when the activity-type query exposes a `sync_marker` column. The
//! very first drain of a query runs inside one catalog session so the
//! catalog can retire codes that were not delivered; later drains only
//! push new rows. The refresh cycle re-walks the whole set one batch per
//! call inside a long-lived session that is completed when the walk ends.
//!
//! Sessions are persisted so a crash mid-run resumes the same session
//! instead of opening a second one.

use std::sync::Arc;
use std::time::Duration;

use tagsync_state::StateBackend;
use tagsync_types::{ActivityTypeQuery, ActivityTypeRecord, CursorKeyspace, SessionId};

use crate::catalog::CatalogApi;
use crate::cursor::CursorStore;
use crate::database::Database;
use crate::drain::{DrainLoop, Interrupt};
use crate::error::{Result, SyncError};
use crate::format::format_activity_types;
use crate::result::SyncReport;

pub struct ActivityTypeMarkerEngine {
    database: Arc<dyn Database>,
    catalog: Arc<dyn CatalogApi>,
    drain_store: CursorStore,
    refresh_store: CursorStore,
    batch_delay: Duration,
    interrupt: Interrupt,
}

impl ActivityTypeMarkerEngine {
    #[must_use]
    pub fn new(
        database: Arc<dyn Database>,
        catalog: Arc<dyn CatalogApi>,
        state: Arc<dyn StateBackend>,
        batch_delay: Duration,
        interrupt: Interrupt,
    ) -> Self {
        Self {
            database,
            catalog,
            drain_store: CursorStore::activity_types(Arc::clone(&state), CursorKeyspace::Drain),
            refresh_store: CursorStore::activity_types(state, CursorKeyspace::Refresh),
            batch_delay,
            interrupt,
        }
    }

    #[must_use]
    pub fn store(&self, keyspace: CursorKeyspace) -> &CursorStore {
        match keyspace {
            CursorKeyspace::Drain => &self.drain_store,
            CursorKeyspace::Refresh => &self.refresh_store,
        }
    }

    /// Deliver every activity type beyond the drain cursor.
    ///
    /// A first run (cursor still at the initial marker, or a drain session
    /// left behind by an interrupted first run) is wrapped in a session
    /// that is completed once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when a fetch, catalog call or state write
    /// fails, the query repeats a batch, or the run is interrupted.
    pub fn drain(
        &self,
        query: &ActivityTypeQuery,
        still_current: impl FnMut() -> bool,
    ) -> Result<SyncReport> {
        let store = &self.drain_store;
        let resumed = store.get_session(query)?;
        let first_run =
            resumed.is_some() || store.get_marker(query)? == query.initial_sync_marker();
        let session = if first_run {
            Some(self.get_or_start_session(store, query, resumed)?)
        } else {
            None
        };

        let drained = DrainLoop::new(
            || self.fetch_unsynced(store, query),
            |batch: &[ActivityTypeRecord]| {
                self.push(store, query, batch, session.as_ref())?;
                tracing::info!("New activity type detection: {}", format_activity_types(batch));
                Ok(())
            },
        )
        .allow_while(still_current)
        .with_delay(self.batch_delay)
        .with_interrupt(&self.interrupt)
        .run()?;

        if let Some(session) = session {
            if drained.exhausted {
                self.complete(&session)?;
                store.clear_session(query)?;
                tracing::info!(session = %session, "First run sync is completed within session");
            } else {
                tracing::info!(
                    session = %session,
                    "First run sync stopped early, session kept for the next run"
                );
            }
        }
        Ok(drained.report)
    }

    /// Re-send one batch from the refresh cursor inside the refresh session.
    ///
    /// When the walk is exhausted the session is completed and both the
    /// refresh cursor and session are cleared, so the next call starts a
    /// new cycle from the initial marker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when a fetch, catalog call or state write fails.
    pub fn refresh(
        &self,
        query: &ActivityTypeQuery,
        mut still_current: impl FnMut() -> bool,
    ) -> Result<SyncReport> {
        if !still_current() {
            return Ok(SyncReport::default());
        }
        let store = &self.refresh_store;
        let persisted = store.get_session(query)?;
        let session = self.get_or_start_session(store, query, persisted)?;

        let batch = self.fetch_unsynced(store, query)?;
        if batch.is_empty() {
            self.complete(&session)?;
            tracing::info!(
                session = %session,
                "Resetting activity types refresh to start from the beginning"
            );
            store.reset(query)?;
            store.clear_session(query)?;
            return Ok(SyncReport::default());
        }

        self.push(store, query, &batch, Some(&session))?;
        tracing::info!(
            session = %session,
            "Existing activity types refresh: {}",
            format_activity_types(&batch)
        );
        Ok(SyncReport::batch(batch.len()))
    }

    fn get_or_start_session(
        &self,
        store: &CursorStore,
        query: &ActivityTypeQuery,
        persisted: Option<SessionId>,
    ) -> Result<SessionId> {
        if let Some(session) = persisted {
            tracing::info!(session = %session, keyspace = %store.keyspace(), "Resuming sync session");
            return Ok(session);
        }
        let session = self
            .catalog
            .start_session()
            .map_err(|e| SyncError::Transport(e.context("start sync session")))?;
        store.save_session(query, &session)?;
        tracing::debug!(session = %session, keyspace = %store.keyspace(), "Started sync session");
        Ok(session)
    }

    fn complete(&self, session: &SessionId) -> Result<()> {
        self.catalog
            .complete_session(session)
            .map_err(|e| SyncError::Transport(e.context("complete sync session")))
    }

    fn fetch_unsynced(
        &self,
        store: &CursorStore,
        query: &ActivityTypeQuery,
    ) -> Result<Vec<ActivityTypeRecord>> {
        let marker = store.get_marker(query)?;
        let skip: Vec<String> = query
            .skipped_codes()
            .iter()
            .cloned()
            .chain(store.get_delivered_ids(query)?)
            .filter(|code| !code.is_empty())
            .collect();
        super::fetch(self.database.as_ref(), query, Some(&marker), &skip)
    }

    fn push(
        &self,
        store: &CursorStore,
        query: &ActivityTypeQuery,
        batch: &[ActivityTypeRecord],
        session: Option<&SessionId>,
    ) -> Result<()> {
        self.catalog
            .sync_activity_types(batch, session)
            .map_err(|e| SyncError::Transport(e.context("sync activity types")))?;
        store.mark_position(query, batch)
    }
}
