//! Tag query synchronization.
//!
//! Each tag query has two independent cursors. The drain cursor catches up
//! on everything not yet delivered; the refresh cursor walks the whole
//! result set one batch per invocation and starts over once exhausted, so
//! previously delivered tags are periodically re-sent.

use std::sync::Arc;
use std::time::Duration;

use tagsync_state::StateBackend;
use tagsync_types::{CursorKeyspace, TagQuery, TagRecord};

use crate::catalog::CatalogApi;
use crate::cursor::CursorStore;
use crate::database::Database;
use crate::drain::{DrainLoop, Interrupt};
use crate::error::{Result, SyncError};
use crate::format::format_tags;
use crate::result::SyncReport;

pub struct TagSyncEngine {
    database: Arc<dyn Database>,
    catalog: Arc<dyn CatalogApi>,
    drain_store: CursorStore,
    refresh_store: CursorStore,
    batch_delay: Duration,
    interrupt: Interrupt,
}

impl TagSyncEngine {
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
            drain_store: CursorStore::tags(Arc::clone(&state), CursorKeyspace::Drain),
            refresh_store: CursorStore::tags(state, CursorKeyspace::Refresh),
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

    /// Deliver every tag beyond the drain cursor.
    ///
    /// `still_current` is checked before each fetch; the run stops quietly
    /// once it returns false.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when a fetch or upsert fails, the query keeps
    /// returning the same batch, or the run is interrupted.
    pub fn drain(&self, query: &TagQuery, still_current: impl FnMut() -> bool) -> Result<SyncReport> {
        let drained = DrainLoop::new(
            || self.fetch_unsynced(&self.drain_store, query),
            |batch: &[TagRecord]| {
                self.push(&self.drain_store, query, batch)?;
                tracing::info!(query = %query.name, "New tag detection: {}", format_tags(batch));
                Ok(())
            },
        )
        .allow_while(still_current)
        .with_delay(self.batch_delay)
        .with_interrupt(&self.interrupt)
        .run()?;

        tracing::debug!(
            query = %query.name,
            batches = drained.report.batches,
            records = drained.report.records,
            exhausted = drained.exhausted,
            "Tag drain finished"
        );
        Ok(drained.report)
    }

    /// Re-send one batch from the refresh cursor.
    ///
    /// An empty batch means the whole result set has been walked; the
    /// refresh cursor is reset so the next call starts from the beginning.
    /// Queries with continuous resync disabled are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the fetch, upsert or cursor write fails.
    pub fn refresh(
        &self,
        query: &TagQuery,
        mut still_current: impl FnMut() -> bool,
    ) -> Result<SyncReport> {
        if !query.continuous_resync || !still_current() {
            return Ok(SyncReport::default());
        }

        let batch = self.fetch_unsynced(&self.refresh_store, query)?;
        if batch.is_empty() {
            tracing::info!(query = %query.name, "Resetting tag refresh to start from the beginning");
            self.refresh_store.reset(query)?;
            return Ok(SyncReport::default());
        }

        self.push(&self.refresh_store, query, &batch)?;
        tracing::info!(query = %query.name, "Existing tag refresh: {}", format_tags(&batch));
        Ok(SyncReport::batch(batch.len()))
    }

    /// Rows beyond the cursor, minus skipped ids and ids already delivered
    /// at the cursor's marker.
    fn fetch_unsynced(&self, store: &CursorStore, query: &TagQuery) -> Result<Vec<TagRecord>> {
        let marker = store.get_marker(query)?;
        let skip: Vec<String> = query
            .skipped_ids
            .iter()
            .cloned()
            .chain(store.get_delivered_ids(query)?)
            .filter(|id| !id.is_empty())
            .collect();

        self.database
            .fetch_tag_rows(&query.sql, &marker, &skip)
            .map_err(|e| SyncError::Transport(e.context(format!("fetch tags for query '{}'", query.name))))
    }

    /// Upsert then advance the cursor; a crash in between redelivers the batch.
    fn push(&self, store: &CursorStore, query: &TagQuery, batch: &[TagRecord]) -> Result<()> {
        self.catalog
            .upsert_tags(batch)
            .map_err(|e| SyncError::Transport(e.context("upsert tags")))?;
        store.mark_position(query, batch)
    }
}
