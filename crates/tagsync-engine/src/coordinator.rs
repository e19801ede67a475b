//! Scheduler-facing entry points.
//!
//! [`SyncCoordinator`] exposes one operation per [`SyncKind`]. Each is
//! single-flight: a trigger arriving while a run of the same kind is in
//! progress is dropped, not queued. Tag and activity-type runs check
//! between batches whether their query snapshot is still the live one and
//! stop early after a reconfiguration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tagsync_state::StateBackend;
use tagsync_types::{ActivityTypeQuery, ActivityTypeStrategy, SyncKind, TagQuery};

use crate::activity_type::{ActivityTypeHashEngine, ActivityTypeMarkerEngine};
use crate::catalog::CatalogApi;
use crate::config::{ConfigSource, SyncSettings};
use crate::database::Database;
use crate::drain::Interrupt;
use crate::error::Result;
use crate::result::{RunOutcome, SyncReport};
use crate::tag_sync::TagSyncEngine;

/// One busy flag per sync kind.
#[derive(Default)]
struct InFlight {
    flags: [AtomicBool; SyncKind::ALL.len()],
}

impl InFlight {
    fn try_acquire(&self, kind: SyncKind) -> Option<FlightGuard<'_>> {
        let flag = &self.flags[slot(kind)];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }

    fn is_busy(&self, kind: SyncKind) -> bool {
        self.flags[slot(kind)].load(Ordering::Acquire)
    }
}

fn slot(kind: SyncKind) -> usize {
    match kind {
        SyncKind::TagDrain => 0,
        SyncKind::TagRefresh => 1,
        SyncKind::ActivityTypeDrain => 2,
        SyncKind::ActivityTypeRefresh => 3,
    }
}

/// Releases its flag on drop, including on error and unwind.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncCoordinator {
    tag_queries: Arc<ConfigSource<TagQuery>>,
    activity_type_queries: Option<Arc<ConfigSource<ActivityTypeQuery>>>,
    database: Arc<dyn Database>,
    tags: TagSyncEngine,
    hash: ActivityTypeHashEngine,
    marker: ActivityTypeMarkerEngine,
    in_flight: InFlight,
    interrupt: Interrupt,
}

impl SyncCoordinator {
    /// Wire the engines over shared collaborators.
    ///
    /// Without an activity-type source the activity-type operations do
    /// nothing and health only depends on the tag source.
    #[must_use]
    pub fn new(
        database: Arc<dyn Database>,
        catalog: Arc<dyn CatalogApi>,
        state: Arc<dyn StateBackend>,
        settings: &SyncSettings,
        tag_queries: Arc<ConfigSource<TagQuery>>,
        activity_type_queries: Option<Arc<ConfigSource<ActivityTypeQuery>>>,
    ) -> Self {
        let interrupt = Interrupt::new();
        Self {
            tags: TagSyncEngine::new(
                Arc::clone(&database),
                Arc::clone(&catalog),
                Arc::clone(&state),
                settings.batch_delay(),
                interrupt.clone(),
            ),
            hash: ActivityTypeHashEngine::new(
                Arc::clone(&database),
                Arc::clone(&catalog),
                Arc::clone(&state),
                settings.activity_type_max_age(),
            ),
            marker: ActivityTypeMarkerEngine::new(
                Arc::clone(&database),
                catalog,
                state,
                settings.batch_delay(),
                interrupt.clone(),
            ),
            tag_queries,
            activity_type_queries,
            database,
            in_flight: InFlight::default(),
            interrupt,
        }
    }

    /// Register this coordinator as listener of both query sources.
    ///
    /// Listeners hold a weak reference, so the sources never keep the
    /// coordinator alive.
    pub fn subscribe(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        self.tag_queries.on_change(move |_: &[TagQuery]| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_tag_queries_changed();
            }
        });

        if let Some(source) = &self.activity_type_queries {
            let weak: Weak<Self> = Arc::downgrade(self);
            source.on_change(move |_: &[ActivityTypeQuery]| {
                if let Some(coordinator) = weak.upgrade() {
                    coordinator.on_activity_type_queries_changed();
                }
            });
        }
    }

    #[must_use]
    pub fn tag_engine(&self) -> &TagSyncEngine {
        &self.tags
    }

    /// Whether a run of `kind` is in progress.
    #[must_use]
    pub fn is_running(&self, kind: SyncKind) -> bool {
        self.in_flight.is_busy(kind)
    }

    /// Drain every configured tag query.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyncError`](crate::SyncError) raised; queries
    /// after the failing one are not run.
    pub fn tag_drain(&self) -> Result<RunOutcome> {
        self.single_flight(SyncKind::TagDrain, || {
            let snapshot = self.tag_queries.current();
            if snapshot.is_empty() {
                tracing::warn!("No tag SQL queries configured. Skipping tag sync.");
                return Ok(SyncReport::default());
            }
            let mut total = SyncReport::default();
            for query in snapshot.iter() {
                total += self
                    .tags
                    .drain(query, || *self.tag_queries.current() == *snapshot)?;
            }
            Ok(total)
        })
    }

    /// Refresh one batch of every tag query with continuous resync enabled.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyncError`](crate::SyncError) raised.
    pub fn tag_refresh(&self) -> Result<RunOutcome> {
        self.single_flight(SyncKind::TagRefresh, || {
            let snapshot = self.tag_queries.current();
            if snapshot.is_empty() {
                tracing::warn!("No tag SQL queries configured. Skipping tag refresh.");
                return Ok(SyncReport::default());
            }
            let mut total = SyncReport::default();
            for query in snapshot.iter() {
                total += self
                    .tags
                    .refresh(query, || *self.tag_queries.current() == *snapshot)?;
            }
            Ok(total)
        })
    }

    /// Sync activity types with the strategy the query was classified for.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`](crate::SyncError) raised by the engine.
    pub fn activity_type_drain(&self) -> Result<RunOutcome> {
        self.single_flight(SyncKind::ActivityTypeDrain, || {
            let Some((source, query)) = self.activity_type_query() else {
                return Ok(SyncReport::default());
            };
            match query.strategy() {
                ActivityTypeStrategy::Hash => self.hash.sync(&query),
                ActivityTypeStrategy::Marker => self
                    .marker
                    .drain(&query, || source.current().first() == Some(&query)),
            }
        })
    }

    /// Advance the activity-type refresh cycle by one batch.
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`](crate::SyncError) raised by the engine.
    pub fn activity_type_refresh(&self) -> Result<RunOutcome> {
        self.single_flight(SyncKind::ActivityTypeRefresh, || {
            let Some((source, query)) = self.activity_type_query() else {
                return Ok(SyncReport::default());
            };
            match query.strategy() {
                ActivityTypeStrategy::Hash => Ok(self.hash.refresh(&query)),
                ActivityTypeStrategy::Marker => self
                    .marker
                    .refresh(&query, || source.current().first() == Some(&query)),
            }
        })
    }

    /// Tag configuration changed: catch up and refresh immediately.
    pub fn on_tag_queries_changed(&self) {
        tracing::info!("Tag queries changed, starting sync");
        log_outcome(SyncKind::TagDrain, self.tag_drain());
        log_outcome(SyncKind::TagRefresh, self.tag_refresh());
    }

    /// Activity-type configuration changed: catch up immediately.
    pub fn on_activity_type_queries_changed(&self) {
        tracing::info!("Activity type queries changed, starting sync");
        log_outcome(SyncKind::ActivityTypeDrain, self.activity_type_drain());
    }

    /// Both query sources healthy and the database reachable.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.tag_queries.is_healthy()
            && self
                .activity_type_queries
                .as_ref()
                .map_or(true, |source| source.is_healthy())
            && self.database.ping()
    }

    /// Interrupt in-flight batch delays and stop watching query files.
    pub fn shutdown(&self) {
        if self.interrupt.is_triggered() {
            tracing::debug!("Sync coordinator already shut down");
            return;
        }
        tracing::info!("Shutting down sync coordinator");
        self.interrupt.trigger();
        self.tag_queries.stop();
        if let Some(source) = &self.activity_type_queries {
            source.stop();
        }
    }

    fn activity_type_query(
        &self,
    ) -> Option<(&ConfigSource<ActivityTypeQuery>, ActivityTypeQuery)> {
        let source = self.activity_type_queries.as_deref()?;
        let query = source.current().first().cloned();
        if query.is_none() {
            tracing::debug!("No activity type query configured. Skipping activity type sync.");
        }
        Some((source, query?))
    }

    fn single_flight(
        &self,
        kind: SyncKind,
        run: impl FnOnce() -> Result<SyncReport>,
    ) -> Result<RunOutcome> {
        let Some(_guard) = self.in_flight.try_acquire(kind) else {
            tracing::debug!(kind = %kind, "Sync already in progress, skipping trigger");
            return Ok(RunOutcome::Skipped);
        };
        let report = run()?;
        tracing::debug!(
            kind = %kind,
            batches = report.batches,
            records = report.records,
            "Sync run finished"
        );
        Ok(RunOutcome::Completed(report))
    }
}

fn log_outcome(kind: SyncKind, outcome: Result<RunOutcome>) {
    match outcome {
        Ok(RunOutcome::Completed(report)) => {
            tracing::info!(kind = %kind, batches = report.batches, records = report.records, "Sync completed");
        }
        Ok(RunOutcome::Skipped) => {}
        Err(e) => {
            tracing::error!(kind = %kind, retryable = e.is_retryable(), error = %e, "Sync failed");
        }
    }
}
