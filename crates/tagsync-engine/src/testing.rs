//! Scripted collaborator fakes shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tagsync_types::{ActivityTypeQuery, ActivityTypeRecord, SessionId, TagRecord};

use crate::catalog::CatalogApi;
use crate::database::Database;

pub fn tag(id: &str, marker: &str) -> TagRecord {
    TagRecord {
        id: id.into(),
        tag_name: format!("tag-{id}"),
        keyword: format!("kw-{id}"),
        description: String::new(),
        sync_marker: marker.into(),
    }
}

pub fn activity_type(code: &str, marker: Option<&str>) -> ActivityTypeRecord {
    ActivityTypeRecord {
        code: code.into(),
        label: code.to_lowercase(),
        description: format!("{code} work"),
        sync_marker: marker.map(ToString::to_string),
    }
}

/// One recorded fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetch {
    pub marker: Option<String>,
    pub excluded: Vec<String>,
}

/// Database returning queued batches, then empty batches.
#[derive(Default)]
pub struct ScriptedDatabase {
    tag_batches: Mutex<VecDeque<Vec<TagRecord>>>,
    activity_type_batches: Mutex<VecDeque<Vec<ActivityTypeRecord>>>,
    fetches: Mutex<Vec<Fetch>>,
    down: AtomicBool,
}

impl ScriptedDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_tags(&self, batch: Vec<TagRecord>) {
        self.tag_batches.lock().unwrap().push_back(batch);
    }

    pub fn push_activity_types(&self, batch: Vec<ActivityTypeRecord>) {
        self.activity_type_batches.lock().unwrap().push_back(batch);
    }

    pub fn fetches(&self) -> Vec<Fetch> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> anyhow::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("database unavailable");
        }
        Ok(())
    }
}

impl Database for ScriptedDatabase {
    fn fetch_tag_rows(
        &self,
        _sql: &str,
        marker: &str,
        exclude_ids: &[String],
    ) -> anyhow::Result<Vec<TagRecord>> {
        self.check_up()?;
        self.fetches.lock().unwrap().push(Fetch {
            marker: Some(marker.to_string()),
            excluded: exclude_ids.to_vec(),
        });
        Ok(self.tag_batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    fn fetch_activity_type_rows(
        &self,
        _query: &ActivityTypeQuery,
        marker: Option<&str>,
        exclude_codes: &[String],
    ) -> anyhow::Result<Vec<ActivityTypeRecord>> {
        self.check_up()?;
        self.fetches.lock().unwrap().push(Fetch {
            marker: marker.map(ToString::to_string),
            excluded: exclude_codes.to_vec(),
        });
        Ok(self
            .activity_type_batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    fn ping(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }
}

/// One recorded catalog call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    UpsertTags(Vec<String>),
    StartSession(SessionId),
    SyncActivityTypes {
        codes: Vec<String>,
        session: Option<SessionId>,
    },
    CompleteSession(SessionId),
}

/// Catalog recording every call; can be told to fail.
#[derive(Default)]
pub struct RecordingCatalog {
    calls: Mutex<Vec<CatalogCall>>,
    sessions: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn count(&self, pred: impl Fn(&CatalogCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: CatalogCall) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("catalog rejected request");
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl CatalogApi for RecordingCatalog {
    fn upsert_tags(&self, batch: &[TagRecord]) -> anyhow::Result<()> {
        self.record(CatalogCall::UpsertTags(
            batch.iter().map(|t| t.id.clone()).collect(),
        ))
    }

    fn start_session(&self) -> anyhow::Result<SessionId> {
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let session = SessionId::new(format!("session-{n}"));
        self.record(CatalogCall::StartSession(session.clone()))?;
        Ok(session)
    }

    fn sync_activity_types(
        &self,
        batch: &[ActivityTypeRecord],
        session: Option<&SessionId>,
    ) -> anyhow::Result<()> {
        self.record(CatalogCall::SyncActivityTypes {
            codes: batch.iter().map(|a| a.code.clone()).collect(),
            session: session.cloned(),
        })
    }

    fn complete_session(&self, session: &SessionId) -> anyhow::Result<()> {
        self.record(CatalogCall::CompleteSession(session.clone()))
    }
}
