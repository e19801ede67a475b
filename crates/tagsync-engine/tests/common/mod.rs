//! Shared fakes for engine integration tests.
//!
//! `TableDatabase` evaluates fetches the way a correct SQL query would:
//! rows at or beyond the marker, minus excluded ids, ordered by marker
//! then id, limited to a batch size.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tagsync_engine::{CatalogApi, Database};
use tagsync_types::{ActivityTypeQuery, ActivityTypeRecord, SessionId, TagRecord};

pub fn tag(id: &str, marker: &str) -> TagRecord {
    TagRecord {
        id: id.into(),
        tag_name: format!("tag-{id}"),
        keyword: format!("kw-{id}"),
        description: format!("row {id}"),
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

pub struct TableDatabase {
    batch_size: usize,
    tags: Mutex<HashMap<String, Vec<TagRecord>>>,
    activity_types: Mutex<Vec<ActivityTypeRecord>>,
}

impl TableDatabase {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            tags: Mutex::new(HashMap::new()),
            activity_types: Mutex::new(Vec::new()),
        }
    }

    /// Append rows to the table read by `sql`.
    pub fn insert_tags(&self, sql: &str, rows: Vec<TagRecord>) {
        let mut tables = self.tags.lock().unwrap();
        let table = tables.entry(sql.to_string()).or_default();
        table.extend(rows);
        table.sort_by(|a, b| (&a.sync_marker, &a.id).cmp(&(&b.sync_marker, &b.id)));
    }

    pub fn set_activity_types(&self, rows: Vec<ActivityTypeRecord>) {
        *self.activity_types.lock().unwrap() = rows;
    }
}

impl Database for TableDatabase {
    fn fetch_tag_rows(
        &self,
        sql: &str,
        marker: &str,
        exclude_ids: &[String],
    ) -> anyhow::Result<Vec<TagRecord>> {
        let tables = self.tags.lock().unwrap();
        Ok(tables
            .get(sql)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.sync_marker.as_str() >= marker)
                    .filter(|r| !exclude_ids.contains(&r.id))
                    .take(self.batch_size)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_activity_type_rows(
        &self,
        _query: &ActivityTypeQuery,
        marker: Option<&str>,
        exclude_codes: &[String],
    ) -> anyhow::Result<Vec<ActivityTypeRecord>> {
        let mut rows: Vec<ActivityTypeRecord> = self
            .activity_types
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !exclude_codes.contains(&r.code))
            .cloned()
            .collect();
        let Some(marker) = marker else {
            return Ok(rows);
        };
        rows.retain(|r| r.sync_marker.as_deref().is_some_and(|m| m >= marker));
        rows.sort_by(|a, b| (&a.sync_marker, &a.code).cmp(&(&b.sync_marker, &b.code)));
        rows.truncate(self.batch_size);
        Ok(rows)
    }

    fn ping(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityTypePush {
    pub codes: Vec<String>,
    pub session: Option<SessionId>,
}

#[derive(Default)]
pub struct RecordingCatalog {
    pub tags: Mutex<Vec<TagRecord>>,
    pub activity_types: Mutex<Vec<ActivityTypePush>>,
    pub started: Mutex<Vec<SessionId>>,
    pub completed: Mutex<Vec<SessionId>>,
}

impl RecordingCatalog {
    pub fn tag_ids(&self) -> Vec<String> {
        self.tags.lock().unwrap().iter().map(|t| t.id.clone()).collect()
    }

    pub fn pushes(&self) -> Vec<ActivityTypePush> {
        self.activity_types.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<SessionId> {
        self.started.lock().unwrap().clone()
    }

    pub fn completed(&self) -> Vec<SessionId> {
        self.completed.lock().unwrap().clone()
    }
}

impl CatalogApi for RecordingCatalog {
    fn upsert_tags(&self, batch: &[TagRecord]) -> anyhow::Result<()> {
        self.tags.lock().unwrap().extend_from_slice(batch);
        Ok(())
    }

    fn start_session(&self) -> anyhow::Result<SessionId> {
        let mut started = self.started.lock().unwrap();
        let session = SessionId::new(format!("session-{}", started.len() + 1));
        started.push(session.clone());
        Ok(session)
    }

    fn sync_activity_types(
        &self,
        batch: &[ActivityTypeRecord],
        session: Option<&SessionId>,
    ) -> anyhow::Result<()> {
        self.activity_types.lock().unwrap().push(ActivityTypePush {
            codes: batch.iter().map(|a| a.code.clone()).collect(),
            session: session.cloned(),
        });
        Ok(())
    }

    fn complete_session(&self, session: &SessionId) -> anyhow::Result<()> {
        self.completed.lock().unwrap().push(session.clone());
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}
