pub mod check;
pub mod cursors;
pub mod reset;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tagsync_engine::config::parser;
use tagsync_state::{SqliteStateBackend, StateBackend};
use tagsync_types::{ActivityTypeQuery, TagQuery};

/// Query file locations taken from the global flags.
pub struct QueryFiles {
    pub tags: Option<PathBuf>,
    pub activity_types: Option<PathBuf>,
}

impl QueryFiles {
    /// Parse and validate the tag query file.
    pub fn load_tags(&self) -> Result<Vec<TagQuery>> {
        let path = self
            .tags
            .as_deref()
            .context("No tag query file given (use --tag-sql-file or TAG_SQL_FILE)")?;
        parser::load::<TagQuery>(path)
            .with_context(|| format!("Failed to load tag queries: {}", path.display()))
    }

    /// Parse and validate the activity-type query file, if one is configured.
    pub fn load_activity_type(&self) -> Result<Option<ActivityTypeQuery>> {
        let Some(path) = self.activity_types.as_deref() else {
            return Ok(None);
        };
        let mut queries = parser::load::<ActivityTypeQuery>(path).with_context(|| {
            format!("Failed to load activity type query: {}", path.display())
        })?;
        Ok(queries.pop())
    }
}

pub fn open_state(path: &Path) -> Result<Arc<dyn StateBackend>> {
    let backend = SqliteStateBackend::open(path)
        .with_context(|| format!("Failed to open state database: {}", path.display()))?;
    Ok(Arc::new(backend))
}
