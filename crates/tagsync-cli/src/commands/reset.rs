use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use tagsync_engine::activity_type::hash::{HASH_KEY, LAST_SYNC_KEY};
use tagsync_engine::CursorStore;
use tagsync_state::StateBackend;
use tagsync_types::{ActivityTypeStrategy, CursorKeyspace};

use super::{open_state, QueryFiles};

/// Reset target naming the activity-type query.
pub const ACTIVITY_TYPES_TARGET: &str = "activity-types";

/// Execute the `reset` command: forget one query's position in one keyspace.
pub fn execute(
    files: &QueryFiles,
    state_db: &Path,
    target: &str,
    keyspace: CursorKeyspace,
) -> Result<()> {
    let state = open_state(state_db)?;
    let message = reset(files, &state, target, keyspace)?;
    println!("{message}");
    Ok(())
}

fn reset(
    files: &QueryFiles,
    state: &Arc<dyn StateBackend>,
    target: &str,
    keyspace: CursorKeyspace,
) -> Result<String> {
    if target == ACTIVITY_TYPES_TARGET {
        let Some(query) = files.load_activity_type()? else {
            bail!("No activity type query configured");
        };
        if query.strategy() == ActivityTypeStrategy::Hash {
            state.remove(HASH_KEY)?;
            state.remove(LAST_SYNC_KEY)?;
            return Ok("Activity type hash cleared, next sync sends the full set".into());
        }
        let store = CursorStore::activity_types(Arc::clone(state), keyspace);
        store.reset(&query)?;
        store.clear_session(&query)?;
        tracing::info!(keyspace = %keyspace, "Activity type cursor reset");
        return Ok(format!("Activity type {keyspace} cursor reset"));
    }

    let tags = files.load_tags()?;
    let Some(query) = tags.iter().find(|q| q.name == target) else {
        let names: Vec<&str> = tags.iter().map(|q| q.name.as_str()).collect();
        bail!(
            "Unknown reset target '{target}' (expected one of: {}, {ACTIVITY_TYPES_TARGET})",
            names.join(", ")
        );
    };
    CursorStore::tags(Arc::clone(state), keyspace).reset(query)?;
    tracing::info!(query = %query.name, keyspace = %keyspace, "Tag cursor reset");
    Ok(format!("Tag query '{}' {keyspace} cursor reset", query.name))
}
