use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tagsync_engine::activity_type::hash::{HASH_KEY, LAST_SYNC_KEY};
use tagsync_engine::{CursorPosition, CursorQuery, CursorStore};
use tagsync_state::StateBackend;
use tagsync_types::{ActivityTypeStrategy, CursorKeyspace};

use super::{open_state, QueryFiles};

const KEYSPACES: [CursorKeyspace; 2] = [CursorKeyspace::Drain, CursorKeyspace::Refresh];

/// Execute the `cursors` command: print the persisted state of every query.
pub fn execute(files: &QueryFiles, state_db: &Path) -> Result<()> {
    let tags = files.load_tags()?;
    let activity_type = files.load_activity_type()?;
    let state = open_state(state_db)?;

    for query in &tags {
        println!("Tag query '{}' ({})", query.name, query.identity());
        for keyspace in KEYSPACES {
            let store = CursorStore::tags(Arc::clone(&state), keyspace);
            print_position(keyspace, query, &store.position(query)?);
        }
    }

    let Some(query) = activity_type else {
        return Ok(());
    };
    println!("Activity types ({} strategy)", query.strategy());
    match query.strategy() {
        ActivityTypeStrategy::Hash => print_hash_state(state.as_ref())?,
        ActivityTypeStrategy::Marker => {
            for keyspace in KEYSPACES {
                let store = CursorStore::activity_types(Arc::clone(&state), keyspace);
                print_position(keyspace, &query, &store.position(&query)?);
            }
        }
    }
    Ok(())
}

fn print_position(keyspace: CursorKeyspace, query: &impl CursorQuery, position: &CursorPosition) {
    let label = format!("{keyspace}:");
    match &position.marker {
        Some(marker) => println!(
            "  {label:9} marker '{marker}', {} id(s) delivered at marker",
            position.delivered_ids.len()
        ),
        None => println!(
            "  {label:9} at initial marker '{}'",
            query.initial_sync_marker()
        ),
    }
    if let Some(session) = &position.session {
        println!("  {:9} open session {session}", "");
    }
}

fn print_hash_state(state: &dyn StateBackend) -> Result<()> {
    match state.get_string(HASH_KEY)? {
        Some(hash) => println!("  hash:      {hash}"),
        None => println!("  hash:      none"),
    }
    let last_sync = state
        .get_i64(LAST_SYNC_KEY)?
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
    println!("  last sync: {last_sync}");
    Ok(())
}
