mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tagsync_types::CursorKeyspace;

#[derive(Parser)]
#[command(
    name = "tagsync",
    version,
    about = "Inspect tagsync query files and persisted sync state"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the tag query YAML file
    #[arg(long, env = "TAG_SQL_FILE", global = true)]
    tag_sql_file: Option<PathBuf>,

    /// Path to the activity-type query YAML file
    #[arg(long, env = "ACTIVITY_TYPE_SQL_FILE", global = true)]
    activity_type_sql_file: Option<PathBuf>,

    /// Path to the sqlite state database
    #[arg(long, env = "STATE_DB", default_value = "tagsync-state.db", global = true)]
    state_db: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configured query files
    Check,
    /// Show the persisted drain and refresh positions of every query
    Cursors,
    /// Forget the persisted position of one query
    Reset {
        /// Tag query name, or `activity-types`
        target: String,
        /// Which cycle to reset
        #[arg(long, default_value = "drain")]
        keyspace: CursorKeyspace,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let files = commands::QueryFiles {
        tags: cli.tag_sql_file,
        activity_types: cli.activity_type_sql_file,
    };
    match cli.command {
        Commands::Check => commands::check::execute(&files),
        Commands::Cursors => commands::cursors::execute(&files, &cli.state_db),
        Commands::Reset { target, keyspace } => {
            commands::reset::execute(&files, &cli.state_db, &target, keyspace)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset_keyspace(args: &[&str]) -> Result<CursorKeyspace, clap::Error> {
        match Cli::try_parse_from(args)?.command {
            Commands::Reset { keyspace, .. } => Ok(keyspace),
            _ => panic!("expected reset"),
        }
    }

    #[test]
    fn reset_keyspace_defaults_to_drain() {
        let keyspace = reset_keyspace(&["tagsync", "reset", "accounts"]).unwrap();
        assert_eq!(keyspace, CursorKeyspace::Drain);
    }

    #[test]
    fn reset_keyspace_parses_refresh_and_rejects_unknown() {
        let keyspace =
            reset_keyspace(&["tagsync", "reset", "accounts", "--keyspace", "refresh"]).unwrap();
        assert_eq!(keyspace, CursorKeyspace::Refresh);
        assert!(reset_keyspace(&["tagsync", "reset", "accounts", "--keyspace", "sideways"]).is_err());
    }
}
