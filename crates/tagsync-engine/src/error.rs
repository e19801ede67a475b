//! Sync error model.
//!
//! [`SyncError`] classifies why a run stopped. Collaborator failures arrive
//! as opaque `anyhow` errors and are wrapped as [`SyncError::Transport`];
//! state already persisted by the run stays valid in every case.

use std::path::PathBuf;

use tagsync_state::StateError;

/// Invalid or unreadable query configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read query file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the expected document shape.
    #[error("failed to parse query file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The file's directory could not be watched for changes.
    #[error("failed to watch query file {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// One or more documents failed validation.
    #[error("query validation failed:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Why a sync run stopped before exhausting its source.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Query configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The fetch query did not advance, or returned rows out of marker order.
    #[error("fetch loop aborted: {0}")]
    FetchLoop(String),

    /// Shutdown was requested while waiting between batches.
    #[error("sync run interrupted")]
    Interrupted,

    /// Database or catalog call failed.
    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),

    /// Persisting or reading sync state failed.
    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl SyncError {
    /// Whether the next scheduled trigger can reasonably retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::FetchLoop(_) | Self::Transport(_) | Self::State(_) => true,
            Self::Config(_) | Self::Interrupted => false,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, SyncError>;
