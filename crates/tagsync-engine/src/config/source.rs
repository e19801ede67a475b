//! Live query configuration backed by a watched YAML file.
//!
//! The file is parsed once when the source is opened. A dedicated thread
//! then follows filesystem events on the file's parent directory (so that
//! editors replacing the file by rename are seen too), re-parses on every
//! relevant event and publishes the result as a new immutable snapshot.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::parser::{self, QueryDocument};
use crate::error::ConfigError;

/// Receives every snapshot published after a reload.
pub trait ConfigListener<Q>: Send + Sync {
    fn on_change(&self, queries: &[Q]);
}

impl<Q, F> ConfigListener<Q> for F
where
    F: Fn(&[Q]) + Send + Sync,
{
    fn on_change(&self, queries: &[Q]) {
        self(queries);
    }
}

struct Shared<Q> {
    path: PathBuf,
    snapshot: RwLock<Arc<Vec<Q>>>,
    listener: RwLock<Option<Arc<dyn ConfigListener<Q>>>>,
}

impl<Q: QueryDocument> Shared<Q> {
    fn publish(&self, queries: Vec<Q>) {
        let snapshot = Arc::new(queries);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&snapshot);

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_change(&snapshot);
        }
    }

    /// Re-read the file after a change event.
    ///
    /// Any failure leaves an empty snapshot: the process keeps running
    /// and reports unhealthy until the file is fixed.
    fn reload(&self) -> Vec<Q> {
        if !self.path.exists() {
            tracing::warn!(
                kind = Q::KIND,
                path = %self.path.display(),
                "Query file removed, no queries configured"
            );
            return Vec::new();
        }
        match parser::load::<Q>(&self.path) {
            Ok(queries) => {
                tracing::info!(
                    kind = Q::KIND,
                    path = %self.path.display(),
                    queries = queries.len(),
                    "Query file reloaded"
                );
                queries
            }
            Err(e) => {
                tracing::error!(
                    kind = Q::KIND,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to reload query file, no queries configured"
                );
                Vec::new()
            }
        }
    }
}

struct WatchHandle {
    watcher: RecommendedWatcher,
    worker: JoinHandle<()>,
}

/// Hot-reloadable list of queries of one kind.
///
/// Readers take a cheap [`Arc`] snapshot with [`ConfigSource::current`];
/// a snapshot is never mutated, only replaced.
pub struct ConfigSource<Q: QueryDocument> {
    shared: Arc<Shared<Q>>,
    watch: Mutex<Option<WatchHandle>>,
    watched: bool,
}

impl<Q: QueryDocument> ConfigSource<Q> {
    /// Parse `path` and start watching it.
    ///
    /// A file that cannot be read yields an empty snapshot; the watch
    /// picks it up once it appears.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`] when the
    /// file exists but is unusable, and [`ConfigError::Watch`] when its
    /// directory cannot be watched.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let initial = match parser::load::<Q>(&path) {
            Ok(queries) => queries,
            Err(ConfigError::Read { path, source }) => {
                tracing::error!(
                    kind = Q::KIND,
                    path = %path.display(),
                    error = %source,
                    "Query file unreadable, starting with no queries"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        tracing::info!(
            kind = Q::KIND,
            path = %path.display(),
            queries = initial.len(),
            "Loaded query file"
        );

        let shared = Arc::new(Shared {
            path,
            snapshot: RwLock::new(Arc::new(initial)),
            listener: RwLock::new(None),
        });
        let handle = start_watch(&shared)?;

        Ok(Self {
            shared,
            watch: Mutex::new(Some(handle)),
            watched: true,
        })
    }

    /// A fixed snapshot with no file behind it.
    #[must_use]
    pub fn detached(queries: Vec<Q>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: PathBuf::new(),
                snapshot: RwLock::new(Arc::new(queries)),
                listener: RwLock::new(None),
            }),
            watch: Mutex::new(None),
            watched: false,
        }
    }

    /// The watched file; empty for a detached source.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<Vec<Q>> {
        Arc::clone(
            &self
                .shared
                .snapshot
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Register the listener notified after every reload, replacing any
    /// previous one.
    pub fn on_change(&self, listener: impl ConfigListener<Q> + 'static) {
        *self
            .shared
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(listener));
    }

    /// Publish `queries` as if the file had been reloaded.
    pub fn replace(&self, queries: Vec<Q>) {
        self.shared.publish(queries);
    }

    /// Stop watching. Idempotent.
    pub fn stop(&self) {
        let handle = self
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(WatchHandle { watcher, worker }) = handle {
            // Dropping the watcher closes the event channel and ends the worker.
            drop(watcher);
            // A listener may drop the last owner from the watch thread itself.
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::warn!(kind = Q::KIND, "Config watch thread panicked");
            }
            tracing::debug!(kind = Q::KIND, "Config watch stopped");
        }
    }

    /// False once the watch has ended or no queries are configured.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let watching = !self.watched
            || self
                .watch
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(|h| !h.worker.is_finished());
        watching && !self.current().is_empty()
    }
}

impl<Q: QueryDocument> Drop for ConfigSource<Q> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn start_watch<Q: QueryDocument>(shared: &Arc<Shared<Q>>) -> Result<WatchHandle, ConfigError> {
    let path = shared.path.clone();
    let watch_error = |source: notify::Error| ConfigError::Watch {
        path: path.clone(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(ToOwned::to_owned)
        .ok_or_else(|| watch_error(notify::Error::generic("query file path has no file name")))?;

    let (tx, rx) = mpsc::channel();
    let mut watcher =
        RecommendedWatcher::new(tx, notify::Config::default()).map_err(&watch_error)?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(&watch_error)?;

    let worker_shared = Arc::clone(shared);
    let worker = std::thread::Builder::new()
        .name(format!("{}-config-watch", Q::KIND))
        .spawn(move || watch_loop(&worker_shared, &file_name, &rx))
        .map_err(|e| watch_error(notify::Error::io(e)))?;

    tracing::debug!(kind = Q::KIND, dir = %dir.display(), "Watching query file directory");
    Ok(WatchHandle { watcher, worker })
}

fn watch_loop<Q: QueryDocument>(
    shared: &Shared<Q>,
    file_name: &OsString,
    rx: &Receiver<notify::Result<Event>>,
) {
    for result in rx {
        match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    continue;
                }
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if touches_file {
                    tracing::debug!(kind = Q::KIND, event = ?event.kind, "Query file changed");
                    let queries = shared.reload();
                    shared.publish(queries);
                }
            }
            Err(e) => {
                tracing::warn!(kind = Q::KIND, error = %e, "Config watch error");
            }
        }
    }
}
