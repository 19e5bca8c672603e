//! Debounced file watching with re-parse notifications.
//!
//! An `AgentWatcher` wires the `notify` debouncer to the parse cache: a
//! debounced change re-parses the file through the cache and fans the
//! result out to every subscriber registered for the watched path. A
//! deleted file evicts its cache entry and emits `Removed`. One panicking
//! subscriber never blocks the rest.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// The debouncer re-exports the notify version it was compiled against.
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::Mutex;

use crate::cache::{ParseCache, ParsedFile};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default debounce window.
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("watcher creation failed: {0}")]
    Creation(String),

    #[error("failed to watch '{path}': {reason}")]
    WatchPath { path: PathBuf, reason: String },
}

/// What a subscriber is told about a watched path.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The file changed (or appeared) and was re-parsed.
    Updated(ParsedFile),
    /// The file went away; its cache entry was evicted.
    Removed(PathBuf),
}

/// Subscriber callback. Multiple subscribers per path are independent.
pub type Subscriber = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// AgentWatcher
// ---------------------------------------------------------------------------

/// Watches agent source files and re-parses them on change.
pub struct AgentWatcher {
    cache: Arc<ParseCache>,
    subscribers: Arc<Mutex<HashMap<PathBuf, Vec<Subscriber>>>>,
    /// Live debouncers keyed by watched root; dropping one stops the watch.
    debouncers: Mutex<HashMap<PathBuf, Debouncer<RecommendedWatcher>>>,
    debounce: Duration,
}

impl AgentWatcher {
    pub fn new(cache: Arc<ParseCache>) -> Self {
        Self::with_debounce(cache, Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }

    pub fn with_debounce(cache: Arc<ParseCache>, debounce: Duration) -> Self {
        Self {
            cache,
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            debouncers: Mutex::new(HashMap::new()),
            debounce,
        }
    }

    /// Register a callback for a watched root (file or directory).
    pub async fn subscribe(&self, root: impl Into<PathBuf>, subscriber: Subscriber) {
        self.subscribers
            .lock()
            .await
            .entry(root.into())
            .or_default()
            .push(subscriber);
    }

    /// Start watching a file or directory. Directory watches are recursive
    /// and report events for every file inside.
    ///
    /// Must be called from within a tokio runtime: debounced events are
    /// handled on spawned tasks.
    pub async fn watch(&self, root: &Path) -> Result<(), WatchError> {
        let handle = tokio::runtime::Handle::current();
        let cache = self.cache.clone();
        let subscribers = self.subscribers.clone();
        let root_buf = root.to_path_buf();

        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let changed: Vec<PathBuf> =
                        events.into_iter().map(|e| e.path).collect();
                    let cache = cache.clone();
                    let subscribers = subscribers.clone();
                    let root = root_buf.clone();
                    handle.spawn(async move {
                        for path in changed {
                            handle_change(&cache, &subscribers, &root, &path).await;
                        }
                    });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "file watch error");
                }
            }
        })
        .map_err(|e| WatchError::Creation(e.to_string()))?;

        let mode = if root.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer
            .watcher()
            .watch(root, mode)
            .map_err(|e| WatchError::WatchPath {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        self.debouncers
            .lock()
            .await
            .insert(root.to_path_buf(), debouncer);
        tracing::info!(path = %root.display(), "watching for agent changes");
        Ok(())
    }

    /// Stop watching a root. Subscribers stay registered.
    pub async fn unwatch(&self, root: &Path) {
        if self.debouncers.lock().await.remove(root).is_some() {
            tracing::info!(path = %root.display(), "stopped watching");
        }
    }
}

/// Re-parse one changed path and notify the watched root's subscribers.
async fn handle_change(
    cache: &ParseCache,
    subscribers: &Mutex<HashMap<PathBuf, Vec<Subscriber>>>,
    root: &Path,
    path: &Path,
) {
    let event = match cache.parse_file(path).await {
        Ok(parsed) => AgentEvent::Updated(parsed),
        Err(err) => {
            // A vanished file is a removal; its entry must not linger.
            cache.invalidate(path).await;
            tracing::debug!(path = %path.display(), error = %err, "watched file unreadable");
            AgentEvent::Removed(path.to_path_buf())
        }
    };

    let subs = subscribers.lock().await;
    let Some(callbacks) = subs.get(root) else {
        return;
    };
    for callback in callbacks {
        // A panicking subscriber must not block the others.
        if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
            tracing::warn!(path = %path.display(), "subscriber panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
