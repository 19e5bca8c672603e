//! Hot-reload parse cache.
//!
//! Content-addressed cache of parse results keyed by file path. An entry is
//! fresh while the file's modification time is unchanged; a stale or absent
//! entry triggers a re-parse and records the new sha-256 content hash.
//! Eviction is least-recently-inserted once capacity is exceeded. All map
//! access goes through one mutex -- the cache is a single synchronization
//! point, deliberately simple.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use agentflow_lang::{Dialect, parse_and_validate};
use agentflow_types::ast::AgentDef;
use agentflow_types::diagnostic::ValidationResult;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of cached files.
pub const DEFAULT_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Cache failures are filesystem failures; parsing itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// ParsedFile
// ---------------------------------------------------------------------------

/// One parse result as served by the cache.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub def: AgentDef,
    pub validation: ValidationResult,
    pub dialect: Dialect,
    /// Hex-encoded sha-256 of the source text.
    pub content_hash: String,
    /// Whether this result was served without re-parsing.
    pub from_cache: bool,
}

#[derive(Clone)]
struct CacheEntry {
    def: AgentDef,
    validation: ValidationResult,
    dialect: Dialect,
    content_hash: String,
    last_modified: SystemTime,
}

// ---------------------------------------------------------------------------
// ParseCache
// ---------------------------------------------------------------------------

/// Parse-result cache with mtime invalidation.
pub struct ParseCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

struct CacheInner {
    entries: HashMap<PathBuf, CacheEntry>,
    /// Insertion order for eviction.
    order: VecDeque<PathBuf>,
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Parse a file, served from cache while its mtime is unchanged.
    pub async fn parse_file(&self, path: &Path) -> Result<ParsedFile, CacheError> {
        let io = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        let metadata = tokio::fs::metadata(path).await.map_err(io)?;
        let last_modified = metadata.modified().map_err(io)?;

        {
            let inner = self.inner.lock().await;
            if let Some(entry) = inner.entries.get(path) {
                if entry.last_modified == last_modified {
                    tracing::debug!(path = %path.display(), "parse cache hit");
                    return Ok(served(path, entry.clone(), true));
                }
            }
        }

        let text = tokio::fs::read_to_string(path).await.map_err(io)?;
        let content_hash = format!("{:x}", Sha256::digest(text.as_bytes()));
        let result = parse_and_validate(&text);
        tracing::debug!(
            path = %path.display(),
            dialect = ?result.dialect,
            errors = result.validation.errors.len(),
            "parsed agent file"
        );

        let entry = CacheEntry {
            def: result.def,
            validation: result.validation,
            dialect: result.dialect,
            content_hash,
            last_modified,
        };

        let mut inner = self.inner.lock().await;
        if inner.entries.insert(path.to_path_buf(), entry.clone()).is_some() {
            inner.order.retain(|p| p != path);
        }
        inner.order.push_back(path.to_path_buf());
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
                tracing::debug!(path = %evicted.display(), "evicted parse cache entry");
            }
        }
        Ok(served(path, entry, false))
    }

    /// Drop a path's entry (e.g. when the file is deleted).
    pub async fn invalidate(&self, path: &Path) {
        let mut inner = self.inner.lock().await;
        if inner.entries.remove(path).is_some() {
            inner.order.retain(|p| p != path);
            tracing::debug!(path = %path.display(), "invalidated parse cache entry");
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn served(path: &Path, entry: CacheEntry, from_cache: bool) -> ParsedFile {
    ParsedFile {
        path: path.to_path_buf(),
        def: entry.def,
        validation: entry.validation,
        dialect: entry.dialect,
        content_hash: entry.content_hash,
        from_cache,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
