//! Infrastructure layer for Agentflow.
//!
//! Contains implementations of the contracts defined in `agentflow-core`
//! plus the filesystem-facing services: the mtime-checked parse cache,
//! debounced file watching, bounded batch parsing, environment-backed
//! secret resolution, and the reqwest HTTP fetcher.

pub mod batch;
pub mod cache;
pub mod http;
pub mod secrets;
pub mod watch;

pub use batch::parse_batch;
pub use cache::{CacheError, ParseCache, ParsedFile};
pub use watch::{AgentEvent, AgentWatcher, WatchError};
