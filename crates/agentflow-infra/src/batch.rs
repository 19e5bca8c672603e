//! Bounded-concurrency batch parsing.
//!
//! Parses many agent files through the shared cache at once, capping the
//! number of files read concurrently. Results come back in input order so
//! callers can zip them with the paths they asked for.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{CacheError, ParseCache, ParsedFile};

/// Default cap on files parsed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Parse every path through `cache`, at most `concurrency` at a time.
///
/// The result vector is aligned with `paths`; a per-file failure occupies
/// its slot without aborting the rest of the batch.
pub async fn parse_batch(
    cache: Arc<ParseCache>,
    paths: Vec<PathBuf>,
    concurrency: usize,
) -> Vec<Result<ParsedFile, CacheError>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set = JoinSet::new();

    for (index, path) in paths.into_iter().enumerate() {
        let cache = cache.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            // The semaphore is never closed, so acquiring cannot fail.
            let _permit = semaphore.acquire_owned().await;
            (index, cache.parse_file(&path).await)
        });
    }

    let mut results: Vec<Option<Result<ParsedFile, CacheError>>> = Vec::new();
    results.resize_with(set.len(), || None);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(err) => tracing::error!(error = %err, "batch parse task panicked"),
        }
    }

    results
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(CacheError::Io {
                    path: PathBuf::new(),
                    source: std::io::Error::other("parse task panicked"),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_source(id: &str) -> String {
        format!(
            "@agent {id} v1\ntrigger manual\nstep s:\n  kind llm\n  provider openai\n  \
             model gpt-4o\n  prompt \"hi\"\n  save r\n@end\n"
        )
    }

    #[tokio::test]
    async fn results_come_back_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..10 {
            let path = dir.path().join(format!("a{i}.agent"));
            std::fs::write(&path, agent_source(&format!("a{i}"))).unwrap();
            paths.push(path);
        }

        let cache = Arc::new(ParseCache::new());
        let results = parse_batch(cache, paths, 3).await;
        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            let parsed = result.as_ref().unwrap();
            assert_eq!(parsed.def.id, format!("a{i}"));
        }
    }

    #[tokio::test]
    async fn a_missing_file_fails_its_slot_only() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.agent");
        std::fs::write(&good, agent_source("good")).unwrap();
        let missing = dir.path().join("missing.agent");

        let cache = Arc::new(ParseCache::new());
        let results = parse_batch(cache, vec![good, missing], 0).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
