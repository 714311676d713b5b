//! Runs a tracer with persistent caches.

use super::cache::{CacheStore, TraceCache};
use super::{TraceGraph, TraceRequest, Tracer};
use crate::pkg::error::PkgError;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of [`run_trace`].
#[derive(Debug)]
pub struct TraceOutput {
    pub graph: TraceGraph,
    /// Cache files written after tracing.
    pub caches_written: Vec<PathBuf>,
}

/// Load caches, trace, then persist caches.
///
/// The tracer runs on the blocking pool. Without a store the tracer gets
/// empty, disabled caches.
///
/// # Errors
/// Returns `PKG_CACHE_ERROR` if a cache cannot be loaded or saved and
/// `PKG_TRACE_FAILED` if the tracer fails.
pub async fn run_trace(
    tracer: Arc<dyn Tracer>,
    request: TraceRequest,
    store: Option<CacheStore>,
) -> Result<TraceOutput, PkgError> {
    tokio::task::spawn_blocking(move || -> Result<TraceOutput, PkgError> {
        let mut cache = match &store {
            Some(store) => store
                .load()
                .map_err(|e| PkgError::cache_error(e.to_string()))?,
            None => TraceCache::default(),
        };

        let graph = tracer
            .trace(&request, &mut cache)
            .map_err(|e| PkgError::trace_failed(e.to_string()))?;

        let caches_written = match &store {
            Some(store) => store
                .save(&cache)
                .map_err(|e| PkgError::cache_error(e.to_string()))?,
            None => Vec::new(),
        };

        Ok(TraceOutput {
            graph,
            caches_written,
        })
    })
    .await?
}
