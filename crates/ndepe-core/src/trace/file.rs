//! Tracer backed by a previously written trace graph.

use super::{TraceCache, TraceError, TraceGraph, TraceRequest, Tracer};
use std::path::{Path, PathBuf};

/// Loads a [`TraceGraph`] from a JSON file instead of tracing.
///
/// Useful when another tool produced the trace. Relative paths in the file
/// are resolved against the request's base by the classifier, and the
/// request's entries are ignored.
#[derive(Debug, Clone)]
pub struct JsonTraceFile {
    path: PathBuf,
}

impl JsonTraceFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Tracer for JsonTraceFile {
    fn trace(
        &self,
        _request: &TraceRequest,
        _cache: &mut TraceCache,
    ) -> Result<TraceGraph, TraceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| TraceError::Io {
            path: self.path.clone(),
            source,
        })?;
        TraceGraph::from_json(&content).map_err(|source| TraceError::InvalidTraceFile {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_json_trace_file_loads_graph() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.json");
        std::fs::write(
            &path,
            r#"{"/app/node_modules/x/index.js": {"parents": ["/app/src/index.js"]}}"#,
        )
        .unwrap();

        let graph = JsonTraceFile::new(&path)
            .trace(&TraceRequest::default(), &mut TraceCache::default())
            .unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph
            .get(Path::new("/app/node_modules/x/index.js"))
            .unwrap()
            .parents
            .contains(Path::new("/app/src/index.js")));
    }

    #[test]
    fn test_json_trace_file_errors() {
        let dir = tempdir().unwrap();
        let missing = JsonTraceFile::new(dir.path().join("nope.json"));
        assert!(matches!(
            missing.trace(&TraceRequest::default(), &mut TraceCache::default()),
            Err(TraceError::Io { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "[]").unwrap();
        assert!(matches!(
            JsonTraceFile::new(&bad).trace(&TraceRequest::default(), &mut TraceCache::default()),
            Err(TraceError::InvalidTraceFile { .. })
        ));
    }
}
