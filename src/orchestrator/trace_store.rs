//! Run trace persistence
//!
//! Each finished run is written as `<run_id>.json` inside a directory, wrapped
//! in a small versioned envelope.

use crate::orchestrator::plan_types::RunTrace;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

const TRACE_FORMAT_VERSION: u32 = 1;

/// Trace persistence failures
#[derive(Error, Debug)]
pub enum TraceStoreError {
    /// File I/O error
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// File decoded but is not usable
    #[error("Invalid Data: {0}")]
    InvalidData(String),
}

/// On-disk envelope
#[derive(Debug, Serialize, Deserialize)]
struct StoredTrace {
    /// Format version (for future migration support)
    version: u32,
    trace: RunTrace,
}

/// Directory of persisted run traces
#[derive(Debug, Clone)]
pub struct TraceStore {
    dir: PathBuf,
}

impl TraceStore {
    /// Open `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TraceStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Storage directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", run_id))
    }

    /// Write `trace`, replacing any previous file for the same run
    pub fn save(&self, trace: &RunTrace) -> Result<PathBuf, TraceStoreError> {
        let envelope = StoredTrace {
            version: TRACE_FORMAT_VERSION,
            trace: trace.clone(),
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        let path = self.path_for(trace.run_id);
        // write-then-rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(run_id = %trace.run_id, path = %path.display(), "Run trace saved");
        Ok(path)
    }

    /// Load the trace for `run_id`, `Ok(None)` if it was never saved
    pub fn load(&self, run_id: Uuid) -> Result<Option<RunTrace>, TraceStoreError> {
        let contents = match fs::read_to_string(self.path_for(run_id)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredTrace = serde_json::from_str(&contents)?;
        if stored.version != TRACE_FORMAT_VERSION {
            return Err(TraceStoreError::InvalidData(format!(
                "Unsupported trace version {}",
                stored.version
            )));
        }
        if stored.trace.run_id != run_id {
            return Err(TraceStoreError::InvalidData(format!(
                "File for run {} holds run {}",
                run_id, stored.trace.run_id
            )));
        }
        Ok(Some(stored.trace))
    }

    /// Ids of every stored run
    pub fn list(&self) -> Result<Vec<Uuid>, TraceStoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::plan_types::{Goal, Plan};
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::open(dir.path().join("traces")).unwrap();

        let mut trace = RunTrace::new(Goal::new("goal"));
        trace.plan = Some(Plan::from_descriptions(["A", "B"]));
        let path = store.save(&trace).unwrap();
        assert!(path.exists());

        let loaded = store.load(trace.run_id).unwrap().unwrap();
        assert_eq!(loaded, trace);
        assert_eq!(store.list().unwrap(), vec![trace.run_id]);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        assert!(store.load(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        let trace = RunTrace::new(Goal::new("goal"));
        let json = serde_json::json!({ "version": 99, "trace": trace });
        fs::write(
            dir.path().join(format!("{}.json", trace.run_id)),
            json.to_string(),
        )
        .unwrap();

        let err = store.load(trace.run_id).unwrap_err();
        assert!(matches!(err, TraceStoreError::InvalidData(_)));
    }

    #[test]
    fn test_corrupt_file_is_json_error() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        let id = Uuid::new_v4();
        fs::write(dir.path().join(format!("{}.json", id)), "{not json").unwrap();
        assert!(matches!(store.load(id), Err(TraceStoreError::Json(_))));
    }
}
