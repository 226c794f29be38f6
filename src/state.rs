//! Application state
//!
//! Shared by every handler behind `Arc<RwLock<AppState>>`: the generation
//! service, the live orchestrator configuration, and the traces of recent runs.
//! Trace files are read and written on the blocking pool with no lock held.

use crate::generation::GenerationService;
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::plan_types::RunTrace;
use crate::orchestrator::runner::Orchestrator;
use crate::orchestrator::trace_store::{TraceStore, TraceStoreError};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Traces kept in memory before the oldest is evicted
pub const MAX_RECENT_RUNS: usize = 256;

/// Bounded in-memory map of recent run traces
#[derive(Debug)]
pub struct RunRegistry {
    traces: HashMap<Uuid, RunTrace>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl RunRegistry {
    /// Registry holding at most `capacity` traces
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            traces: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Store `trace`, evicting the oldest entry when full
    pub fn insert(&mut self, trace: RunTrace) {
        let run_id = trace.run_id;
        if self.traces.insert(run_id, trace).is_none() {
            self.order.push_back(run_id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.traces.remove(&oldest);
            }
        }
    }

    /// Trace for `run_id`
    pub fn get(&self, run_id: &Uuid) -> Option<&RunTrace> {
        self.traces.get(run_id)
    }

    /// Ids held, oldest first
    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.order.iter().copied()
    }

    /// Number of traces held
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// True when no trace is held
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

/// Application state
pub struct AppState {
    service: Arc<dyn GenerationService>,
    config: OrchestratorConfig,
    runs: RunRegistry,
    trace_store: Option<TraceStore>,
}

impl AppState {
    /// State over `service` with `config`
    pub fn new(service: Arc<dyn GenerationService>, config: OrchestratorConfig) -> Self {
        Self {
            service,
            config,
            runs: RunRegistry::with_capacity(MAX_RECENT_RUNS),
            trace_store: None,
        }
    }

    /// Also persist traces to `store`
    pub fn with_trace_store(mut self, store: TraceStore) -> Self {
        self.trace_store = Some(store);
        self
    }

    /// Generation service shared by all runs
    pub fn service(&self) -> Arc<dyn GenerationService> {
        self.service.clone()
    }

    /// Current orchestrator configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Replace the orchestrator configuration
    pub fn set_config(&mut self, config: OrchestratorConfig) {
        self.config = config;
    }

    /// Orchestrator for one run with the current configuration
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.service.clone(), self.config.clone())
    }

    /// Keep `trace` in memory
    pub fn remember_run(&mut self, trace: RunTrace) {
        self.runs.insert(trace);
    }

    /// Trace for `run_id` if it is still held in memory
    pub fn cached_run(&self, run_id: &Uuid) -> Option<RunTrace> {
        self.runs.get(run_id).cloned()
    }

    /// Trace store, when persistence is enabled
    pub fn trace_store(&self) -> Option<TraceStore> {
        self.trace_store.clone()
    }
}

fn join_failure(e: tokio::task::JoinError) -> TraceStoreError {
    TraceStoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

/// Remember a finished run and persist it; persistence failures are logged, not returned
pub async fn record_run(state: &Arc<RwLock<AppState>>, trace: RunTrace) {
    let store = {
        let mut state_write = state.write().await;
        state_write.remember_run(trace.clone());
        state_write.trace_store()
    };
    let Some(store) = store else {
        return;
    };

    let run_id = trace.run_id;
    let saved = tokio::task::spawn_blocking(move || store.save(&trace))
        .await
        .map_err(join_failure)
        .and_then(|result| result);
    if let Err(e) = saved {
        tracing::warn!(run_id = %run_id, error = %e, "Failed to persist run trace");
    }
}

/// Trace for `run_id`, from memory first, then the trace store
pub async fn find_run(
    state: &Arc<RwLock<AppState>>,
    run_id: Uuid,
) -> Result<Option<RunTrace>, TraceStoreError> {
    let store = {
        let state_read = state.read().await;
        if let Some(trace) = state_read.cached_run(&run_id) {
            return Ok(Some(trace));
        }
        state_read.trace_store()
    };

    match store {
        Some(store) => tokio::task::spawn_blocking(move || store.load(run_id))
            .await
            .map_err(join_failure)?,
        None => Ok(None),
    }
}

/// Ids of every known run, in memory or on disk, sorted and without duplicates
pub async fn list_runs(state: &Arc<RwLock<AppState>>) -> Result<Vec<Uuid>, TraceStoreError> {
    let (mut ids, store) = {
        let state_read = state.read().await;
        (state_read.runs.ids().collect::<Vec<_>>(), state_read.trace_store())
    };

    if let Some(store) = store {
        let stored = tokio::task::spawn_blocking(move || store.list())
            .await
            .map_err(join_failure)??;
        ids.extend(stored);
    }

    ids.sort();
    ids.dedup();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedService;
    use crate::orchestrator::plan_types::Goal;
    use tempfile::TempDir;

    #[test]
    fn test_registry_evicts_oldest() {
        let mut registry = RunRegistry::with_capacity(2);
        let first = RunTrace::new(Goal::new("a"));
        let second = RunTrace::new(Goal::new("b"));
        let third = RunTrace::new(Goal::new("c"));

        registry.insert(first.clone());
        registry.insert(second.clone());
        registry.insert(third.clone());

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&first.run_id).is_none());
        assert!(registry.get(&third.run_id).is_some());
    }

    #[tokio::test]
    async fn test_find_run_falls_back_to_store() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        let trace = RunTrace::new(Goal::new("persisted"));
        store.save(&trace).unwrap();

        let state = Arc::new(RwLock::new(
            AppState::new(
                Arc::new(ScriptedService::new(Vec::new())),
                OrchestratorConfig::default(),
            )
            .with_trace_store(store),
        ));

        assert!(state.read().await.runs.is_empty());
        assert_eq!(find_run(&state, trace.run_id).await.unwrap(), Some(trace));
        assert_eq!(find_run(&state, Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_run_writes_memory_and_store() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(RwLock::new(
            AppState::new(
                Arc::new(ScriptedService::new(Vec::new())),
                OrchestratorConfig::default(),
            )
            .with_trace_store(TraceStore::open(dir.path()).unwrap()),
        ));

        let trace = RunTrace::new(Goal::new("g"));
        record_run(&state, trace.clone()).await;

        assert_eq!(state.read().await.runs.len(), 1);
        assert!(dir.path().join(format!("{}.json", trace.run_id)).exists());
    }

    #[tokio::test]
    async fn test_record_run_without_store_keeps_memory_only() {
        let state = Arc::new(RwLock::new(AppState::new(
            Arc::new(ScriptedService::new(Vec::new())),
            OrchestratorConfig::default(),
        )));

        let trace = RunTrace::new(Goal::new("g"));
        record_run(&state, trace.clone()).await;

        assert_eq!(find_run(&state, trace.run_id).await.unwrap(), Some(trace));
    }

    #[tokio::test]
    async fn test_list_runs_merges_memory_and_store() {
        let dir = TempDir::new().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        let on_disk = RunTrace::new(Goal::new("old"));
        store.save(&on_disk).unwrap();

        let state = Arc::new(RwLock::new(
            AppState::new(
                Arc::new(ScriptedService::new(Vec::new())),
                OrchestratorConfig::default(),
            )
            .with_trace_store(store),
        ));
        let fresh = RunTrace::new(Goal::new("new"));
        record_run(&state, fresh.clone()).await;

        let mut expected = vec![on_disk.run_id, fresh.run_id];
        expected.sort();
        assert_eq!(list_runs(&state).await.unwrap(), expected);
    }

    #[test]
    fn test_registry_ids_in_insertion_order() {
        let mut registry = RunRegistry::with_capacity(4);
        let first = RunTrace::new(Goal::new("a"));
        let second = RunTrace::new(Goal::new("b"));
        registry.insert(first.clone());
        registry.insert(second.clone());
        assert_eq!(
            registry.ids().collect::<Vec<_>>(),
            vec![first.run_id, second.run_id]
        );
    }
}
