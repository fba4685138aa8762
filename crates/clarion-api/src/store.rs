//! Run persistence boundary and the in-memory implementation.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use thiserror::Error;

use clarion_core::{Run, RunState};

const DEFAULT_IN_MEMORY_RUN_LIMIT: usize = 5_000;

/// Store error types
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    NotFound(String),
    #[error("store internal error: {0}")]
    Internal(String),
}

/// Persistence boundary for runs. The engine mutates runs in memory; the
/// host decides where they live between operations.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist the full run state (insert or overwrite)
    async fn save(&self, run: &Run) -> Result<(), StoreError>;

    /// Load a run by id
    async fn load(&self, run_id: &str) -> Result<Option<Run>, StoreError>;

    /// All runs currently in the given state
    async fn list_by_state(&self, state: RunState) -> Result<Vec<Run>, StoreError>;

    /// Remove a run; returns whether it existed
    async fn delete(&self, run_id: &str) -> Result<bool, StoreError>;
}

/// In-memory implementation for development and testing.
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<String, Run>>,
    order: RwLock<VecDeque<String>>,
    max_runs: usize,
}

impl InMemoryRunStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::with_max_runs(DEFAULT_IN_MEMORY_RUN_LIMIT)
    }

    /// Create a new in-memory store with a hard capacity limit.
    pub fn with_max_runs(max_runs: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            order: RwLock::new(VecDeque::new()),
            max_runs: max_runs.max(1),
        }
    }

    fn touch_order(order: &mut VecDeque<String>, run_id: &str) {
        order.retain(|id| id != run_id);
        order.push_back(run_id.to_string());
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self
            .runs
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut order = self
            .order
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;

        if !runs.contains_key(run.id.as_str()) && runs.len() >= self.max_runs {
            if let Some(oldest_id) = order.pop_front() {
                runs.remove(&oldest_id);
            }
        }
        runs.insert(run.id.clone(), run.clone());
        Self::touch_order(&mut order, run.id.as_str());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        let runs = self
            .runs
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(runs.get(run_id).cloned())
    }

    async fn list_by_state(&self, state: RunState) -> Result<Vec<Run>, StoreError> {
        let runs = self
            .runs
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(runs
            .values()
            .filter(|run| run.state == state)
            .cloned()
            .collect())
    }

    async fn delete(&self, run_id: &str) -> Result<bool, StoreError> {
        let mut runs = self
            .runs
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let removed = runs.remove(run_id).is_some();
        if removed {
            let mut order = self
                .order
                .write()
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            order.retain(|id| id != run_id);
        }
        Ok(removed)
    }
}
