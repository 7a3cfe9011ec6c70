//! In-process artifact store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use newsroom_shared::{ArtifactKind, Result};

use crate::{ArtifactStore, RunRecord};

/// Volatile store for tests and `--dry-run` style invocations.
#[derive(Default)]
pub struct MemoryStore {
    artifacts: Mutex<HashMap<(String, ArtifactKind), String>>,
    runs: Mutex<Vec<RunRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved artifacts across all slugs.
    pub async fn len(&self) -> usize {
        self.artifacts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.lock().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save(&self, slug: &str, kind: ArtifactKind, json: &str) -> Result<()> {
        self.artifacts
            .lock()
            .await
            .insert((slug.to_string(), kind), json.to_string());
        Ok(())
    }

    async fn load(&self, kind: ArtifactKind, slug: &str) -> Result<String> {
        self.artifacts
            .lock()
            .await
            .get(&(slug.to_string(), kind))
            .cloned()
            .ok_or_else(|| kind.not_found(slug))
    }

    async fn kinds(&self, slug: &str) -> Result<Vec<ArtifactKind>> {
        let map = self.artifacts.lock().await;
        Ok(ArtifactKind::ALL
            .into_iter()
            .filter(|k| map.contains_key(&(slug.to_string(), *k)))
            .collect())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        let mut runs = self.runs.lock().await;
        match runs.iter_mut().find(|r| r.id == run.id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }
        Ok(())
    }

    async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let runs = self.runs.lock().await;
        Ok(runs.iter().rev().take(limit as usize).cloned().collect())
    }
}
