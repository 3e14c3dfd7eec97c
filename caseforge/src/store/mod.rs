//! Persistence port for artifacts and run timelines.
//!
//! The persistence format itself lives outside this crate; embedding
//! callers supply their own store. The in-memory implementation here is the
//! default for tests and in-process use. Stores must serialize writes per
//! run id and return a run's events in append order.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::{Artifact, RunEvent};
use crate::errors::StoreError;
use crate::stages::StageName;

/// Abstract persistence for run artifacts and events.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persists one artifact version.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend rejects the write.
    async fn save_artifact(&self, run_id: Uuid, artifact: &Artifact) -> Result<(), StoreError>;

    /// Appends one event to the run's timeline.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend rejects the write.
    async fn append_event(&self, run_id: Uuid, event: &RunEvent) -> Result<(), StoreError>;

    /// Loads the latest version of a stage's artifact.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails; an absent artifact
    /// is `Ok(None)`.
    async fn load_latest_artifact(
        &self,
        run_id: Uuid,
        stage: StageName,
    ) -> Result<Option<Artifact>, StoreError>;

    /// Loads every retained version of a stage's artifact, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn load_artifact_versions(
        &self,
        run_id: Uuid,
        stage: StageName,
    ) -> Result<Vec<Artifact>, StoreError>;

    /// Loads the run's events in append order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backend fails.
    async fn load_events(&self, run_id: Uuid) -> Result<Vec<RunEvent>, StoreError>;
}

#[derive(Debug, Default)]
struct RunRecord {
    artifacts: HashMap<StageName, Vec<Artifact>>,
    events: Vec<RunEvent>,
}

/// In-memory artifact store.
///
/// The per-run record sits behind one map entry, so writes for a given run
/// id are serialized by the entry lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    runs: DashMap<Uuid, RunRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of runs with any persisted state.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn save_artifact(&self, run_id: Uuid, artifact: &Artifact) -> Result<(), StoreError> {
        let mut record = self.runs.entry(run_id).or_default();
        record
            .artifacts
            .entry(artifact.stage)
            .or_default()
            .push(artifact.clone());
        Ok(())
    }

    async fn append_event(&self, run_id: Uuid, event: &RunEvent) -> Result<(), StoreError> {
        let mut record = self.runs.entry(run_id).or_default();
        record.events.push(event.clone());
        Ok(())
    }

    async fn load_latest_artifact(
        &self,
        run_id: Uuid,
        stage: StageName,
    ) -> Result<Option<Artifact>, StoreError> {
        Ok(self.runs.get(&run_id).and_then(|record| {
            record
                .artifacts
                .get(&stage)
                .and_then(|versions| versions.last().cloned())
        }))
    }

    async fn load_artifact_versions(
        &self,
        run_id: Uuid,
        stage: StageName,
    ) -> Result<Vec<Artifact>, StoreError> {
        Ok(self
            .runs
            .get(&run_id)
            .and_then(|record| record.artifacts.get(&stage).cloned())
            .unwrap_or_default())
    }

    async fn load_events(&self, run_id: Uuid) -> Result<Vec<RunEvent>, StoreError> {
        Ok(self
            .runs
            .get(&run_id)
            .map(|record| record.events.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_load_latest() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();

        let v1 = Artifact::new(StageName::Setting, json!({"era": "1923"}));
        let v2 = v1.next_version(json!({"era": "1924"}));
        store.save_artifact(run_id, &v1).await.unwrap();
        store.save_artifact(run_id, &v2).await.unwrap();

        let latest = store
            .load_latest_artifact(run_id, StageName::Setting)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, 2);

        let versions = store
            .load_artifact_versions(run_id, StageName::Setting)
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, 1);
    }

    #[tokio::test]
    async fn test_absent_artifact_is_none() {
        let store = MemoryStore::new();
        let latest = store
            .load_latest_artifact(Uuid::new_v4(), StageName::Prose)
            .await
            .unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_events_kept_in_append_order() {
        let store = MemoryStore::new();
        let run_id = Uuid::new_v4();

        for i in 0..5 {
            let event = RunEvent::new(format!("event.{i}"));
            store.append_event(run_id, &event).await.unwrap();
        }

        let events = store.load_events(run_id).await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["event.0", "event.1", "event.2", "event.3", "event.4"]);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        store
            .save_artifact(a, &Artifact::new(StageName::Setting, json!({})))
            .await
            .unwrap();

        assert!(store
            .load_latest_artifact(b, StageName::Setting)
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.run_count(), 1);
    }
}
