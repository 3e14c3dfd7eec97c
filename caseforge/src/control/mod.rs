//! Run control surface: start, cancel, and observe concurrent runs.
//!
//! Runs share no mutable state beyond the persistence layer; each gets its
//! own cancellation token and status cell, and executes on its own task.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::{Artifact, RunEvent, RunResult, RunState, RunStatus};
use crate::errors::CaseforgeError;
use crate::pipeline::{CancellationToken, Orchestrator, ProjectSpec, StatusCell};
use crate::scoring::PhaseScore;
use crate::stages::StageName;

/// Read-only view of one stage's published output.
#[derive(Debug, Clone)]
pub struct StageOutput {
    /// The stage.
    pub stage: StageName,
    /// The latest artifact, present once the stage resolved with content.
    pub artifact: Option<Artifact>,
    /// The stage's phase score, present once scoring ran.
    pub score: Option<PhaseScore>,
}

struct RunHandle {
    cancel: Arc<CancellationToken>,
    status: StatusCell,
    result: Arc<RwLock<Option<RunResult>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// Starts and tracks concurrent pipeline runs.
pub struct RunManager {
    orchestrator: Arc<Orchestrator>,
    runs: DashMap<Uuid, RunHandle>,
}

impl RunManager {
    /// Creates a manager over an orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            runs: DashMap::new(),
        }
    }

    /// Starts a run for a project spec and returns its id immediately.
    #[must_use]
    pub fn start_run(&self, spec: ProjectSpec) -> Uuid {
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let status: StatusCell = Arc::new(RwLock::new(RunStatus::default()));
        let result: Arc<RwLock<Option<RunResult>>> = Arc::new(RwLock::new(None));

        let orchestrator = Arc::clone(&self.orchestrator);
        let task_cancel = Arc::clone(&cancel);
        let task_status = Arc::clone(&status);
        let task_result = Arc::clone(&result);

        let join = tokio::spawn(async move {
            match orchestrator
                .execute(&spec, run_id, task_cancel, Some(Arc::clone(&task_status)))
                .await
            {
                Ok(run_result) => {
                    *task_result.write() = Some(run_result);
                }
                Err(err) => {
                    tracing::error!(run_id = %run_id, error = %err, "Run failed with infrastructure error");
                    task_status.write().state = RunState::Failed;
                }
            }
        });

        self.runs.insert(
            run_id,
            RunHandle {
                cancel,
                status,
                result,
                join: Mutex::new(Some(join)),
            },
        );
        run_id
    }

    /// Requests cancellation of a run. Returns false for unknown run ids.
    pub fn cancel_run(&self, run_id: Uuid) -> bool {
        match self.runs.get(&run_id) {
            Some(handle) => {
                handle.cancel.cancel("cancelled by caller");
                true
            }
            None => false,
        }
    }

    /// Returns the run's current status snapshot.
    #[must_use]
    pub fn get_run_status(&self, run_id: Uuid) -> Option<RunStatus> {
        self.runs
            .get(&run_id)
            .map(|handle| handle.status.read().clone())
    }

    /// Returns the run's result once it finished.
    #[must_use]
    pub fn result(&self, run_id: Uuid) -> Option<RunResult> {
        self.runs
            .get(&run_id)
            .and_then(|handle| handle.result.read().clone())
    }

    /// Waits for a run to finish and returns its result.
    pub async fn wait(&self, run_id: Uuid) -> Option<RunResult> {
        let join = self
            .runs
            .get(&run_id)
            .and_then(|handle| handle.join.lock().take());
        if let Some(join) = join {
            let _ = join.await;
        }
        self.result(run_id)
    }

    /// The per-run read-only output surface: latest artifact and phase
    /// score for every configured stage, in stage order.
    ///
    /// # Errors
    ///
    /// Returns a [`CaseforgeError`] when the store fails.
    pub async fn stage_outputs(&self, run_id: Uuid) -> Result<Vec<StageOutput>, CaseforgeError> {
        let store = self.orchestrator.store();
        let scores = self
            .get_run_status(run_id)
            .map(|status| status.scores)
            .unwrap_or_default();

        let mut outputs = Vec::new();
        for spec in &self.orchestrator.config().stages {
            let artifact = store.load_latest_artifact(run_id, spec.name).await?;
            let score = scores.iter().find(|s| s.stage == spec.name).cloned();
            outputs.push(StageOutput {
                stage: spec.name,
                artifact,
                score,
            });
        }
        Ok(outputs)
    }

    /// The run's full event timeline, in append order.
    ///
    /// # Errors
    ///
    /// Returns a [`CaseforgeError`] when the store fails.
    pub async fn timeline(&self, run_id: Uuid) -> Result<Vec<RunEvent>, CaseforgeError> {
        Ok(self.orchestrator.store().load_events(run_id).await?)
    }
}

impl std::fmt::Debug for RunManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunManager")
            .field("tracked_runs", &self.runs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{fixtures, ScriptedPort};

    fn manager_with_scripted_run() -> (RunManager, Arc<ScriptedPort>) {
        let port = Arc::new(ScriptedPort::new());
        fixtures::script_full_run(&port);
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(port.clone(), store));
        (RunManager::new(orchestrator), port)
    }

    #[tokio::test]
    async fn test_start_and_wait_for_run() {
        let (manager, _port) = manager_with_scripted_run();
        let run_id = manager.start_run(fixtures::project_spec());

        let result = manager.wait(run_id).await.expect("run result");
        assert_eq!(result.state, RunState::Succeeded);

        let status = manager.get_run_status(run_id).expect("status");
        assert_eq!(status.state, RunState::Succeeded);
        assert!(status.gate.is_some());
    }

    #[tokio::test]
    async fn test_stage_outputs_expose_valid_artifacts_and_scores() {
        let (manager, _port) = manager_with_scripted_run();
        let run_id = manager.start_run(fixtures::project_spec());
        manager.wait(run_id).await.expect("run result");

        let outputs = manager.stage_outputs(run_id).await.unwrap();
        assert_eq!(outputs.len(), 10);
        for output in &outputs {
            let artifact = output.artifact.as_ref().expect("artifact");
            assert!(artifact.is_valid(), "stage {}", output.stage);
            assert!(output.score.is_some(), "stage {}", output.stage);
        }
    }

    #[tokio::test]
    async fn test_timeline_is_retrievable_in_order() {
        let (manager, _port) = manager_with_scripted_run();
        let run_id = manager.start_run(fixtures::project_spec());
        manager.wait(run_id).await.expect("run result");

        let timeline = manager.timeline(run_id).await.unwrap();
        assert_eq!(timeline.first().map(|e| e.event_type.as_str()), Some("run.started"));
        assert_eq!(timeline.last().map(|e| e.event_type.as_str()), Some("run.completed"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_is_false() {
        let (manager, _port) = manager_with_scripted_run();
        assert!(!manager.cancel_run(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_runs_share_store_but_stay_isolated() {
        let port = Arc::new(ScriptedPort::new());
        fixtures::script_full_run(&port);
        fixtures::script_full_run(&port);
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(port, store.clone()));
        let manager = RunManager::new(orchestrator);

        let a = manager.start_run(fixtures::project_spec());
        let result_a = manager.wait(a).await.expect("run a");
        let b = manager.start_run(fixtures::project_spec());
        let result_b = manager.wait(b).await.expect("run b");

        assert_ne!(a, b);
        assert_eq!(result_a.state, RunState::Succeeded);
        assert_eq!(result_b.state, RunState::Succeeded);
        assert_eq!(store.run_count(), 2);
        assert_ne!(
            manager.timeline(a).await.unwrap().len(),
            0,
            "each run keeps its own timeline"
        );
    }
}
