//! Pipeline orchestrator.
//!
//! Owns the ordered stage graph. For each stage it assembles context from
//! the project spec and valid upstream artifacts, drives generation within
//! the stage's attempt ceiling, validates every parsed candidate, routes
//! validation failures through the revision engine, and decides whether to
//! advance, degrade, or abort. Every attempt lands on the run's persisted
//! timeline.

pub mod cancellation;
pub mod state;


pub use cancellation::CancellationToken;
pub use state::{StageExecution, StagePhase};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::core::{
    Artifact, Run, RunEvent, RunResult, RunState, RunStatus, StageDisposition, StageOutcome,
    Usage,
};
use crate::errors::{CaseforgeError, FailureKind, StageFailureReport};
use crate::events::{EventSink, NoOpEventSink};
use crate::generation::{call_with_retry, GenerationPort, GenerationRequest, UsageMeter};
use crate::revision::{RevisionEngine, RevisionOutcome, RevisionResult};
use crate::scoring::{ReleaseGate, Scorer};
use crate::stages::{StageName, StageSpec};
use crate::store::ArtifactStore;
use crate::validation::{validate, ValidationContext};

/// Shared, externally readable status of a running pipeline.
pub type StatusCell = Arc<parking_lot::RwLock<RunStatus>>;

/// The user-provided specification a run elaborates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Owning project id.
    pub project_id: String,
    /// Working title.
    pub title: String,
    /// The premise to elaborate.
    pub premise: String,
    /// Target prose length in words.
    pub target_length: u32,
    /// Requested narrative style.
    pub narrative_style: String,
    /// Free-form constraints passed through to generation context.
    #[serde(default)]
    pub constraints: Value,
}

/// How one stage resolved, as seen by the run loop.
struct ResolvedStage {
    disposition: StageDisposition,
    artifact: Option<Artifact>,
    usage: Usage,
    calls: u64,
    warnings: Vec<String>,
    failure: Option<StageFailureReport>,
}

enum StageSignal {
    Resolved(Box<ResolvedStage>),
    Cancelled,
}

/// Drives a project spec through the full stage graph.
pub struct Orchestrator {
    port: Arc<dyn GenerationPort>,
    store: Arc<dyn ArtifactStore>,
    sink: Arc<dyn EventSink>,
    meter: Arc<UsageMeter>,
    config: PipelineConfig,
}

impl Orchestrator {
    /// Creates an orchestrator over a port and store with defaults.
    #[must_use]
    pub fn new(port: Arc<dyn GenerationPort>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            port,
            store,
            sink: Arc::new(NoOpEventSink),
            meter: Arc::new(UsageMeter::new()),
            config: PipelineConfig::default(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the process-wide usage meter.
    #[must_use]
    pub fn with_meter(mut self, meter: Arc<UsageMeter>) -> Self {
        self.meter = meter;
        self
    }

    /// Sets the pipeline configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The artifact store this orchestrator persists into.
    #[must_use]
    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.store)
    }

    /// Runs the full pipeline for a project spec.
    ///
    /// Stage failures and gate blocks are reported on the returned
    /// [`RunResult`], not raised.
    ///
    /// # Errors
    ///
    /// Returns a [`CaseforgeError`] only for infrastructure problems:
    /// persistence failures, invalid configuration, or an exhausted
    /// process-wide budget.
    pub async fn run_pipeline(&self, spec: &ProjectSpec) -> Result<RunResult, CaseforgeError> {
        self.execute(spec, Uuid::new_v4(), CancellationToken::new(), None)
            .await
    }

    /// Runs the pipeline under an externally held run id and cancellation
    /// token, optionally publishing live status into `status`.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run_pipeline`].
    pub async fn execute(
        &self,
        spec: &ProjectSpec,
        run_id: Uuid,
        cancel: Arc<CancellationToken>,
        status: Option<StatusCell>,
    ) -> Result<RunResult, CaseforgeError> {
        self.config.validate()?;

        let mut run = Run::with_id(run_id, &spec.project_id);
        run.state = RunState::Running;
        publish_status(&status, &run, &[], None);
        self.record_event(run_id, RunEvent::run_started(&spec.project_id))
            .await?;

        tracing::info!(run_id = %run_id, project = %spec.project_id, "Run started");

        let mut ctx = ValidationContext::new();
        let mut completed: HashMap<StageName, StageDisposition> = HashMap::new();
        let mut outcomes: Vec<StageOutcome> = Vec::new();
        let mut artifacts: Vec<Artifact> = Vec::new();
        let total = self.config.stages.len();

        for (index, stage_spec) in self.config.stages.iter().enumerate() {
            if cancel.is_cancelled() {
                return self
                    .finish_aborted(run, outcomes, &cancel, &status)
                    .await;
            }

            run.current_stage = Some(stage_spec.name);
            publish_status(&status, &run, &[], None);
            let percent = (index * 100 / total) as u8;
            self.record_event(run_id, RunEvent::run_progress(stage_spec.name, percent))
                .await?;

            // A soft dependency may have failed outright; note it and
            // proceed with whatever context exists.
            for dep in &stage_spec.depends_on {
                if completed.get(dep) == Some(&StageDisposition::Failed) {
                    run.warn(format!(
                        "stage '{}' proceeding without failed upstream '{dep}'",
                        stage_spec.name
                    ));
                }
            }

            let started = Instant::now();
            let flow = self
                .execute_stage(spec, stage_spec, run_id, &ctx, &cancel)
                .await?;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let resolved = match flow {
                StageSignal::Cancelled => {
                    return self
                        .finish_aborted(run, outcomes, &cancel, &status)
                        .await;
                }
                StageSignal::Resolved(resolved) => *resolved,
            };

            run.usage
                .add(stage_spec.name, resolved.usage, resolved.calls);
            run.usage.record_duration(stage_spec.name, elapsed_ms);
            for warning in resolved.warnings {
                run.warn(warning);
            }

            completed.insert(stage_spec.name, resolved.disposition);
            outcomes.push(StageOutcome {
                stage: stage_spec.name,
                disposition: resolved.disposition,
                version: resolved.artifact.as_ref().map_or(0, |a| a.version),
                error_count: resolved.artifact.as_ref().map_or(0, |a| a.errors.len()),
            });

            if let Some(artifact) = resolved.artifact {
                ctx.insert(artifact.kind, artifact.content.clone());
                artifacts.push(artifact);
            }

            if resolved.disposition == StageDisposition::Failed {
                run.complete(RunState::Failed);
                self.record_event(run_id, RunEvent::run_completed("failed"))
                    .await?;
                publish_status(&status, &run, &[], None);
                return Ok(RunResult {
                    run_id,
                    state: RunState::Failed,
                    stages: outcomes,
                    scores: Vec::new(),
                    gate: None,
                    failure: resolved.failure,
                    warnings: run.warnings,
                    usage: run.usage,
                });
            }
        }

        // All stages resolved; compute phase scores and run the gate.
        let scorer = Scorer::new(
            self.config.weights,
            self.config.floors,
            self.config.composite_threshold,
        );
        let scores = scorer.score_run(&artifacts, &ctx);
        let mandatory: HashSet<StageName> = self
            .config
            .stages
            .iter()
            .filter(|s| s.mandatory)
            .map(|s| s.name)
            .collect();
        let gate = ReleaseGate::new().evaluate(&scores, &artifacts, &ctx, &mandatory);

        let state = if gate.pass {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        run.complete(state);
        self.record_event(run_id, RunEvent::run_completed(&state.to_string()))
            .await?;
        publish_status(&status, &run, &scores, Some(&gate));

        tracing::info!(
            state = %state,
            gate_pass = gate.pass,
            total_cost = run.usage.total_cost(),
            "Run finished"
        );

        Ok(RunResult {
            run_id,
            state,
            stages: outcomes,
            scores,
            gate: Some(gate),
            failure: None,
            warnings: run.warnings,
            usage: run.usage,
        })
    }

    async fn finish_aborted(
        &self,
        mut run: Run,
        outcomes: Vec<StageOutcome>,
        cancel: &CancellationToken,
        status: &Option<StatusCell>,
    ) -> Result<RunResult, CaseforgeError> {
        let run_id = run.id;
        run.warn(format!("run aborted: {}", cancel.reason()));
        run.complete(RunState::Aborted);
        self.record_event(run_id, RunEvent::run_completed("aborted"))
            .await?;
        publish_status(status, &run, &[], None);
        Ok(RunResult {
            run_id,
            state: RunState::Aborted,
            stages: outcomes,
            scores: Vec::new(),
            gate: None,
            failure: None,
            warnings: run.warnings,
            usage: run.usage,
        })
    }

    /// Runs one stage's bounded state machine to a terminal disposition.
    async fn execute_stage(
        &self,
        project: &ProjectSpec,
        spec: &StageSpec,
        run_id: Uuid,
        ctx: &ValidationContext,
        cancel: &CancellationToken,
    ) -> Result<StageSignal, CaseforgeError> {
        let mut exec = StageExecution::new(spec.name);
        let mut usage = Usage::default();
        let mut calls = 0u64;
        let mut candidate: Option<Artifact> = None;

        let context = build_stage_context(project, spec, ctx);
        let request = GenerationRequest::new(spec.name, spec.name.intent(), context)
            .with_timeout(self.config.generation_timeout);
        let retry = self
            .config
            .retry
            .clone()
            .with_max_attempts(spec.max_generation_attempts);

        loop {
            match exec.phase {
                StagePhase::Generating => {
                    if !exec.try_consume_generation_attempt(spec) {
                        let reason = format!(
                            "structured output failed to parse after {} attempts",
                            spec.max_generation_attempts
                        );
                        return Ok(self.fail_or_degrade(
                            spec,
                            run_id,
                            None,
                            FailureKind::MalformedOutput,
                            vec![reason],
                            usage,
                            calls,
                        )
                        .await?);
                    }

                    let response = match call_with_retry(
                        self.port.as_ref(),
                        &request,
                        &retry,
                        &self.meter,
                        cancel,
                    )
                    .await
                    {
                        Ok(response) => response,
                        Err(CaseforgeError::Generation(err)) if err.is_cancelled() => {
                            return Ok(StageSignal::Cancelled);
                        }
                        Err(CaseforgeError::Generation(err)) => {
                            self.record_event(
                                run_id,
                                RunEvent::generation_failed(
                                    spec.name,
                                    exec.generation_attempts,
                                    &err.to_string(),
                                ),
                            )
                            .await?;
                            return Ok(self.fail_or_degrade(
                                spec,
                                run_id,
                                None,
                                FailureKind::TransportFailure,
                                vec![err.to_string()],
                                usage,
                                calls,
                            )
                            .await?);
                        }
                        Err(other) => return Err(other),
                    };

                    usage.merge(response.usage);
                    calls += 1;
                    self.record_event(
                        run_id,
                        RunEvent::generation_succeeded(
                            spec.name,
                            exec.generation_attempts,
                            response.usage.cost,
                        ),
                    )
                    .await?;

                    match serde_json::from_str::<Value>(&response.content) {
                        Ok(content) => {
                            exec.latest_version += 1;
                            let mut artifact = Artifact::new(spec.name, content);
                            artifact.version = exec.latest_version;
                            candidate = Some(artifact);
                            exec.begin_validation();
                        }
                        Err(parse_err) => {
                            tracing::warn!(
                                stage = %spec.name,
                                attempt = exec.generation_attempts,
                                error = %parse_err,
                                "Discarding unparsable generation output"
                            );
                            exec.begin_generation();
                        }
                    }
                }

                StagePhase::Validating => {
                    let Some(mut artifact) = candidate.take() else {
                        return Err(CaseforgeError::Internal(
                            "validating with no candidate artifact".to_string(),
                        ));
                    };
                    let report = validate(spec.name.kind(), &artifact.content, ctx);
                    self.record_event(
                        run_id,
                        RunEvent::validation_checked(
                            spec.name,
                            artifact.version,
                            report.valid,
                            report.errors.len(),
                        ),
                    )
                    .await?;

                    if report.valid {
                        artifact.mark_valid();
                        self.store.save_artifact(run_id, &artifact).await?;
                        self.record_event(
                            run_id,
                            RunEvent::stage_completed(spec.name, artifact.version),
                        )
                        .await?;
                        exec.complete(StageDisposition::Valid);
                        return Ok(StageSignal::Resolved(Box::new(ResolvedStage {
                            disposition: StageDisposition::Valid,
                            artifact: Some(artifact),
                            usage,
                            calls,
                            warnings: Vec::new(),
                            failure: None,
                        })));
                    }

                    artifact.mark_invalid(report.errors);
                    self.store.save_artifact(run_id, &artifact).await?;
                    candidate = Some(artifact);
                    exec.begin_revision();
                }

                StagePhase::Revising => {
                    let Some(artifact) = candidate.take() else {
                        return Err(CaseforgeError::Internal(
                            "revising with no candidate artifact".to_string(),
                        ));
                    };
                    let errors = artifact.errors.clone();
                    let engine = RevisionEngine::new(
                        self.port.as_ref(),
                        &self.meter,
                        &self.config.retry,
                        cancel,
                        self.config.generation_timeout,
                    );
                    let result = match engine.revise(spec, artifact, errors, ctx).await {
                        Ok(result) => result,
                        Err(CaseforgeError::Generation(err)) if err.is_cancelled() => {
                            return Ok(StageSignal::Cancelled);
                        }
                        Err(CaseforgeError::Generation(err)) => {
                            return Ok(self.fail_or_degrade(
                                spec,
                                run_id,
                                None,
                                FailureKind::TransportFailure,
                                vec![format!("repair call failed: {err}")],
                                usage,
                                calls,
                            )
                            .await?);
                        }
                        Err(other) => return Err(other),
                    };

                    usage.merge(result.usage);
                    calls += result.attempts.len() as u64;
                    exec.revision_attempts = result.attempts.len();
                    self.persist_revision(run_id, spec.name, &result).await?;

                    match result.outcome {
                        RevisionOutcome::Fixed => {
                            self.record_event(
                                run_id,
                                RunEvent::validation_checked(
                                    spec.name,
                                    result.artifact.version,
                                    true,
                                    0,
                                ),
                            )
                            .await?;
                            self.record_event(
                                run_id,
                                RunEvent::stage_completed(spec.name, result.artifact.version),
                            )
                            .await?;
                            exec.complete(StageDisposition::Valid);
                            return Ok(StageSignal::Resolved(Box::new(ResolvedStage {
                                disposition: StageDisposition::Valid,
                                artifact: Some(result.artifact),
                                usage,
                                calls,
                                warnings: Vec::new(),
                                failure: None,
                            })));
                        }
                        _ => {
                            let reasons: Vec<String> = result
                                .artifact
                                .errors
                                .iter()
                                .map(ToString::to_string)
                                .collect();
                            return Ok(self.fail_or_degrade(
                                spec,
                                run_id,
                                Some(result.artifact),
                                FailureKind::ValidationFailure,
                                reasons,
                                usage,
                                calls,
                            )
                            .await?);
                        }
                    }
                }

                StagePhase::Complete(_) => {
                    return Err(CaseforgeError::Internal(
                        "stage loop re-entered after completion".to_string(),
                    ));
                }
            }
        }
    }

    /// Applies the mandatory-vs-soft decision for a stage that cannot
    /// reach valid.
    async fn fail_or_degrade(
        &self,
        spec: &StageSpec,
        run_id: Uuid,
        best: Option<Artifact>,
        kind: FailureKind,
        reasons: Vec<String>,
        usage: Usage,
        calls: u64,
    ) -> Result<StageSignal, CaseforgeError> {
        if spec.mandatory {
            let summary = reasons.first().cloned().unwrap_or_default();
            self.record_event(run_id, RunEvent::stage_failed(spec.name, &summary))
                .await?;
            return Ok(StageSignal::Resolved(Box::new(ResolvedStage {
                disposition: StageDisposition::Failed,
                artifact: best,
                usage,
                calls,
                warnings: Vec::new(),
                failure: Some(StageFailureReport::new(spec.name, kind, reasons)),
            })));
        }

        let mut warnings = vec![format!(
            "stage '{}' degraded ({kind}): {}",
            spec.name,
            reasons.first().cloned().unwrap_or_default()
        )];
        let artifact = match best {
            Some(mut artifact) => {
                artifact.degraded = true;
                self.store.save_artifact(run_id, &artifact).await?;
                self.record_event(
                    run_id,
                    RunEvent::stage_degraded(spec.name, artifact.errors.len()),
                )
                .await?;
                Some(artifact)
            }
            None => {
                warnings.push(format!(
                    "stage '{}' produced no usable artifact; downstream stages run without it",
                    spec.name
                ));
                self.record_event(run_id, RunEvent::stage_degraded(spec.name, 0))
                    .await?;
                None
            }
        };

        Ok(StageSignal::Resolved(Box::new(ResolvedStage {
            disposition: StageDisposition::Degraded,
            artifact,
            usage,
            calls,
            warnings,
            failure: None,
        })))
    }

    async fn persist_revision(
        &self,
        run_id: Uuid,
        stage: StageName,
        result: &RevisionResult,
    ) -> Result<(), CaseforgeError> {
        for version in &result.versions {
            self.store.save_artifact(run_id, version).await?;
        }
        for attempt in &result.attempts {
            let remaining = result
                .versions
                .iter()
                .find(|v| v.version == attempt.resulting_version)
                .map_or(attempt.errors_addressed.len(), |v| v.errors.len());
            self.record_event(
                run_id,
                RunEvent::revision_attempted(
                    stage,
                    attempt.attempt_number,
                    &attempt.outcome.to_string(),
                    remaining,
                ),
            )
            .await?;
        }
        Ok(())
    }

    async fn record_event(&self, run_id: Uuid, event: RunEvent) -> Result<(), CaseforgeError> {
        self.store.append_event(run_id, &event).await?;
        self.sink.emit(run_id, &event).await;
        Ok(())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish()
    }
}

fn publish_status(
    status: &Option<StatusCell>,
    run: &Run,
    scores: &[crate::scoring::PhaseScore],
    gate: Option<&crate::scoring::GateResult>,
) {
    if let Some(cell) = status {
        *cell.write() = RunStatus {
            state: run.state,
            current_stage: run.current_stage,
            scores: scores.to_vec(),
            gate: gate.cloned(),
        };
    }
}

/// Merges the project spec with the valid upstream artifacts a stage
/// declares.
fn build_stage_context(project: &ProjectSpec, spec: &StageSpec, ctx: &ValidationContext) -> Value {
    let mut upstream = serde_json::Map::new();
    for dep in &spec.depends_on {
        if let Some(content) = ctx.get(dep.kind()) {
            upstream.insert(dep.kind().as_str().to_string(), content.clone());
        }
    }
    json!({
        "project": {
            "title": project.title,
            "premise": project.premise,
            "target_length": project.target_length,
            "narrative_style": project.narrative_style,
            "constraints": project.constraints,
        },
        "artifacts": Value::Object(upstream),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::default_stages;
    use serde_json::json;

    fn project() -> ProjectSpec {
        ProjectSpec {
            project_id: "p-1".to_string(),
            title: "The Trewithen Affair".to_string(),
            premise: "A locked study, a rewound clock.".to_string(),
            target_length: 20_000,
            narrative_style: "classic fair-play".to_string(),
            constraints: Value::Null,
        }
    }

    #[test]
    fn test_build_stage_context_includes_declared_deps_only() {
        let stages = default_stages();
        let cast_spec = stages
            .iter()
            .find(|s| s.name == StageName::Cast)
            .unwrap()
            .clone();

        let mut ctx = ValidationContext::new();
        ctx.insert(crate::core::ArtifactKind::Setting, json!({"era": "1923"}));
        ctx.insert(crate::core::ArtifactKind::Background, json!({"summary": "s"}));
        ctx.insert(crate::core::ArtifactKind::Clues, json!({"clues": []}));

        let context = build_stage_context(&project(), &cast_spec, &ctx);
        let upstream = context["artifacts"].as_object().unwrap();
        assert!(upstream.contains_key("setting"));
        assert!(upstream.contains_key("background"));
        assert!(!upstream.contains_key("clues"));
        assert_eq!(context["project"]["title"], json!("The Trewithen Affair"));
    }
}
