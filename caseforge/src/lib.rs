//! # Caseforge
//!
//! A control plane that turns unreliable text-generation calls into a
//! dependable artifact pipeline for structured mystery fiction.
//!
//! Caseforge elaborates a small project spec into a case model, cast and
//! location profiles, clues, an outline, and prose by driving a fixed-order
//! stage graph against an abstract generation port:
//!
//! - **Orchestration**: dependency-gated stages with bounded attempt
//!   ceilings and an explicit per-stage state machine
//! - **Validation**: declared schemas plus cross-record narrative rules,
//!   reported as a flat typed error list
//! - **Revision**: minimal, targeted repair requests with frozen-path
//!   anti-regression checks and bounded escalation
//! - **Scoring & release gate**: four-dimension phase scores with floors,
//!   and hard structural conditions no score can buy back
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use caseforge::prelude::*;
//! use std::sync::Arc;
//!
//! let orchestrator = Arc::new(
//!     Orchestrator::new(port, Arc::new(MemoryStore::new()))
//!         .with_sink(Arc::new(LoggingEventSink::default())),
//! );
//! let manager = RunManager::new(orchestrator);
//! let run_id = manager.start_run(spec);
//! let result = manager.wait(run_id).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod config;
pub mod control;
pub mod core;
pub mod errors;
pub mod events;
pub mod generation;
pub mod observability;
pub mod pipeline;
pub mod revision;
pub mod scoring;
pub mod stages;
pub mod store;
pub mod testing;
pub mod utils;
pub mod validation;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::control::{RunManager, StageOutput};
    pub use crate::core::{
        Artifact, ArtifactKind, ArtifactStatus, Run, RunEvent, RunResult, RunState, RunStatus,
        StageDisposition, Usage, UsageTotals,
    };
    pub use crate::errors::{
        CaseforgeError, FailureKind, GenerationError, StageFailureReport, StoreError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::generation::{
        GenerationPort, GenerationRequest, GenerationResponse, RetryPolicy, UsageMeter,
    };
    pub use crate::pipeline::{CancellationToken, Orchestrator, ProjectSpec};
    pub use crate::revision::{RevisionEngine, RevisionOutcome, RevisionResult};
    pub use crate::scoring::{
        DimensionFloors, GateResult, PhaseScore, ReleaseGate, ScoreDimension, ScoreWeights,
        Scorer,
    };
    pub use crate::stages::{default_stages, StageName, StageSpec};
    pub use crate::store::{ArtifactStore, MemoryStore};
    pub use crate::validation::{
        validate, ErrorCategory, ValidationContext, ValidationError, ValidationReport,
    };
}
