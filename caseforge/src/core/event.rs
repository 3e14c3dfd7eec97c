//! Run timeline events.
//!
//! Every generation call, validation pass, and revision attempt appends one
//! event to the owning run's timeline. The timeline is the audit trail
//! consumed by external observability tooling; it is persisted in append
//! order and also mirrored to the process event sink.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::stages::StageName;

/// An event on a run's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    /// The event type (e.g., "generation.started").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl RunEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Creates a "run.started" event.
    #[must_use]
    pub fn run_started(project_id: &str) -> Self {
        Self::new("run.started").add_data("project_id", serde_json::json!(project_id))
    }

    /// Creates a "run.progress" event.
    #[must_use]
    pub fn run_progress(stage: StageName, percent: u8) -> Self {
        Self::new("run.progress")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("percent", serde_json::json!(percent))
    }

    /// Creates a "run.completed" event.
    #[must_use]
    pub fn run_completed(state: &str) -> Self {
        Self::new("run.completed").add_data("state", serde_json::json!(state))
    }

    /// Creates a "generation.succeeded" event.
    #[must_use]
    pub fn generation_succeeded(stage: StageName, attempt: usize, cost: f64) -> Self {
        Self::new("generation.succeeded")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("attempt", serde_json::json!(attempt))
            .add_data("cost", serde_json::json!(cost))
    }

    /// Creates a "generation.failed" event.
    #[must_use]
    pub fn generation_failed(stage: StageName, attempt: usize, error: &str) -> Self {
        Self::new("generation.failed")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("attempt", serde_json::json!(attempt))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "validation.checked" event.
    #[must_use]
    pub fn validation_checked(
        stage: StageName,
        version: u32,
        valid: bool,
        error_count: usize,
    ) -> Self {
        Self::new("validation.checked")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("version", serde_json::json!(version))
            .add_data("valid", serde_json::json!(valid))
            .add_data("error_count", serde_json::json!(error_count))
    }

    /// Creates a "revision.attempted" event.
    #[must_use]
    pub fn revision_attempted(
        stage: StageName,
        attempt: usize,
        outcome: &str,
        remaining_errors: usize,
    ) -> Self {
        Self::new("revision.attempted")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("attempt", serde_json::json!(attempt))
            .add_data("outcome", serde_json::json!(outcome))
            .add_data("remaining_errors", serde_json::json!(remaining_errors))
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn stage_completed(stage: StageName, version: u32) -> Self {
        Self::new("stage.completed")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("version", serde_json::json!(version))
    }

    /// Creates a "stage.degraded" event.
    #[must_use]
    pub fn stage_degraded(stage: StageName, error_count: usize) -> Self {
        Self::new("stage.degraded")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("error_count", serde_json::json!(error_count))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn stage_failed(stage: StageName, reason: &str) -> Self {
        Self::new("stage.failed")
            .add_data("stage", serde_json::json!(stage.as_str()))
            .add_data("reason", serde_json::json!(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = RunEvent::new("test.event");
        assert_eq!(event.event_type, "test.event");
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_generation_succeeded() {
        let event = RunEvent::generation_succeeded(StageName::Setting, 2, 0.01);
        assert_eq!(event.event_type, "generation.succeeded");
        assert_eq!(event.data.get("stage"), Some(&serde_json::json!("setting")));
        assert_eq!(event.data.get("attempt"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_validation_checked() {
        let event = RunEvent::validation_checked(StageName::Cast, 1, false, 4);
        assert_eq!(event.data.get("valid"), Some(&serde_json::json!(false)));
        assert_eq!(event.data.get("error_count"), Some(&serde_json::json!(4)));
    }

    #[test]
    fn test_revision_attempted() {
        let event = RunEvent::revision_attempted(StageName::CaseModel, 1, "fixed", 0);
        assert_eq!(event.event_type, "revision.attempted");
        assert_eq!(event.data.get("outcome"), Some(&serde_json::json!("fixed")));
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::stage_completed(StageName::Prose, 3);
        let json = serde_json::to_string(&event).unwrap();
        let back: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, "stage.completed");
    }
}
