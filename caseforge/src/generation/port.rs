//! The generation port: the pipeline's only window onto the external
//! text-generation service.
//!
//! The orchestrator never inspects the underlying model or provider; it
//! sees structured success or failure plus a usage figure. Responses are
//! raw text that the caller parses as a structured document.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{ArtifactKind, Usage};
use crate::errors::GenerationError;
use crate::stages::StageName;

/// One request to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The requesting stage.
    pub stage: StageName,
    /// Task framing, reproduced verbatim in repair requests.
    pub intent: String,
    /// Merged context: the project spec plus upstream artifacts, or a
    /// repair payload.
    pub context: serde_json::Value,
    /// The artifact kind the response must parse into.
    pub output_kind: ArtifactKind,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

impl GenerationRequest {
    /// Creates a request for a stage with a default two-minute deadline.
    #[must_use]
    pub fn new(stage: StageName, intent: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            stage,
            intent: intent.into(),
            context,
            output_kind: stage.kind(),
            timeout_ms: 120_000,
        }
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }
}

/// A successful generation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Raw structured output, to be parsed by the caller.
    pub content: String,
    /// Token and cost figures for the call.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(content: impl Into<String>, usage: Usage) -> Self {
        Self {
            content: content.into(),
            usage,
        }
    }
}

/// Abstract capability over the external generation service.
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Performs one generation call.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] for transport failures, timeouts, and
    /// rate limits. Retry and cool-down policy live with the caller.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}
