//! Scripted generation port for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::core::Usage;
use crate::errors::GenerationError;
use crate::generation::{GenerationPort, GenerationRequest, GenerationResponse};

/// A port that replays a queue of canned responses and records every
/// request it receives.
#[derive(Debug, Default)]
pub struct ScriptedPort {
    responses: Mutex<VecDeque<Result<GenerationResponse, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedPort {
    /// Creates an empty scripted port. An exhausted script fails with a
    /// transport error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response with a nominal usage figure.
    pub fn push_ok(&self, content: impl Into<String>) {
        self.push_ok_with_usage(content, Usage::new(250, 500, 0.005));
    }

    /// Queues a successful response with an explicit usage figure.
    pub fn push_ok_with_usage(&self, content: impl Into<String>, usage: Usage) {
        self.responses
            .lock()
            .push_back(Ok(GenerationResponse::new(content, usage)));
    }

    /// Queues a successful response from a JSON value.
    pub fn push_value(&self, value: &serde_json::Value) {
        self.push_ok(value.to_string());
    }

    /// Queues an error response.
    pub fn push_err(&self, error: GenerationError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Number of calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every request received, in call order.
    #[must_use]
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Number of responses still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl GenerationPort for ScriptedPort {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        self.requests.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::transport("scripted responses exhausted")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::StageName;

    fn request() -> GenerationRequest {
        GenerationRequest::new(StageName::Setting, "intent", serde_json::json!({}))
    }

    #[tokio::test]
    async fn test_replays_in_order() {
        let port = ScriptedPort::new();
        port.push_ok("first");
        port.push_ok("second");

        assert_eq!(port.generate(&request()).await.unwrap().content, "first");
        assert_eq!(port.generate(&request()).await.unwrap().content, "second");
        assert_eq!(port.call_count(), 2);
        assert_eq!(port.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let port = ScriptedPort::new();
        let err = port.generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let port = ScriptedPort::new();
        port.push_ok("{}");
        let _ = port.generate(&request()).await;

        let requests = port.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].stage, StageName::Setting);
    }
}
