//! Event sink trait and implementations.
//!
//! The persisted run timeline is the audit trail; sinks mirror the same
//! events into process observability (logs, metrics shippers, tests).

use async_trait::async_trait;
use tracing::{debug, info, Level};
use uuid::Uuid;

use crate::core::RunEvent;

/// Trait for sinks that receive run events as they happen.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, run_id: Uuid, event: &RunEvent);

    /// Emits an event without blocking. Must never panic; errors are
    /// swallowed.
    fn try_emit(&self, run_id: Uuid, event: &RunEvent);
}

/// A no-op sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _run_id: Uuid, _event: &RunEvent) {}

    fn try_emit(&self, _run_id: Uuid, _event: &RunEvent) {}
}

/// A sink that logs events through the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, run_id: Uuid, event: &RunEvent) {
        match self.level {
            Level::DEBUG => {
                debug!(
                    run_id = %run_id,
                    event_type = %event.event_type,
                    event_data = ?event.data,
                    "Event: {}", event.event_type
                );
            }
            _ => {
                info!(
                    run_id = %run_id,
                    event_type = %event.event_type,
                    event_data = ?event.data,
                    "Event: {}", event.event_type
                );
            }
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, run_id: Uuid, event: &RunEvent) {
        self.log_event(run_id, event);
    }

    fn try_emit(&self, run_id: Uuid, event: &RunEvent) {
        self.log_event(run_id, event);
    }
}

/// A collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(Uuid, RunEvent)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(Uuid, RunEvent)> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events whose type starts with a prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<RunEvent> {
        self.events
            .read()
            .iter()
            .filter(|(_, e)| e.event_type.starts_with(type_prefix))
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, run_id: Uuid, event: &RunEvent) {
        self.events.write().push((run_id, event.clone()));
    }

    fn try_emit(&self, run_id: Uuid, event: &RunEvent) {
        self.events.write().push((run_id, event.clone()));
    }
}
