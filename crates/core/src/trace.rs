use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::query::SessionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceStage {
    Ingress,
    Classification,
    Dispatch,
    ToolCall,
    Synthesis,
    Response,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceOutcome {
    Success,
    Degraded,
    Failed,
}

/// One structured trace record. Per-domain visibility of routing, tool
/// traffic, and terminal status is the reason this system is split into
/// specialists at all, so every pipeline stage emits one of these.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub event_id: String,
    pub session_id: Option<SessionId>,
    pub correlation_id: String,
    pub event_type: String,
    pub stage: TraceStage,
    pub actor: String,
    pub outcome: TraceOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl TraceEvent {
    pub fn new(
        session_id: Option<SessionId>,
        correlation_id: impl Into<String>,
        event_type: impl Into<String>,
        stage: TraceStage,
        actor: impl Into<String>,
        outcome: TraceOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            session_id,
            correlation_id: correlation_id.into(),
            event_type: event_type.into(),
            stage,
            actor: actor.into(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait TraceSink: Send + Sync {
    fn emit(&self, event: TraceEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryTraceSink {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl InMemoryTraceSink {
    pub fn events(&self) -> Vec<TraceEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TraceSink for InMemoryTraceSink {
    fn emit(&self, event: TraceEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Forwards every trace event through `tracing` as a structured log line.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn emit(&self, event: TraceEvent) {
        tracing::info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            session_id = event.session_id.as_ref().map(|id| id.as_str()).unwrap_or("unknown"),
            stage = ?event.stage,
            actor = %event.actor,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "trace event"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::query::SessionId;
    use crate::trace::{InMemoryTraceSink, TraceEvent, TraceOutcome, TraceSink, TraceStage};

    #[test]
    fn in_memory_sink_records_events_with_correlation_fields() {
        let sink = InMemoryTraceSink::default();
        sink.emit(
            TraceEvent::new(
                Some(SessionId::from("s-7")),
                "req-123",
                "supervisor.classification_decided",
                TraceStage::Classification,
                "supervisor",
                TraceOutcome::Success,
            )
            .with_metadata("domains", "maintenance,operations")
            .with_metadata("is_ambiguous", "false"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].correlation_id, "req-123");
        assert_eq!(events[0].session_id.as_ref().map(|id| id.as_str()), Some("s-7"));
        assert_eq!(events[0].event_type, "supervisor.classification_decided");
        assert!(events[0].metadata.contains_key("domains"));
    }

    #[test]
    fn events_carry_unique_ids() {
        let first = TraceEvent::new(
            None,
            "req-1",
            "query.received",
            TraceStage::Ingress,
            "supervisor",
            TraceOutcome::Success,
        );
        let second = TraceEvent::new(
            None,
            "req-1",
            "query.received",
            TraceStage::Ingress,
            "supervisor",
            TraceOutcome::Success,
        );
        assert_ne!(first.event_id, second.event_id);
    }
}
