// Event recorder with verbosity levels
//
// Levels:
//   0 - QueryResolve*, ModelResolve* (always on)
//   1 - AgentExecution*, TeamExecution*, TeamMember*, ToolCall*
//   2 - LLMCall* with token usage
//   3 - LLM response content (sensitive)
//
// Verbosity is a filter, not a code path: records are built the same way at
// every level and emission is gated. The one exception is level-3 content,
// which is never even constructed unless the level permits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

// Event name bases; Start/Complete/Error suffixes are appended by the span
pub const QUERY_RESOLVE: &str = "QueryResolve";
pub const MODEL_RESOLVE: &str = "ModelResolve";
pub const AGENT_EXECUTION: &str = "AgentExecution";
pub const TEAM_EXECUTION: &str = "TeamExecution";
pub const TEAM_MEMBER: &str = "TeamMember";
pub const TEAM_SELECTOR_MISS: &str = "TeamSelectorMiss";
pub const TOOL_CALL: &str = "ToolCall";
pub const LLM_CALL: &str = "LLMCall";
pub const LLM_RESPONSE: &str = "LLMResponse";

/// A recorded lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Shared by the Start/Complete (or Error) pair
    pub correlation_id: Uuid,
    /// Event name, e.g. "QueryResolveStart"
    pub name: String,
    pub namespace: String,
    /// Resource the event is about
    pub resource: String,
    /// Emitting component, e.g. "query-scheduler"
    pub component: String,
    /// Verbosity level this event belongs to
    pub level: u8,
    pub timestamp: DateTime<Utc>,
    /// Elapsed time, present on Complete/Error events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Small structured payload (token counts, model name, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Destination for event records
pub trait EventSink: Send + Sync {
    fn publish(&self, record: EventRecord);
}

/// Sink that logs through tracing; the default in binaries
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, record: EventRecord) {
        if record.error.is_some() {
            tracing::warn!(
                event = %record.name,
                namespace = %record.namespace,
                resource = %record.resource,
                component = %record.component,
                correlation_id = %record.correlation_id,
                duration_ms = record.duration_ms,
                error = record.error.as_deref(),
                "event"
            );
        } else {
            tracing::info!(
                event = %record.name,
                namespace = %record.namespace,
                resource = %record.resource,
                component = %record.component,
                correlation_id = %record.correlation_id,
                duration_ms = record.duration_ms,
                "event"
            );
        }
    }
}

/// Sink that collects records in memory, for tests
#[derive(Debug, Default, Clone)]
pub struct CollectingEventSink {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl CollectingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().expect("sink poisoned").clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.name).collect()
    }

    pub fn count_named(&self, name: &str) -> usize {
        self.records().iter().filter(|r| r.name == name).count()
    }

    pub fn clear(&self) {
        self.records.lock().expect("sink poisoned").clear();
    }
}

impl EventSink for CollectingEventSink {
    fn publish(&self, record: EventRecord) {
        self.records.lock().expect("sink poisoned").push(record);
    }
}

/// Sink that broadcasts to subscribers
pub struct BroadcastEventSink {
    sender: tokio::sync::broadcast::Sender<EventRecord>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<EventRecord>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, record: EventRecord) {
        // No receivers is fine
        let _ = self.sender.send(record);
    }
}

/// Verbosity-gated recorder handed to every component
#[derive(Clone)]
pub struct EventRecorder {
    verbosity: u8,
    sink: Arc<dyn EventSink>,
}

impl EventRecorder {
    pub fn new(verbosity: u8, sink: Arc<dyn EventSink>) -> Self {
        Self { verbosity, sink }
    }

    /// Recorder that drops everything; for tests that don't care
    pub fn disabled() -> Self {
        Self {
            verbosity: 0,
            sink: Arc::new(NullEventSink),
        }
    }

    pub fn level_enabled(&self, level: u8) -> bool {
        level <= self.verbosity
    }

    /// True when sensitive LLM response content may be recorded.
    /// Callers must not build content payloads unless this returns true.
    pub fn content_enabled(&self) -> bool {
        self.level_enabled(3)
    }

    /// Emit a point-in-time event (no Start/Complete pair)
    pub fn emit(
        &self,
        level: u8,
        name: &str,
        namespace: &str,
        resource: &str,
        component: &str,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) {
        if !self.level_enabled(level) {
            return;
        }
        self.sink.publish(EventRecord {
            correlation_id: Uuid::now_v7(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            resource: resource.to_string(),
            component: component.to_string(),
            level,
            timestamp: Utc::now(),
            duration_ms: None,
            error: None,
            attributes,
        });
    }

    /// Start a Start/Complete pair; the returned span shares one
    /// correlation id and measures duration
    pub fn span(
        &self,
        level: u8,
        base: &str,
        namespace: &str,
        resource: &str,
        component: &str,
    ) -> EventSpan {
        let correlation_id = Uuid::now_v7();
        if self.level_enabled(level) {
            self.sink.publish(EventRecord {
                correlation_id,
                name: format!("{}Start", base),
                namespace: namespace.to_string(),
                resource: resource.to_string(),
                component: component.to_string(),
                level,
                timestamp: Utc::now(),
                duration_ms: None,
                error: None,
                attributes: serde_json::Map::new(),
            });
        }
        EventSpan {
            recorder: self.clone(),
            correlation_id,
            started: Instant::now(),
            level,
            base: base.to_string(),
            namespace: namespace.to_string(),
            resource: resource.to_string(),
            component: component.to_string(),
        }
    }
}

struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _record: EventRecord) {}
}

/// In-flight Start/Complete pair
pub struct EventSpan {
    recorder: EventRecorder,
    correlation_id: Uuid,
    started: Instant,
    level: u8,
    base: String,
    namespace: String,
    resource: String,
    component: String,
}

impl EventSpan {
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Emit the Complete event with a payload
    pub fn complete(self, attributes: serde_json::Map<String, serde_json::Value>) {
        let name = format!("{}Complete", self.base);
        self.finish(name, None, attributes);
    }

    /// Emit the Error event
    pub fn fail(self, error: &str) {
        let name = format!("{}Error", self.base);
        self.finish(name, Some(error.to_string()), serde_json::Map::new());
    }

    fn finish(
        self,
        name: String,
        error: Option<String>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) {
        if !self.recorder.level_enabled(self.level) {
            return;
        }
        self.recorder.sink.publish(EventRecord {
            correlation_id: self.correlation_id,
            name,
            namespace: self.namespace,
            resource: self.resource,
            component: self.component,
            level: self.level,
            timestamp: Utc::now(),
            duration_ms: Some(self.started.elapsed().as_millis() as u64),
            error,
            attributes,
        });
    }
}

/// Convenience: one-key attribute map
pub fn attrs(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
