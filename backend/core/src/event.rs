use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Well-known event names emitted by the runtime.
pub mod names {
    pub const COMMAND_STARTED: &str = "command.started";
    pub const COMMAND_COMPLETED: &str = "command.completed";
    pub const COMMAND_FAILED: &str = "command.failed";
    pub const COMMAND_CANCELLED: &str = "command.cancelled";
    pub const PLUGIN_LOADED: &str = "plugin_loaded";
    pub const PLUGIN_UNLOADED: &str = "plugin_unloaded";
    /// Subscription key that receives every event.
    pub const WILDCARD: &str = "*";
}

/// An immutable notification delivered through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub operation_id: Option<Uuid>,
    pub source: Option<String>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: Utc::now(),
            operation_id: None,
            source: None,
        }
    }

    pub fn with_operation(mut self, operation_id: Uuid) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            timestamp: self.timestamp,
            name: self.name.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Entry in an operation timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub payload: Value,
}

/// Groups related events under one correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    pub id: Uuid,
    pub operation_type: String,
    pub start_time: DateTime<Utc>,
    pub status: String,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub events: Vec<EventSnapshot>,
    pub metadata: Map<String, Value>,
}

impl OperationContext {
    pub const IN_PROGRESS: &'static str = "in_progress";

    pub fn new(operation_type: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_type: operation_type.into(),
            start_time: Utc::now(),
            status: Self::IN_PROGRESS.to_string(),
            end_time: None,
            error: None,
            events: Vec::new(),
            metadata,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Seconds between start and end, if completed.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time
            .map(|end| (end - self.start_time).num_microseconds().unwrap_or(0) as f64 / 1e6)
    }
}
