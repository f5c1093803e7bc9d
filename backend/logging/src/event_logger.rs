//! Event Audit Log
//!
//! Wildcard bus subscriber that writes every event as a structured record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use shellforge_core::{names, Event, EventBus, EventHandler};
use tracing::info;

use crate::redact::redact_value;

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub seq: u64,
    pub name: String,
    pub source: Option<String>,
    pub operation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Default)]
pub struct EventAuditLog {
    seq: AtomicU64,
}

impl EventAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a new audit log to every event on `bus`.
    pub fn attach(bus: &EventBus) -> Arc<Self> {
        let log = Arc::new(Self::new());
        bus.subscribe(names::WILDCARD, log.clone());
        log
    }

    /// Number of events recorded so far.
    pub fn recorded(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    pub fn entry_for(&self, event: &Event) -> EventLogEntry {
        EventLogEntry {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            name: event.name.clone(),
            source: event.source.clone(),
            operation_id: event.operation_id.map(|id| id.to_string()),
            timestamp: event.timestamp,
            payload: redact_value(&event.payload),
        }
    }
}

impl EventHandler for EventAuditLog {
    fn name(&self) -> &str {
        "EventAuditLog"
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()> {
        let entry = self.entry_for(event);
        let payload = serde_json::to_string(&entry.payload)?;
        info!(
            target: "shellforge_events",
            seq = entry.seq,
            event = %entry.name,
            source = entry.source.as_deref().unwrap_or("-"),
            operation_id = entry.operation_id.as_deref().unwrap_or("-"),
            payload = %payload,
            "Bus event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audit_log_sees_every_event() {
        let bus = EventBus::new();
        let log = EventAuditLog::attach(&bus);
        bus.emit(Event::new("command.started", json!({"name": "echo"})))
            .unwrap();
        bus.emit(Event::new("plugin_loaded", json!({"plugin_name": "x"})))
            .unwrap();
        assert_eq!(log.recorded(), 2);
        assert_eq!(bus.subscriber_count("*"), 1);
    }

    #[test]
    fn test_entry_payload_is_redacted() {
        let log = EventAuditLog::new();
        let event = Event::new("x", json!({"password": "hunter2"})).with_source("demo");
        let entry = log.entry_for(&event);
        assert_eq!(entry.seq, 1);
        assert_eq!(entry.payload["password"], "[REDACTED]");
        assert_eq!(entry.source.as_deref(), Some("demo"));
    }
}
