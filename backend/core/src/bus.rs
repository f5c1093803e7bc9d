//! Event Bus
//!
//! Synchronous publish/subscribe with correlation-id operations. Handlers
//! registered for an exact name run before wildcard (`"*"`) handlers, each
//! group in subscription order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::EventError;
use crate::event::{names, Event, EventSnapshot, OperationContext};

/// Receiver of bus events.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// Adapts a closure into an [`EventHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event)
    }
}

pub fn from_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[derive(Default)]
struct BusState {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
    active: HashMap<Uuid, OperationContext>,
    completed: HashMap<Uuid, OperationContext>,
}

/// Cloneable handle; all clones share the same subscriptions and operations.
#[derive(Clone, Default)]
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe(&self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_name = event_name.into();
        debug!(event = %event_name, handler = handler.name(), "[EventBus] Subscribed");
        self.lock()
            .handlers
            .entry(event_name)
            .or_default()
            .push(handler);
    }

    /// Remove one subscription of `handler` (matched by identity).
    pub fn unsubscribe(
        &self,
        event_name: &str,
        handler: &Arc<dyn EventHandler>,
    ) -> Result<(), EventError> {
        let mut state = self.lock();
        let list = state
            .handlers
            .get_mut(event_name)
            .ok_or_else(|| EventError::NotSubscribed(event_name.to_string()))?;
        let pos = list
            .iter()
            .position(|h| Arc::ptr_eq(h, handler))
            .ok_or_else(|| EventError::NotSubscribed(event_name.to_string()))?;
        list.remove(pos);
        if list.is_empty() {
            state.handlers.remove(event_name);
        }
        Ok(())
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.lock().handlers.get(event_name).map_or(0, Vec::len)
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// Deliver `event` synchronously. The first failing handler aborts the
    /// remaining dispatch.
    pub fn emit(&self, event: Event) -> Result<(), EventError> {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let mut state = self.lock();
            if let Some(op_id) = event.operation_id {
                if let Some(op) = state.active.get_mut(&op_id) {
                    op.events.push(event.snapshot());
                }
            }
            let exact = state.handlers.get(&event.name).into_iter().flatten();
            let wildcard = state
                .handlers
                .get(names::WILDCARD)
                .into_iter()
                .flatten()
                .filter(|_| event.name != names::WILDCARD);
            exact.chain(wildcard).cloned().collect()
        };

        for handler in handlers {
            if let Err(err) = handler.handle(&event) {
                warn!(
                    event = %event.name,
                    handler = handler.name(),
                    error = %err,
                    "[EventBus] Handler failed"
                );
                return Err(EventError::HandlerFailed {
                    event: event.name.clone(),
                    handler: handler.name().to_string(),
                    source: err.into(),
                });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub fn start_operation(
        &self,
        operation_type: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Uuid {
        let op = OperationContext::new(operation_type, metadata);
        let id = op.id;
        debug!(operation_id = %id, operation_type = %op.operation_type, "[EventBus] Operation started");
        self.lock().active.insert(id, op);
        id
    }

    pub fn complete_operation(
        &self,
        id: Uuid,
        status: &str,
        error: Option<String>,
    ) -> Result<(), EventError> {
        let mut state = self.lock();
        let mut op = state
            .active
            .remove(&id)
            .ok_or(EventError::UnknownOperation(id))?;
        op.status = status.to_string();
        op.end_time = Some(Utc::now());
        op.error = error;
        debug!(operation_id = %id, status, "[EventBus] Operation completed");
        state.completed.insert(id, op);
        Ok(())
    }

    /// Active or completed operation with this id.
    pub fn operation(&self, id: Uuid) -> Option<OperationContext> {
        let state = self.lock();
        state
            .active
            .get(&id)
            .or_else(|| state.completed.get(&id))
            .cloned()
    }

    /// Event snapshots for `id` ordered by timestamp; empty for unknown ids.
    pub fn get_operation_timeline(&self, id: Uuid) -> Vec<EventSnapshot> {
        let mut events = self
            .operation(id)
            .map(|op| op.events)
            .unwrap_or_default();
        events.sort_by_key(|e| e.timestamp);
        events
    }

    pub fn active_operations(&self) -> HashMap<Uuid, OperationContext> {
        self.lock().active.clone()
    }

    pub fn completed_operations(&self) -> Vec<OperationContext> {
        let mut ops: Vec<_> = self.lock().completed.values().cloned().collect();
        ops.sort_by_key(|op| op.start_time);
        ops
    }

    /// Drop completed operations that ended before `before`. Returns how many
    /// were removed; `None` removes nothing.
    pub fn cleanup_completed(&self, before: Option<DateTime<Utc>>) -> usize {
        let Some(before) = before else {
            return 0;
        };
        let mut state = self.lock();
        let initial = state.completed.len();
        state
            .completed
            .retain(|_, op| op.end_time.map_or(true, |end| end >= before));
        initial - state.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn EventHandler> {
        let label = name.to_string();
        from_fn(name, move |e: &Event| {
            log.lock().unwrap().push(format!("{}:{}", label, e.name));
            Ok(())
        })
    }

    #[test]
    fn test_exact_handlers_run_before_wildcard() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("*", recorder("wild", log.clone()));
        bus.subscribe("a.b", recorder("first", log.clone()));
        bus.subscribe("a.b", recorder("second", log.clone()));

        bus.emit(Event::new("a.b", json!({}))).unwrap();
        bus.emit(Event::new("other", json!({}))).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:a.b", "second:a.b", "wild:a.b", "wild:other"]
        );
    }

    #[test]
    fn test_failing_handler_aborts_dispatch() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe("x", from_fn("broken", |_| anyhow::bail!("nope")));
        bus.subscribe("x", recorder("after", log.clone()));

        let err = bus.emit(Event::new("x", Value::Null)).unwrap_err();
        match err {
            EventError::HandlerFailed { handler, event, .. } => {
                assert_eq!(handler, "broken");
                assert_eq!(event, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe_unknown_handler_fails() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let h = recorder("h", log.clone());
        assert!(matches!(
            bus.unsubscribe("x", &h),
            Err(EventError::NotSubscribed(_))
        ));

        bus.subscribe("x", h.clone());
        let other = recorder("other", log);
        assert!(bus.unsubscribe("x", &other).is_err());
        bus.unsubscribe("x", &h).unwrap();
        assert_eq!(bus.subscriber_count("x"), 0);
    }

    #[test]
    fn test_operation_timeline_collects_events() {
        let bus = EventBus::new();
        let op = bus.start_operation("demo", Map::new());
        bus.emit(Event::new("one", json!(1)).with_operation(op)).unwrap();
        bus.emit(Event::new("two", json!(2)).with_operation(op)).unwrap();
        bus.emit(Event::new("unrelated", json!(3))).unwrap();

        let timeline = bus.get_operation_timeline(op);
        assert_eq!(timeline.len(), 2);
        assert!(timeline[0].timestamp <= timeline[1].timestamp);
        assert_eq!(timeline[0].name, "one");

        bus.complete_operation(op, "completed", None).unwrap();
        assert!(bus.active_operations().is_empty());
        assert_eq!(bus.operation(op).unwrap().status, "completed");
        assert_eq!(bus.get_operation_timeline(op).len(), 2);
        assert!(bus.get_operation_timeline(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_complete_unknown_operation_fails() {
        let bus = EventBus::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            bus.complete_operation(id, "completed", None),
            Err(EventError::UnknownOperation(got)) if got == id
        ));
    }

    #[test]
    fn test_cleanup_completed() {
        let bus = EventBus::new();
        let op = bus.start_operation("demo", Map::new());
        bus.complete_operation(op, "completed", None).unwrap();

        assert_eq!(bus.cleanup_completed(None), 0);
        assert_eq!(bus.cleanup_completed(Some(Utc::now() - chrono::Duration::hours(1))), 0);
        assert_eq!(bus.cleanup_completed(Some(Utc::now() + chrono::Duration::seconds(1))), 1);
        assert!(bus.operation(op).is_none());
    }
}
