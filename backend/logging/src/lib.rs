//! Structured logging for shellforge.
//!
//! Handles subscriber setup (stderr console + rolling JSON file), log
//! redaction, and the event-bus audit subscriber.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventAuditLog, EventLogEntry};
pub use logger::init_logger;
pub use redact::{redact_sensitive_data, redact_value};
