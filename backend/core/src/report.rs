//! Central error reporting.
//!
//! Every failure that reaches the user goes through [`ErrorReporter::report`]:
//! it is logged as a structured `tracing` record and presented through the
//! [`Ui`] by a handler chosen from the error's [`ErrorKind`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{
    error_chain, ErrorCategory, ErrorContext, ErrorKind, ErrorSeverity, PluginError, ShellError,
};
use crate::ui::Ui;

/// Everything a presentation handler needs about one reported failure.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub operation: Option<String>,
    pub context: ErrorContext,
    pub chain: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    fn context_str(&self, key: &str) -> Option<&str> {
        self.context.get(key).and_then(Value::as_str)
    }
}

pub type ReportHandler = Arc<dyn Fn(&ErrorReport, &dyn Ui) + Send + Sync>;

pub struct ErrorReporter {
    ui: Arc<dyn Ui>,
    debug: AtomicBool,
    handlers: RwLock<HashMap<ErrorKind, ReportHandler>>,
}

impl ErrorReporter {
    pub fn new(ui: Arc<dyn Ui>) -> Self {
        let mut handlers: HashMap<ErrorKind, ReportHandler> = HashMap::new();
        handlers.insert(ErrorKind::Config, Arc::new(present_config));
        handlers.insert(ErrorKind::Plugin, Arc::new(present_plugin));
        handlers.insert(ErrorKind::Command, Arc::new(present_command));
        handlers.insert(ErrorKind::Security, Arc::new(present_security));
        handlers.insert(ErrorKind::Event, Arc::new(present_system));
        handlers.insert(ErrorKind::System, Arc::new(present_system));
        handlers.insert(ErrorKind::FileNotFound, Arc::new(present_file));
        handlers.insert(ErrorKind::PermissionDenied, Arc::new(present_permission));
        Self {
            ui,
            debug: AtomicBool::new(false),
            handlers: RwLock::new(handlers),
        }
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.store(enabled, Ordering::Relaxed);
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn ui(&self) -> &Arc<dyn Ui> {
        &self.ui
    }

    /// Replace the presentation for one error kind.
    pub fn register_handler(&self, kind: ErrorKind, handler: ReportHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, handler);
    }

    pub fn report(
        &self,
        err: &ShellError,
        category: ErrorCategory,
        operation: Option<&str>,
    ) -> ErrorReport {
        self.report_at(err, category, operation, err.severity())
    }

    pub fn report_at(
        &self,
        err: &ShellError,
        category: ErrorCategory,
        operation: Option<&str>,
        severity: ErrorSeverity,
    ) -> ErrorReport {
        self.dispatch(ErrorReport {
            kind: err.kind(),
            message: err.to_string(),
            category,
            severity,
            operation: operation.map(String::from),
            context: err.context(),
            chain: err.chain(),
            timestamp: Utc::now(),
        })
    }

    /// Report a plugin manager failure and hand the error back to the caller.
    pub fn report_plugin(&self, err: PluginError, operation: &str) -> PluginError {
        self.dispatch(ErrorReport {
            kind: ErrorKind::Plugin,
            message: err.to_string(),
            category: ErrorCategory::Plugin,
            severity: err.severity(),
            operation: Some(operation.to_string()),
            context: err.context(),
            chain: error_chain(&err),
            timestamp: Utc::now(),
        });
        err
    }

    fn dispatch(&self, report: ErrorReport) -> ErrorReport {
        log_report(&report);

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&report.kind)
            .cloned();
        match handler {
            Some(h) => h(&report, self.ui.as_ref()),
            None => present_generic(&report, self.ui.as_ref()),
        }

        if self.debug_enabled() {
            for (depth, cause) in report.chain.iter().enumerate().skip(1) {
                self.ui.debug(&format!("  caused by ({depth}): {cause}"));
            }
        }

        report
    }
}

fn log_report(report: &ErrorReport) {
    let context = serde_json::to_string(&report.context).unwrap_or_default();
    let operation = report.operation.as_deref().unwrap_or("-");
    match report.severity {
        ErrorSeverity::Debug => debug!(
            category = %report.category, operation, context = %context,
            "[ErrorReporter] {}", report.message
        ),
        ErrorSeverity::Info => info!(
            category = %report.category, operation, context = %context,
            "[ErrorReporter] {}", report.message
        ),
        ErrorSeverity::Warning => warn!(
            category = %report.category, operation, context = %context,
            "[ErrorReporter] {}", report.message
        ),
        ErrorSeverity::Error | ErrorSeverity::Critical => error!(
            category = %report.category, severity = %report.severity, operation,
            context = %context, "[ErrorReporter] {}", report.message
        ),
    }
}

// ---------------------------------------------------------------------------
// Default presentations
// ---------------------------------------------------------------------------

fn present_config(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("Configuration error: {}", report.message));
    if let Some(setting) = report.context_str("setting") {
        ui.info(&format!("Setting: {setting}"));
    }
    if let Some(path) = report.context_str("path") {
        ui.info(&format!("Config file: {path}"));
    }
}

fn present_plugin(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("Plugin error: {}", report.message));
    if let Some(name) = report.context_str("plugin_name") {
        ui.info(&format!("Affected plugin: {name}"));
        ui.info(&format!("Try: plugins reload {name}"));
    }
}

fn present_command(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("Command error: {}", report.message));
    if let Some(command) = report.context_str("command") {
        let args = report
            .context
            .get("args")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        ui.info(&format!("Failed command: {command} {args}").trim_end().to_string());
        ui.info(&format!("Try 'help {command}' for usage information"));
    }
}

fn present_security(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("Security error: {}", report.message));
    if report.severity >= ErrorSeverity::Critical {
        ui.warning("This incident requires immediate attention");
    }
}

fn present_system(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("System error: {}", report.message));
}

fn present_file(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("File error: {}", report.message));
}

fn present_permission(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("Permission denied: {}", report.message));
}

fn present_generic(report: &ErrorReport, ui: &dyn Ui) {
    ui.error(&format!("Error: {}", report.message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use crate::ui::{CapturedUi, MessageLevel};

    fn reporter() -> (Arc<CapturedUi>, ErrorReporter) {
        let ui = Arc::new(CapturedUi::new());
        let reporter = ErrorReporter::new(ui.clone());
        (ui, reporter)
    }

    #[test]
    fn test_plugin_error_suggests_reload() {
        let (ui, reporter) = reporter();
        let err = reporter.report_plugin(
            PluginError::MissingDependencies {
                plugin: "ext".into(),
                missing: vec!["core".into()],
            },
            "load_plugin",
        );
        assert!(matches!(err, PluginError::MissingDependencies { .. }));
        assert!(ui.contains("Plugin error: missing dependencies for ext: core"));
        assert!(ui.contains("Affected plugin: ext"));
        assert!(ui.contains("Try: plugins reload ext"));
    }

    #[test]
    fn test_command_error_points_to_help() {
        let (ui, reporter) = reporter();
        let err: ShellError = CommandError::Failed {
            command: "deploy".into(),
            args: vec!["prod".into()],
            message: "exit 2".into(),
            exit_code: Some(2),
        }
        .into();
        let report = reporter.report(&err, ErrorCategory::Command, Some("execute"));
        assert_eq!(report.category, ErrorCategory::Command);
        assert!(ui.contains("Failed command: deploy prod"));
        assert!(ui.contains("Try 'help deploy' for usage information"));
    }

    #[test]
    fn test_generic_fallback_and_debug_chain() {
        let (ui, reporter) = reporter();
        reporter.set_debug(true);
        let err: ShellError = anyhow::anyhow!("root cause").context("outer").into();
        reporter.report(&err, ErrorCategory::Unknown, None);
        assert_eq!(ui.messages_at(MessageLevel::Error), vec!["Error: outer"]);
        assert!(ui.contains("caused by (1): root cause"));
    }

    #[test]
    fn test_custom_handler_replaces_default() {
        let (ui, reporter) = reporter();
        reporter.register_handler(
            ErrorKind::Command,
            Arc::new(|r: &ErrorReport, ui: &dyn Ui| ui.warning(&format!("custom: {}", r.message))),
        );
        let err: ShellError = CommandError::NotFound("nope".into()).into();
        reporter.report(&err, ErrorCategory::Command, None);
        assert!(ui.contains("custom: unknown command: nope"));
        assert!(ui.messages_at(MessageLevel::Error).is_empty());
    }
}
