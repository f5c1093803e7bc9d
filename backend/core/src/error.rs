//! Error taxonomy for the shellforge runtime.
//!
//! Every domain error carries a severity and a structured context map so the
//! [`ErrorReporter`](crate::report::ErrorReporter) can log and present it
//! without knowing which component raised it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Boxed cause carried by errors that wrap plugin-authored failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured key/value detail attached to an error.
pub type ErrorContext = BTreeMap<String, Value>;

// ---------------------------------------------------------------------------
// Severity / category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorSeverity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Subsystem an error is attributed to when reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    Plugin,
    Command,
    Security,
    System,
    Interface,
    Network,
    File,
    Process,
    Database,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "Configuration",
            Self::Plugin => "Plugin",
            Self::Command => "Command",
            Self::Security => "Security",
            Self::System => "System",
            Self::Interface => "Interface",
            Self::Network => "Network",
            Self::File => "File System",
            Self::Process => "Process",
            Self::Database => "Database",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config document {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value at '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new();
        match self {
            Self::Read { path, .. } | Self::Write { path, .. } | Self::Parse { path, .. } => {
                ctx.insert("path".into(), json!(path.display().to_string()));
            }
            Self::InvalidValue { key, .. } => {
                ctx.insert("setting".into(), json!(key));
            }
        }
        ctx
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin must have a name")]
    EmptyName,

    #[error("plugin {0} is already loaded")]
    AlreadyLoaded(String),

    #[error("missing dependencies for {plugin}: {}", .missing.join(", "))]
    MissingDependencies { plugin: String, missing: Vec<String> },

    #[error("cannot unload {plugin}, required by: {}", .dependents.join(", "))]
    HasDependents {
        plugin: String,
        dependents: Vec<String>,
    },

    #[error("plugin {0} is not loaded")]
    NotLoaded(String),

    #[error("plugin {0} is not available")]
    NotAvailable(String),

    #[error("failed to initialize plugin {plugin}: {source}")]
    InitializeFailed {
        plugin: String,
        #[source]
        source: BoxError,
    },

    #[error("plugin {plugin} could not register command {command}: {source}")]
    CommandRegistration {
        plugin: String,
        command: String,
        #[source]
        source: CommandError,
    },

    #[error("invalid plugin manifest {}: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },

    #[error("plugin directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Event(#[from] EventError),
}

impl PluginError {
    /// Name of the plugin the error is about, when known.
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Self::AlreadyLoaded(name) | Self::NotLoaded(name) | Self::NotAvailable(name) => {
                Some(name)
            }
            Self::MissingDependencies { plugin, .. }
            | Self::HasDependents { plugin, .. }
            | Self::InitializeFailed { plugin, .. }
            | Self::CommandRegistration { plugin, .. } => Some(plugin),
            Self::EmptyName | Self::InvalidManifest { .. } | Self::Io { .. } | Self::Event(_) => {
                None
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyLoaded(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new();
        if let Some(name) = self.plugin_name() {
            ctx.insert("plugin_name".into(), json!(name));
        }
        match self {
            Self::MissingDependencies { missing, .. } => {
                ctx.insert("missing".into(), json!(missing));
            }
            Self::HasDependents { dependents, .. } => {
                ctx.insert("dependents".into(), json!(dependents));
            }
            Self::CommandRegistration { command, .. } => {
                ctx.insert("command".into(), json!(command));
            }
            Self::InvalidManifest { path, .. } | Self::Io { path, .. } => {
                ctx.insert("path".into(), json!(path.display().to_string()));
            }
            _ => {}
        }
        ctx
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command {0} is already registered")]
    AlreadyRegistered(String),

    #[error("unknown command: {0}")]
    NotFound(String),

    #[error("no active command found with id: {0}")]
    NotActive(Uuid),

    #[error("{command} failed: {message}")]
    Failed {
        command: String,
        args: Vec<String>,
        message: String,
        exit_code: Option<i32>,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl CommandError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) | Self::InvalidInput(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new();
        match self {
            Self::AlreadyRegistered(name) | Self::NotFound(name) => {
                ctx.insert("command".into(), json!(name));
            }
            Self::NotActive(id) => {
                ctx.insert("command_id".into(), json!(id.to_string()));
            }
            Self::Failed {
                command,
                args,
                exit_code,
                ..
            } => {
                ctx.insert("command".into(), json!(command));
                ctx.insert("args".into(), json!(args));
                ctx.insert("exit_code".into(), json!(exit_code));
            }
            Self::InvalidInput(_) => {}
        }
        ctx
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("error in event handler {handler} for {event}: {source}")]
    HandlerFailed {
        event: String,
        handler: String,
        #[source]
        source: BoxError,
    },

    #[error("handler is not subscribed to {0}")]
    NotSubscribed(String),

    #[error("no active operation found for id: {0}")]
    UnknownOperation(Uuid),
}

impl EventError {
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }

    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new();
        match self {
            Self::HandlerFailed { event, handler, .. } => {
                ctx.insert("event_type".into(), json!(event));
                ctx.insert("handler".into(), json!(handler));
            }
            Self::NotSubscribed(event) => {
                ctx.insert("event_type".into(), json!(event));
            }
            Self::UnknownOperation(id) => {
                ctx.insert("operation_id".into(), json!(id.to_string()));
            }
        }
        ctx
    }
}

// ---------------------------------------------------------------------------
// Security
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    UnauthorizedAccess,
    InvalidCredentials,
    PermissionDenied,
    EncryptionFailure,
    IntegrityViolation,
    SecureChannelFailure,
    CertificateError,
    TokenError,
    UnsafeOperation,
    PolicyViolation,
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        f.write_str(&s)
    }
}

#[derive(Debug)]
pub struct SecurityError {
    pub message: String,
    pub violation: ViolationType,
    pub operation: Option<String>,
    pub user: Option<String>,
    pub resource: Option<String>,
    pub severity: ErrorSeverity,
    pub timestamp: DateTime<Utc>,
    source: Option<BoxError>,
}

impl SecurityError {
    pub fn new(message: impl Into<String>, violation: ViolationType) -> Self {
        Self {
            message: message.into(),
            violation,
            operation: None,
            user: None,
            resource: None,
            severity: ErrorSeverity::Error,
            timestamp: Utc::now(),
            source: None,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn requires_audit(&self) -> bool {
        matches!(
            self.violation,
            ViolationType::UnauthorizedAccess
                | ViolationType::IntegrityViolation
                | ViolationType::PolicyViolation
        )
    }

    pub fn requires_immediate_action(&self) -> bool {
        self.severity == ErrorSeverity::Critical
            || matches!(
                self.violation,
                ViolationType::IntegrityViolation | ViolationType::SecureChannelFailure
            )
    }

    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new();
        ctx.insert("violation_type".into(), json!(self.violation.to_string()));
        ctx.insert("operation".into(), json!(self.operation));
        ctx.insert("user".into(), json!(self.user));
        ctx.insert("resource".into(), json!(self.resource));
        ctx
    }

    /// Record shape written to the security audit log.
    pub fn to_audit_log(&self) -> Value {
        json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "violation_type": self.violation.to_string(),
            "message": self.message,
            "severity": self.severity,
            "operation": self.operation,
            "user": self.user,
            "resource": self.resource,
            "requires_action": self.requires_immediate_action(),
        })
    }
}

impl fmt::Display for SecurityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.violation)?;
        if let Some(op) = &self.operation {
            write!(f, " during {op}")?;
        }
        if let Some(user) = &self.user {
            write!(f, " by user {user}")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, " accessing {resource}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SecurityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Umbrella
// ---------------------------------------------------------------------------

/// Top-level error type accepted by the error reporter.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Handler key used by the reporter to pick a presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Plugin,
    Command,
    Security,
    Event,
    FileNotFound,
    PermissionDenied,
    System,
    Generic,
}

impl ShellError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Plugin(_) => ErrorKind::Plugin,
            Self::Command(_) => ErrorKind::Command,
            Self::Event(_) => ErrorKind::Event,
            Self::Security(_) => ErrorKind::Security,
            Self::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::System,
            },
            Self::Other(_) => ErrorKind::Generic,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(e) => e.severity(),
            Self::Plugin(e) => e.severity(),
            Self::Command(e) => e.severity(),
            Self::Event(e) => e.severity(),
            Self::Security(e) => e.severity,
            Self::Io(_) | Self::Other(_) => ErrorSeverity::Error,
        }
    }

    /// Default reporting category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self.kind() {
            ErrorKind::Config => ErrorCategory::Configuration,
            ErrorKind::Plugin => ErrorCategory::Plugin,
            ErrorKind::Command => ErrorCategory::Command,
            ErrorKind::Security => ErrorCategory::Security,
            ErrorKind::Event => ErrorCategory::System,
            ErrorKind::FileNotFound | ErrorKind::PermissionDenied => ErrorCategory::File,
            ErrorKind::System => ErrorCategory::System,
            ErrorKind::Generic => ErrorCategory::Unknown,
        }
    }

    pub fn context(&self) -> ErrorContext {
        match self {
            Self::Config(e) => e.context(),
            Self::Plugin(e) => e.context(),
            Self::Command(e) => e.context(),
            Self::Event(e) => e.context(),
            Self::Security(e) => e.context(),
            Self::Io(_) | Self::Other(_) => ErrorContext::new(),
        }
    }

    /// Messages of every error in the `source()` chain, outermost first.
    pub fn chain(&self) -> Vec<String> {
        error_chain(self)
    }
}

/// Messages of `err` and each of its sources, outermost first.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        out.push(e.to_string());
        current = e.source();
    }
    out
}
