use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shellforge_hooks::{InvocationPayload, OutcomePayload};
use uuid::Uuid;

/// One request to run a named executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub id: Uuid,
    pub name: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Overrides layered on the inherited environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub cwd: Option<String>,
    /// Seconds.
    pub timeout: Option<f64>,
    /// Empty or absent means local.
    pub host: Option<String>,
}

impl CommandInvocation {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            args,
            options: Map::new(),
            env: HashMap::new(),
            cwd: None,
            timeout: None,
            host: None,
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// The target host, if one is set and non-empty.
    pub fn remote_host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.trim().is_empty())
    }

    pub fn to_payload(&self) -> InvocationPayload {
        InvocationPayload {
            command_id: self.id,
            name: self.name.clone(),
            args: self.args.clone(),
            options: self.options.clone(),
            cwd: self.cwd.clone(),
            timeout: self.timeout,
            host: self.host.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one invocation, keyed by the invocation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: Uuid,
    pub status: CommandStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl CommandResult {
    pub fn queued(id: Uuid) -> Self {
        Self {
            id,
            status: CommandStatus::Queued,
            start_time: Utc::now(),
            end_time: None,
            exit_code: None,
            output: None,
            error: None,
            metadata: Map::new(),
        }
    }

    pub fn completed(
        id: Uuid,
        start_time: DateTime<Utc>,
        exit_code: i32,
        output: String,
    ) -> Self {
        Self {
            status: CommandStatus::Completed,
            start_time,
            end_time: Some(Utc::now().max(start_time)),
            exit_code: Some(exit_code),
            output: Some(output),
            ..Self::queued(id)
        }
    }

    pub fn failed(
        id: Uuid,
        start_time: DateTime<Utc>,
        exit_code: Option<i32>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: CommandStatus::Failed,
            start_time,
            end_time: Some(Utc::now().max(start_time)),
            exit_code,
            error: Some(error.into()),
            ..Self::queued(id)
        }
    }

    pub fn cancelled(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            status: CommandStatus::Cancelled,
            start_time: now,
            end_time: Some(now),
            ..Self::queued(id)
        }
    }

    /// Move to a terminal status and stamp the end time.
    pub fn finish(&mut self, status: CommandStatus) {
        self.status = status;
        self.end_time = Some(Utc::now().max(self.start_time));
    }

    /// Seconds from start to end, once finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time.map(|end| {
            (end - self.start_time).num_microseconds().unwrap_or(0) as f64 / 1_000_000.0
        })
    }

    pub fn to_outcome(&self) -> OutcomePayload {
        OutcomePayload {
            status: self.status.to_string(),
            exit_code: self.exit_code,
            output: self.output.clone(),
            error: self.error.clone(),
            duration_secs: self.duration_secs(),
        }
    }
}
