/// Hook lifecycle phases and payloads.
///
/// Hooks fire at fixed points of a command invocation: before it runs,
/// after it completes, and when it fails.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Hook phases
// ---------------------------------------------------------------------------

/// The lifecycle phase at which a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    /// Before the command starts. An error here fails the invocation.
    PreExecute,
    /// After the command completed successfully.
    PostExecute,
    /// After the command failed.
    OnError,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreExecute => "pre_execute",
            Self::PostExecute => "post_execute",
            Self::OnError => "on_error",
        }
    }
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_execute" => Ok(Self::PreExecute),
            "post_execute" => Ok(Self::PostExecute),
            "on_error" => Ok(Self::OnError),
            other => Err(format!("unknown hook phase: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload carried into each hook
// ---------------------------------------------------------------------------

/// What is being run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationPayload {
    pub command_id: Uuid,
    pub name: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
    pub cwd: Option<String>,
    pub timeout: Option<f64>,
    pub host: Option<String>,
}

/// How it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomePayload {
    pub status: String,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration_secs: Option<f64>,
}

/// Union payload type passed to all hooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum HookPayload {
    PreExecute {
        invocation: InvocationPayload,
    },
    PostExecute {
        invocation: InvocationPayload,
        outcome: OutcomePayload,
    },
    OnError {
        invocation: InvocationPayload,
        outcome: OutcomePayload,
    },
}

impl HookPayload {
    pub fn phase(&self) -> HookPhase {
        match self {
            Self::PreExecute { .. } => HookPhase::PreExecute,
            Self::PostExecute { .. } => HookPhase::PostExecute,
            Self::OnError { .. } => HookPhase::OnError,
        }
    }

    pub fn invocation(&self) -> &InvocationPayload {
        match self {
            Self::PreExecute { invocation }
            | Self::PostExecute { invocation, .. }
            | Self::OnError { invocation, .. } => invocation,
        }
    }

    pub fn outcome(&self) -> Option<&OutcomePayload> {
        match self {
            Self::PreExecute { .. } => None,
            Self::PostExecute { outcome, .. } | Self::OnError { outcome, .. } => Some(outcome),
        }
    }
}
