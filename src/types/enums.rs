use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Backend type for issue tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Linear,
    Jira,
    Local,
}

/// Agent runtime used for skill execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRuntime {
    #[default]
    Claude,
    Opencode,
}

impl fmt::Display for AgentRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRuntime::Claude => write!(f, "claude"),
            AgentRuntime::Opencode => write!(f, "opencode"),
        }
    }
}

impl FromStr for AgentRuntime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" => Ok(AgentRuntime::Claude),
            "opencode" => Ok(AgentRuntime::Opencode),
            _ => Err(format!(
                "Unknown runtime: '{s}'. Expected: claude, opencode"
            )),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Linear => write!(f, "linear"),
            Backend::Jira => write!(f, "jira"),
            Backend::Local => write!(f, "local"),
        }
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Backend::Linear),
            "jira" => Ok(Backend::Jira),
            "local" => Ok(Backend::Local),
            _ => Err(format!(
                "Unknown backend: '{s}'. Expected: linear, jira, local"
            )),
        }
    }
}

/// AI model selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Model {
    #[default]
    Opus,
    Sonnet,
    Haiku,
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Opus => write!(f, "opus"),
            Model::Sonnet => write!(f, "sonnet"),
            Model::Haiku => write!(f, "haiku"),
        }
    }
}

impl FromStr for Model {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opus" => Ok(Model::Opus),
            "sonnet" => Ok(Model::Sonnet),
            "haiku" => Ok(Model::Haiku),
            _ => Err(format!(
                "Unknown model: '{s}'. Expected: opus, sonnet, haiku"
            )),
        }
    }
}

/// Platform detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Darwin,
    Linux,
    Win32,
}

/// Project type detected from filesystem markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    Node,
    Android,
    Ios,
    Rust,
    Python,
    MultiPlatform,
    Unknown,
}

/// Build system detected from project configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Npm,
    Yarn,
    Pnpm,
    Gradle,
    Xcodebuild,
    Cargo,
    Pip,
    Poetry,
    Just,
    Make,
    Unknown,
}

/// Check result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Skip,
}

/// Task status in the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    InProgress,
    Done,
    Blocked,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Ready => write!(f, "ready"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Jira auth method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JiraAuthMethod {
    ApiToken,
    Oauth,
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
    Paused,
}

/// Verification result for individual checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationResult {
    Pass,
    Fail,
    #[serde(rename = "N/A")]
    NotApplicable,
}

/// Verification error type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationErrorType {
    Typecheck,
    Tests,
    Lint,
    SubtaskVerify,
}

/// Skill output status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillOutputStatus {
    SubtaskComplete,
    SubtaskPartial,
    AllComplete,
    AllBlocked,
    NoSubtasks,
    VerificationFailed,
    NeedsWork,
    Pass,
    Fail,
}

impl SkillOutputStatus {
    /// Returns true if this is a terminal status (execution should stop)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SkillOutputStatus::SubtaskComplete
                | SkillOutputStatus::AllComplete
                | SkillOutputStatus::AllBlocked
                | SkillOutputStatus::NoSubtasks
                | SkillOutputStatus::VerificationFailed
                | SkillOutputStatus::Pass
                | SkillOutputStatus::Fail
        )
    }
}

/// Pending update types for backend sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingUpdateType {
    StatusChange,
    AddComment,
    CreateSubtask,
    UpdateDescription,
    AddLabel,
    RemoveLabel,
}

/// Debug event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugEventType {
    RuntimeStateWrite,
    RuntimeStateRead,
    RuntimeWatcherTrigger,
    TaskStateChange,
    PendingUpdateQueue,
    PendingUpdatePush,
    BackendStatusUpdate,
    LockAcquire,
    LockRelease,
    TuiStateReceive,
}

/// Debug event source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebugEventSource {
    Loop,
    Tui,
    Push,
    ContextGenerator,
}

/// Debug verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugVerbosity {
    Minimal,
    Normal,
    Verbose,
}
