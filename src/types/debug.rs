use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::enums::{DebugEventSource, DebugEventType, DebugVerbosity};

/// A single debug event entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugEvent {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub event_type: DebugEventType,
    pub source: DebugEventSource,
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub data: HashMap<String, serde_json::Value>,
}

/// Debug mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfig {
    pub enabled: bool,
    pub verbosity: DebugVerbosity,
    pub log_to_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            verbosity: DebugVerbosity::Normal,
            log_to_file: false,
            session_id: None,
        }
    }
}

/// Debug verbosity levels determine what events are logged.
///
/// Returns the list of event types that should be captured at each verbosity level.
pub fn verbosity_event_types(verbosity: DebugVerbosity) -> &'static [DebugEventType] {
    match verbosity {
        DebugVerbosity::Minimal => &[
            DebugEventType::TaskStateChange,
            DebugEventType::BackendStatusUpdate,
        ],
        DebugVerbosity::Normal => &[
            DebugEventType::TaskStateChange,
            DebugEventType::PendingUpdateQueue,
            DebugEventType::PendingUpdatePush,
            DebugEventType::BackendStatusUpdate,
            DebugEventType::TuiStateReceive,
        ],
        DebugVerbosity::Verbose => &[
            DebugEventType::RuntimeStateWrite,
            DebugEventType::RuntimeStateRead,
            DebugEventType::RuntimeWatcherTrigger,
            DebugEventType::TaskStateChange,
            DebugEventType::PendingUpdateQueue,
            DebugEventType::PendingUpdatePush,
            DebugEventType::BackendStatusUpdate,
            DebugEventType::LockAcquire,
            DebugEventType::LockRelease,
            DebugEventType::TuiStateReceive,
        ],
    }
}
