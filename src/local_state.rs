//! Local state manager for project-local .mobius/ directory
//!
//! Manages the project-local .mobius/ directory structure including:
//! - Atomic LOC-{N} ID generation via counter.json
//! - Parent/sub-task spec storage
//! - Iteration logging for execution tracking
//! - Pending update queuing for backend sync
//!
//! Uses git repo root detection to ensure .mobius/ is always in the repository root,
//! even when called from nested subdirectories.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::context::{ParentIssueContext, SubTaskContext};
use crate::types::task_graph::{LinearIssue, Relation, Relations};

/// Cached git repo root, resolved once per process.
static GIT_REPO_ROOT: OnceLock<PathBuf> = OnceLock::new();

/// Entry in the iteration log tracking execution attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationLogEntry {
    pub subtask_id: String,
    pub attempt: u32,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub status: IterationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_modified: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

/// Status of an iteration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IterationStatus {
    Success,
    Failed,
    Partial,
}

/// Completion summary for a finished issue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub parent_id: String,
    pub completed_at: String,
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub failed_tasks: u32,
    pub total_iterations: u32,
    pub task_outcomes: Vec<TaskOutcome>,
}

/// Outcome of a single task in the completion summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub id: String,
    pub status: String,
    pub iterations: u32,
}

/// Pending update entry queued for backend sync
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPendingUpdate {
    pub id: String,
    pub created_at: String,
    #[serde(rename = "type")]
    pub update_type: String,
    pub payload: serde_json::Value,
}

/// Counter file structure for LOC-{N} ID generation
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Counter {
    next: u32,
}

/// Status priority for deduplication — higher value wins
fn status_priority(status: &str) -> u32 {
    match status {
        "pending" => 0,
        "ready" => 1,
        "in_progress" => 2,
        "done" => 3,
        _ => 0,
    }
}

/// Get the git repository root directory.
///
/// Uses `git rev-parse --show-toplevel` to find the repo root.
/// Result is cached for the process lifetime via `OnceLock`.
fn get_git_repo_root() -> &'static Path {
    GIT_REPO_ROOT.get_or_init(|| {
        match Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .output()
        {
            Ok(output) if output.status.success() => {
                let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
                PathBuf::from(root)
            }
            _ => {
                // Fallback to cwd if not in a git repo
                std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
            }
        }
    })
}

/// Get the absolute path to the project-local .mobius/ directory.
///
/// Always returns the path relative to the git repository root,
/// regardless of the current working directory.
pub fn get_project_mobius_path() -> PathBuf {
    get_git_repo_root().join(".mobius")
}

/// Ensure the project-local .mobius/ directory exists with proper structure.
///
/// Creates .mobius/ and a .gitignore file containing `state/` entry
/// to keep runtime state out of version control while preserving specs.
pub fn ensure_project_mobius_dir() -> Result<()> {
    let mobius_path = get_project_mobius_path();
    fs::create_dir_all(&mobius_path)
        .with_context(|| format!("Failed to create {}", mobius_path.display()))?;

    let gitignore_path = mobius_path.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, "state/\n")
            .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;
    }

    Ok(())
}

/// Get the path to the issues directory within .mobius/
fn get_issues_path() -> PathBuf {
    get_project_mobius_path().join("issues")
}

/// Get the path to a specific issue directory
fn get_issue_path(issue_id: &str) -> PathBuf {
    get_issues_path().join(issue_id)
}

/// Ensure the directory structure for a specific issue exists
fn ensure_issue_dir(issue_id: &str) -> Result<()> {
    ensure_project_mobius_dir()?;
    let issue_path = get_issue_path(issue_id);
    fs::create_dir_all(issue_path.join("tasks"))
        .with_context(|| format!("Failed to create tasks dir for {}", issue_id))?;
    fs::create_dir_all(issue_path.join("execution"))
        .with_context(|| format!("Failed to create execution dir for {}", issue_id))?;
    Ok(())
}

/// Write data to a file atomically using temp file + rename pattern.
///
/// This ensures crash safety: either the old content or the new content
/// is visible, never a partially-written file.
fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(data)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&tmp_path, &json)
        .with_context(|| format!("Failed to write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// Scan existing LOC-* directories to determine next ID.
fn scan_for_next_id(issues_path: &Path) -> u32 {
    let entries = match fs::read_dir(issues_path) {
        Ok(entries) => entries,
        Err(_) => return 1,
    };

    let mut max_id: u32 = 0;

    for entry in entries.flatten() {
        if let Ok(file_type) = entry.file_type() {
            if file_type.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(num_str) = name.strip_prefix("LOC-") {
                        if let Ok(num) = num_str.parse::<u32>() {
                            if num > max_id {
                                max_id = num;
                            }
                        }
                    }
                }
            }
        }
    }

    max_id + 1
}

/// Get the next local ID by atomically incrementing counter.json.
///
/// Returns IDs in LOC-{N} format where N is zero-padded to 3 digits.
/// Uses atomic write (temp file + rename) for the counter file.
/// If counter.json is missing or corrupted, scans existing LOC-* directories
/// to determine the next ID.
pub fn get_next_local_id() -> Result<String> {
    ensure_project_mobius_dir()?;
    let issues_path = get_issues_path();
    fs::create_dir_all(&issues_path)?;

    let counter_path = issues_path.join("counter.json");
    let next_value = if counter_path.exists() {
        match fs::read_to_string(&counter_path) {
            Ok(content) => match serde_json::from_str::<Counter>(&content) {
                Ok(counter) if counter.next > 0 => counter.next,
                _ => scan_for_next_id(&issues_path),
            },
            Err(_) => scan_for_next_id(&issues_path),
        }
    } else {
        scan_for_next_id(&issues_path)
    };

    let new_counter = Counter {
        next: next_value + 1,
    };
    atomic_write_json(&counter_path, &new_counter)?;

    Ok(format!("LOC-{:03}", next_value))
}

/// Write a parent issue spec to .mobius/issues/{issueId}/parent.json
pub fn write_parent_spec(issue_id: &str, spec: &ParentIssueContext) -> Result<()> {
    ensure_issue_dir(issue_id)?;
    let file_path = get_issue_path(issue_id).join("parent.json");
    atomic_write_json(&file_path, spec)
}

/// Read a parent issue spec from .mobius/issues/{issueId}/parent.json
///
/// Returns None if the file doesn't exist or is corrupted.
pub fn read_parent_spec(issue_id: &str) -> Option<ParentIssueContext> {
    let file_path = get_issue_path(issue_id).join("parent.json");
    let content = fs::read_to_string(&file_path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Write a sub-task spec to .mobius/issues/{issueId}/tasks/{identifier}.json
pub fn write_subtask_spec(issue_id: &str, task: &SubTaskContext) -> Result<()> {
    let identifier = if task.identifier.is_empty() {
        &task.id
    } else {
        &task.identifier
    };
    if identifier.is_empty() {
        return Ok(());
    }

    ensure_issue_dir(issue_id)?;
    let file_path = get_issue_path(issue_id)
        .join("tasks")
        .join(format!("{}.json", identifier));
    atomic_write_json(&file_path, task)
}

/// Update just the status field of a parent issue's parent.json file on disk.
///
/// Reads the existing file, patches the status, and writes it back atomically.
/// Returns false if the file doesn't exist.
pub fn update_parent_status(issue_id: &str, status: &str) -> bool {
    let file_path = get_issue_path(issue_id).join("parent.json");
    let content = match fs::read_to_string(&file_path) {
        Ok(c) => c,
        Err(_) => return false,
    };

    let mut spec: ParentIssueContext = match serde_json::from_str(&content) {
        Ok(s) => s,
        Err(_) => return false,
    };

    spec.status = status.to_string();
    atomic_write_json(&file_path, &spec).is_ok()
}

/// Update just the status field of a sub-task's JSON file on disk.
///
/// Reads the existing file, patches the status, and writes it back atomically.
/// This ensures syncGraphFromLocal() sees the updated status on the next iteration.
pub fn update_subtask_status(issue_id: &str, task_identifier: &str, status: &str) {
    let file_path = get_issue_path(issue_id)
        .join("tasks")
        .join(format!("{}.json", task_identifier));

    let content = match fs::read_to_string(&file_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    let mut task: SubTaskContext = match serde_json::from_str(&content) {
        Ok(t) => t,
        Err(_) => return,
    };

    task.status = status.to_string();
    let _ = atomic_write_json(&file_path, &task);
}

/// Read all sub-task specs from .mobius/issues/{issueId}/tasks/
///
/// Returns an array of all valid sub-task specs found in the tasks directory.
/// Silently skips files that can't be parsed.
pub fn read_subtasks(issue_id: &str) -> Vec<SubTaskContext> {
    let tasks_dir = get_issue_path(issue_id).join("tasks");
    let entries = match fs::read_dir(&tasks_dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut tasks = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let mut task: SubTaskContext = match serde_json::from_str(&content) {
            Ok(t) => t,
            Err(_) => continue,
        };

        // Infer identifier from filename if missing
        if task.identifier.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                task.identifier = stem.to_string();
            }
        }

        tasks.push(task);
    }

    tasks
}

/// Read local sub-tasks and convert to LinearIssue format for buildTaskGraph().
///
/// Handles the schema mismatch between refine-written task files (which use
/// string arrays for blockedBy/blocks) and the LinearIssue format expected by
/// the task graph builder. Deduplicates by ID with status priority (higher status wins).
pub fn read_local_subtasks_as_linear_issues(issue_id: &str) -> Vec<LinearIssue> {
    let tasks = read_subtasks(issue_id);

    let issues: Vec<LinearIssue> = tasks
        .into_iter()
        .map(|task| {
            let blocked_by: Vec<Relation> = task
                .blocked_by
                .iter()
                .map(|b| Relation {
                    id: b.id.clone(),
                    identifier: b.identifier.clone(),
                })
                .collect();

            let blocks: Vec<Relation> = task
                .blocks
                .iter()
                .map(|b| Relation {
                    id: b.id.clone(),
                    identifier: b.identifier.clone(),
                })
                .collect();

            let identifier = if task.identifier.is_empty() {
                task.id.clone()
            } else {
                task.identifier.clone()
            };

            LinearIssue {
                id: task.id,
                identifier,
                title: task.title,
                status: task.status,
                git_branch_name: task.git_branch_name,
                relations: Some(Relations { blocked_by, blocks }),
                scoring: None,
            }
        })
        .collect();

    // Deduplicate by id — prefer done > in_progress > ready > pending
    let mut by_id: HashMap<String, LinearIssue> = HashMap::new();
    for issue in issues {
        let dominated = by_id
            .get(&issue.id)
            .map(|existing| status_priority(&issue.status) > status_priority(&existing.status))
            .unwrap_or(true);

        if dominated {
            by_id.insert(issue.id.clone(), issue);
        }
    }

    by_id.into_values().collect()
}

/// Read all iteration log entries from .mobius/issues/{issueId}/execution/iterations.json
///
/// Returns an empty vec if the file doesn't exist or is corrupted.
pub fn read_iteration_log(issue_id: &str) -> Vec<IterationLogEntry> {
    let file_path = get_issue_path(issue_id)
        .join("execution")
        .join("iterations.json");

    let content = match fs::read_to_string(&file_path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    serde_json::from_str::<Vec<IterationLogEntry>>(&content).unwrap_or_default()
}

/// Write an iteration log entry to .mobius/issues/{issueId}/execution/iterations.json
///
/// Appends the entry to the existing array, or creates a new array if the file doesn't exist.
pub fn write_iteration_log(issue_id: &str, entry: IterationLogEntry) -> Result<()> {
    ensure_issue_dir(issue_id)?;
    let file_path = get_issue_path(issue_id)
        .join("execution")
        .join("iterations.json");

    let mut entries = if file_path.exists() {
        match fs::read_to_string(&file_path) {
            Ok(content) => {
                serde_json::from_str::<Vec<IterationLogEntry>>(&content).unwrap_or_default()
            }
            Err(_) => Vec::new(),
        }
    } else {
        Vec::new()
    };

    entries.push(entry);
    atomic_write_json(&file_path, &entries)
}

/// Write a completion summary to .mobius/issues/{issueId}/summary.json
pub fn write_summary(issue_id: &str, summary: &CompletionSummary) -> Result<()> {
    ensure_issue_dir(issue_id)?;
    let file_path = get_issue_path(issue_id).join("summary.json");
    atomic_write_json(&file_path, summary)
}

/// Queue a pending update for backend sync.
///
/// Appends an update entry with a UUID and timestamp to
/// .mobius/issues/{issueId}/pending-updates.json
pub fn queue_pending_update(
    issue_id: &str,
    update_type: &str,
    payload: serde_json::Value,
) -> Result<()> {
    ensure_issue_dir(issue_id)?;
    let file_path = get_issue_path(issue_id).join("pending-updates.json");

    let mut updates: Vec<LocalPendingUpdate> = if file_path.exists() {
        match fs::read_to_string(&file_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    } else {
        Vec::new()
    };

    updates.push(LocalPendingUpdate {
        id: Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        update_type: update_type.to_string(),
        payload,
    });

    atomic_write_json(&file_path, &updates)
}

/// Read all pending updates from .mobius/issues/{issueId}/pending-updates.json
pub fn read_pending_updates(issue_id: &str) -> Vec<LocalPendingUpdate> {
    let file_path = get_issue_path(issue_id).join("pending-updates.json");
    let content = match fs::read_to_string(&file_path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    serde_json::from_str(&content).unwrap_or_default()
}

/// Write pending updates to .mobius/issues/{issueId}/pending-updates.json
pub fn write_pending_updates(issue_id: &str, updates: &[LocalPendingUpdate]) -> Result<()> {
    let file_path = get_issue_path(issue_id).join("pending-updates.json");
    atomic_write_json(&file_path, &updates.to_vec())
}
