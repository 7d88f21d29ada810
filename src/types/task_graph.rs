//! The task dependency graph: sub-task nodes, blocking relations, and the
//! ready-frontier computation the scheduler polls every iteration.
//!
//! Built from whatever a backend adapter returns (`LinearIssue` is the wire
//! shape shared by the Linear and Jira clients and the local store), then
//! held in memory as two adjacency maps (`tasks`, `edges`) per task. No
//! arena indices, no object references back into the graph — ids are the
//! only cross-reference.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::enums::{Model, TaskStatus};

/// Linear issue data structure (subset of what Linear returns)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub status: String,
    #[serde(default)]
    pub git_branch_name: String,
    #[serde(default)]
    pub relations: Option<Relations>,
    #[serde(default)]
    pub scoring: Option<TaskScoring>,
}

/// Blocking relations for an issue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relations {
    #[serde(default)]
    pub blocked_by: Vec<Relation>,
    #[serde(default)]
    pub blocks: Vec<Relation>,
}

/// A single relation reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: String,
    pub identifier: String,
}

/// The parent issue a task graph hangs off of.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentIssue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub git_branch_name: String,
}

/// Complexity/risk scoring attached to a sub-task, used to pick an agent
/// model tier without consulting the global config default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskScoring {
    pub complexity: u8,
    pub risk: u8,
    pub recommended_model: Model,
    pub rationale: String,
}

/// A node in the task graph: identity, title, status, and the two relation
/// sets that drive frontier computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub status: TaskStatus,
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
    pub git_branch_name: String,
    #[serde(default)]
    pub scoring: Option<TaskScoring>,
}

/// The task graph itself: `id -> node` plus a precomputed `id ->
/// blocked_by ids` adjacency map. Quick-access status sets (ready,
/// in_progress, done, failed) are derived on demand rather than stored,
/// since every mutation would otherwise need to keep them in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGraph {
    pub parent_id: String,
    pub parent_identifier: String,
    pub tasks: HashMap<String, SubTask>,
    pub edges: HashMap<String, Vec<String>>,
}

/// Per-status counts over a graph, for observers (TUI, `tree`, loop summary).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total: usize,
    pub pending: usize,
    pub ready: usize,
    pub in_progress: usize,
    pub done: usize,
    pub blocked: usize,
    pub failed: usize,
}

/// Translate a human-visible backend status string (Linear/Jira/local tag)
/// into the internal task status enum.
///
/// Matching is case-insensitive and trims whitespace; anything unrecognized
/// is treated as `pending` rather than rejected, since backends are free to
/// introduce custom workflow states the graph doesn't need to understand.
pub fn map_backend_status(status: &str) -> TaskStatus {
    match status.trim().to_lowercase().as_str() {
        "done" | "completed" | "closed" => TaskStatus::Done,
        "in progress" | "started" | "in review" => TaskStatus::InProgress,
        "backlog" | "todo" | "reopened" => TaskStatus::Pending,
        "cancelled" | "canceled" => TaskStatus::Failed,
        "ready" => TaskStatus::Ready,
        "blocked" => TaskStatus::Blocked,
        _ => TaskStatus::Pending,
    }
}

/// Build a task graph from a flat list of issues fetched from a backend
/// adapter. Pure and infallible: cycle detection is a separate pass
/// (`detect_cycle`) so callers can decide how to surface a `CycleDetected`
/// diagnostic without this constructor needing a `Result`.
pub fn build_task_graph(parent_id: &str, parent_identifier: &str, issues: &[LinearIssue]) -> TaskGraph {
    let mut tasks = HashMap::with_capacity(issues.len());
    let mut edges = HashMap::with_capacity(issues.len());

    for issue in issues {
        let blocked_by: Vec<String> = issue
            .relations
            .as_ref()
            .map(|r| r.blocked_by.iter().map(|rel| rel.id.clone()).collect())
            .unwrap_or_default();
        let blocks: Vec<String> = issue
            .relations
            .as_ref()
            .map(|r| r.blocks.iter().map(|rel| rel.id.clone()).collect())
            .unwrap_or_default();

        edges.insert(issue.id.clone(), blocked_by.clone());

        tasks.insert(
            issue.id.clone(),
            SubTask {
                id: issue.id.clone(),
                identifier: issue.identifier.clone(),
                title: issue.title.clone(),
                status: map_backend_status(&issue.status),
                blocked_by,
                blocks,
                git_branch_name: issue.git_branch_name.clone(),
                scoring: issue.scoring.clone(),
            },
        );
    }

    TaskGraph {
        parent_id: parent_id.to_string(),
        parent_identifier: parent_identifier.to_string(),
        tasks,
        edges,
    }
}

/// Walk the `blocked_by` adjacency looking for a cycle. Returns the cycle
/// path (task ids) if one exists, so the caller can build a `CycleDetected`
/// diagnostic with the offending chain.
pub fn detect_cycle(graph: &TaskGraph) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<String> = Vec::new();

    fn visit<'a>(
        id: &'a str,
        graph: &'a TaskGraph,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = path.iter().position(|p| p == id).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(id.to_string());
                return Some(cycle);
            }
            None => {}
        }

        marks.insert(id, Mark::Visiting);
        path.push(id.to_string());

        if let Some(task) = graph.tasks.get(id) {
            for blocker in &task.blocked_by {
                if let Some(cycle) = visit(blocker, graph, marks, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let mut ids: Vec<&str> = graph.tasks.keys().map(|k| k.as_str()).collect();
    ids.sort_unstable();

    for id in ids {
        if let Some(cycle) = visit(id, graph, &mut marks, &mut path) {
            return Some(cycle);
        }
    }

    None
}

/// Tasks eligible for immediate dispatch: status is `pending` or `ready`,
/// and every task in `blocked_by` has status `done`. Deterministic order,
/// ascending by identifier.
pub fn get_ready_tasks(graph: &TaskGraph) -> Vec<&SubTask> {
    let mut ready: Vec<&SubTask> = graph
        .tasks
        .values()
        .filter(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::Ready))
        .filter(|t| {
            t.blocked_by.iter().all(|blocker_id| {
                graph
                    .tasks
                    .get(blocker_id)
                    .map(|b| b.status == TaskStatus::Done)
                    .unwrap_or(false)
            })
        })
        .collect();

    ready.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    ready
}

/// Tasks that are not done, not in flight, and not currently eligible to
/// run because at least one blocker hasn't reached `done`. Used for
/// display (`tree`, loop status lines) rather than scheduling.
pub fn get_blocked_tasks(graph: &TaskGraph) -> Vec<&SubTask> {
    let mut blocked: Vec<&SubTask> = graph
        .tasks
        .values()
        .filter(|t| !matches!(t.status, TaskStatus::Done | TaskStatus::InProgress))
        .filter(|t| {
            t.status == TaskStatus::Blocked
                || t.blocked_by.iter().any(|blocker_id| {
                    graph
                        .tasks
                        .get(blocker_id)
                        .map(|b| b.status != TaskStatus::Done)
                        .unwrap_or(true)
                })
        })
        .collect();

    blocked.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    blocked
}

/// Resolve the `SubTask`s referenced by a task's `blocked_by` set.
pub fn get_blockers<'a>(graph: &'a TaskGraph, task_id: &str) -> Vec<&'a SubTask> {
    let Some(task) = graph.tasks.get(task_id) else {
        return Vec::new();
    };

    let mut blockers: Vec<&SubTask> = task
        .blocked_by
        .iter()
        .filter_map(|id| graph.tasks.get(id))
        .collect();
    blockers.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    blockers
}

/// The parent-level "verification gate" task, if the backend modeled one —
/// identified the same way `select_skill_for_task` picks a skill: a title
/// mentioning both "verification" and "gate".
pub fn get_verification_task(graph: &TaskGraph) -> Option<&SubTask> {
    let mut candidates: Vec<&SubTask> = graph
        .tasks
        .values()
        .filter(|t| {
            let lower = t.title.to_lowercase();
            lower.contains("verification") && lower.contains("gate")
        })
        .collect();
    candidates.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    candidates.into_iter().next()
}

/// Pure status transition. If `new_status` is `Done`, tasks downstream in
/// `blocks` may become eligible on the next `get_ready_tasks` call — no
/// explicit propagation is needed since readiness is computed, not stored.
pub fn update_task_status(graph: &TaskGraph, task_id: &str, new_status: TaskStatus) -> TaskGraph {
    let mut new_graph = graph.clone();
    if let Some(task) = new_graph.tasks.get_mut(task_id) {
        task.status = new_status;
    }
    new_graph
}

/// Per-status counts over the graph.
pub fn get_graph_stats(graph: &TaskGraph) -> GraphStats {
    let ready_ids: HashSet<&str> = get_ready_tasks(graph)
        .into_iter()
        .map(|t| t.id.as_str())
        .collect();

    let mut stats = GraphStats {
        total: graph.tasks.len(),
        ..Default::default()
    };

    for task in graph.tasks.values() {
        match task.status {
            TaskStatus::Done => stats.done += 1,
            TaskStatus::InProgress => stats.in_progress += 1,
            TaskStatus::Failed => stats.failed += 1,
            TaskStatus::Blocked => stats.blocked += 1,
            TaskStatus::Pending | TaskStatus::Ready => {
                if ready_ids.contains(task.id.as_str()) {
                    stats.ready += 1;
                } else {
                    stats.blocked += 1;
                }
                stats.pending += 1;
            }
        }
    }

    stats
}
