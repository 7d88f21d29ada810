//! Adapts the agent-invocation command line to the configured agent runtime.
//!
//! `claude` is invoked through the dedicated `--output-format stream-json`
//! pipeline in `executor::build_claude_command` (it needs the `tee | cclean`
//! plumbing for token accounting); this module supplies the equivalent for
//! every other supported runtime, plus the Claude fallback used when callers
//! go through the generic `ExecutionCommand` path instead.

use crate::types::enums::AgentRuntime;
use crate::types::ExecutionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Claude,
    Opencode,
}

/// Resolve the model string to pass on the command line for a given runtime.
///
/// Claude always uses the configured model profile — a raw override (meant
/// for runtimes with a different model-naming scheme) is ignored. Opencode
/// accepts a raw override verbatim, falling back to the config model when
/// the override is absent or blank.
pub fn effective_model_for_runtime(
    runtime: RuntimeKind,
    config: &ExecutionConfig,
    raw_model_override: Option<&str>,
) -> String {
    match runtime {
        RuntimeKind::Claude => config.model.to_string(),
        RuntimeKind::Opencode => raw_model_override
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| config.model.to_string()),
    }
}

/// Map a thinking-level name to the `--variant` flag Opencode understands.
fn thinking_level_to_variant(level: &str) -> &str {
    match level.trim().to_lowercase().as_str() {
        "xhigh" | "max" => "max",
        "high" => "high",
        "medium" => "medium",
        "low" => "low",
        other => other,
    }
}

/// Qualify a bare model name with the `openai/` provider prefix Opencode
/// expects, unless the caller already supplied a qualified name.
fn qualify_opencode_model(model: &str) -> String {
    if model.contains('/') {
        model.to_string()
    } else {
        format!("openai/{model}")
    }
}

/// Inputs shared by every non-Claude-specific runtime command builder.
pub struct ExecutionCommand<'a> {
    pub subtask_identifier: &'a str,
    pub skill: &'a str,
    pub worktree_path: &'a str,
    pub config: &'a ExecutionConfig,
    pub context_file_path: Option<&'a str>,
    pub model_override: Option<&'a str>,
    pub thinking_level_override: Option<&'a str>,
}

/// Build the shell command that invokes the given runtime inside a worktree.
pub fn build_execution_command(runtime: AgentRuntime, options: &ExecutionCommand<'_>) -> String {
    match runtime {
        AgentRuntime::Claude => build_claude_fallback_command(options),
        AgentRuntime::Opencode => build_opencode_command(options),
    }
}

fn env_prefix(options: &ExecutionCommand<'_>) -> String {
    options
        .context_file_path
        .map(|path| {
            format!(
                "MOBIUS_CONTEXT_FILE=\"{}\" MOBIUS_TASK_ID=\"{}\" ",
                path, options.subtask_identifier
            )
        })
        .unwrap_or_default()
}

/// Claude invocation used by callers going through the generic
/// `ExecutionCommand` path. Mirrors `executor::build_claude_command` minus
/// the `tee`/token-capture plumbing, which only the primary pane needs.
fn build_claude_fallback_command(options: &ExecutionCommand<'_>) -> String {
    let model = effective_model_for_runtime(RuntimeKind::Claude, options.config, None);
    let env = env_prefix(options);

    format!(
        "cd \"{}\" && echo '{} {}' | {}claude -p --dangerously-skip-permissions --verbose --output-format stream-json --model {} | cclean",
        options.worktree_path, options.skill, options.subtask_identifier, env, model
    )
}

fn build_opencode_command(options: &ExecutionCommand<'_>) -> String {
    let model = effective_model_for_runtime(RuntimeKind::Opencode, options.config, options.model_override);
    let qualified_model = qualify_opencode_model(&model);
    let variant = options
        .thinking_level_override
        .map(thinking_level_to_variant)
        .unwrap_or("medium");
    let env = env_prefix(options);

    let prompt = format!(
        "Use the {} skill for sub-task {}.",
        options.skill.trim_start_matches('/'),
        options.subtask_identifier
    );

    format!(
        "cd \"{}\" && {}opencode run --model {} --variant {} \"{}\"",
        options.worktree_path, env, qualified_model, variant, prompt
    )
}
