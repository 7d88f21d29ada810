//! Skill output parser module
//!
//! Parses structured output from skills, extracting status, issue updates,
//! and actions from skill stdout/files. Supports YAML and JSON formats.

use anyhow::{bail, Result};
use serde_json::Value as JsonValue;

use crate::types::{SkillOutputData, SkillOutputStatus};

/// Parse structured output from a skill.
///
/// Supports both YAML and JSON formats. The function first attempts to extract
/// a structured block from raw pane content (which may contain conversation text),
/// then parses the extracted block as JSON or YAML.
pub fn parse_skill_output(raw_output: &str) -> Result<SkillOutputData> {
    let trimmed = raw_output.trim();
    if trimmed.is_empty() {
        bail!("Skill output is empty");
    }

    // First, try to extract a structured block from the raw output
    let content_to_parse = extract_structured_block(trimmed).unwrap_or(trimmed.to_string());

    // Try JSON first (faster), then YAML
    let parsed: Result<SkillOutputData, _> = serde_json::from_str(&content_to_parse);
    if let Ok(data) = parsed {
        validate_skill_output(&data)?;
        return Ok(data);
    }

    let parsed: Result<SkillOutputData, _> = serde_yaml::from_str(&content_to_parse);
    match parsed {
        Ok(data) => {
            validate_skill_output(&data)?;
            Ok(data)
        }
        Err(yaml_err) => {
            bail!(
                "Failed to parse skill output as JSON or YAML: {}. Input: {}",
                yaml_err,
                truncate_for_error(&content_to_parse, 200)
            )
        }
    }
}

/// Extract the status from skill output without full parsing.
///
/// Useful for quick status checks without validating all fields.
/// Handles raw tmux pane content by extracting the structured block first.
pub fn extract_status(raw_output: &str) -> Option<SkillOutputStatus> {
    let trimmed = raw_output.trim();
    if trimmed.is_empty() {
        return None;
    }

    let content_to_parse = extract_structured_block(trimmed).unwrap_or(trimmed.to_string());

    // Try JSON first, then YAML
    if let Ok(value) = serde_json::from_str::<JsonValue>(&content_to_parse) {
        if let Some(status_str) = value.get("status").and_then(|s| s.as_str()) {
            return parse_status_str(status_str);
        }
    }

    if let Ok(value) = serde_yaml::from_str::<JsonValue>(&content_to_parse) {
        if let Some(status_str) = value.get("status").and_then(|s| s.as_str()) {
            return parse_status_str(status_str);
        }
    }

    None
}

/// Extract structured output block from raw pane content.
///
/// The raw output from tmux panes contains the entire Claude conversation.
/// The structured output is a YAML or JSON block typically at the end,
/// delimited by `---` markers (YAML front matter style) or code fences.
fn extract_structured_block(raw_output: &str) -> Option<String> {
    // Strategy 1: Look for YAML blocks with --- delimiters
    if let Some(block) = extract_yaml_front_matter(raw_output) {
        return Some(block);
    }

    // Strategy 2: Look for code-fenced YAML (```yaml\n...\n```)
    if let Some(block) = extract_fenced_yaml(raw_output) {
        return Some(block);
    }

    // Strategy 3: Look for code-fenced JSON (```json\n...\n```)
    if let Some(block) = extract_fenced_json(raw_output) {
        return Some(block);
    }

    // Strategy 4: Try to find a JSON object with status field
    if let Some(block) = extract_raw_json_object(raw_output) {
        return Some(block);
    }

    None
}

/// Strategy 1: Extract YAML front matter blocks (---\n...\n---)
fn extract_yaml_front_matter(raw_output: &str) -> Option<String> {
    let re = regex::Regex::new(r"---\s*\n[\s\S]*?\n---").ok()?;
    let matches: Vec<_> = re.find_iter(raw_output).collect();

    // Check blocks from end to start (most recent first)
    for m in matches.iter().rev() {
        let block = m.as_str();
        // Remove the --- delimiters
        let content = block
            .trim_start_matches("---")
            .trim_end_matches("---")
            .trim();
        if content.contains("status:") {
            return Some(content.to_string());
        }
    }
    None
}

/// Strategy 2: Extract fenced YAML blocks (```yaml\n...\n```)
fn extract_fenced_yaml(raw_output: &str) -> Option<String> {
    let re = regex::Regex::new(r"```ya?ml\s*\n([\s\S]*?)\n```").ok()?;
    let matches: Vec<_> = re.captures_iter(raw_output).collect();

    for cap in matches.iter().rev() {
        let content = cap.get(1)?.as_str().trim();
        if content.contains("status:") {
            return Some(content.to_string());
        }
    }
    None
}

/// Strategy 3: Extract fenced JSON blocks (```json\n...\n```)
fn extract_fenced_json(raw_output: &str) -> Option<String> {
    let re = regex::Regex::new(r"```json\s*\n([\s\S]*?)\n```").ok()?;
    let matches: Vec<_> = re.captures_iter(raw_output).collect();

    for cap in matches.iter().rev() {
        let content = cap.get(1)?.as_str().trim();
        if content.contains("\"status\"") {
            return Some(content.to_string());
        }
    }
    None
}

/// Strategy 4: Extract raw JSON objects with brace matching
fn extract_raw_json_object(raw_output: &str) -> Option<String> {
    let re = regex::Regex::new(r#"\{[^{}]*"status"\s*:\s*"[A-Z_]+""#).ok()?;
    let matches: Vec<_> = re.find_iter(raw_output).collect();

    for m in matches.iter().rev() {
        let match_start = m.start();
        // Find the closing brace by counting braces
        let mut brace_count = 0i32;
        let mut end_pos = match_start;
        for (j, ch) in raw_output[match_start..].char_indices() {
            if ch == '{' {
                brace_count += 1;
            }
            if ch == '}' {
                brace_count -= 1;
            }
            if brace_count == 0 {
                end_pos = match_start + j + 1;
                break;
            }
        }
        let json_candidate = &raw_output[match_start..end_pos];
        if let Ok(value) = serde_json::from_str::<JsonValue>(json_candidate) {
            if value.get("status").is_some() {
                return Some(json_candidate.to_string());
            }
        }
    }
    None
}

/// Validate status-specific required fields after serde deserialization.
///
/// While serde handles type-level validation, this catches semantic constraints
/// like NEEDS_WORK requiring either execute format or verify format fields.
fn validate_skill_output(data: &SkillOutputData) -> Result<()> {
    match data {
        SkillOutputData::NeedsWork {
            subtask_id,
            issues,
            suggested_fixes,
            failing_subtasks,
            ..
        } => {
            let has_execute_format = subtask_id.is_some();
            let has_verify_format = failing_subtasks
                .as_ref()
                .map(|fs| !fs.is_empty())
                .unwrap_or(false);

            if !has_execute_format && !has_verify_format {
                bail!(
                    "NEEDS_WORK requires either subtaskId (string) or failingSubtasks (non-empty array)"
                );
            }

            // For execute format without verify format, issues and suggestedFixes are required
            if has_execute_format && !has_verify_format {
                if issues.is_none() || issues.as_ref().map(|i| i.is_empty()).unwrap_or(true) {
                    bail!("NEEDS_WORK with subtaskId requires issues (non-empty array)");
                }
                if suggested_fixes.is_none()
                    || suggested_fixes
                        .as_ref()
                        .map(|f| f.is_empty())
                        .unwrap_or(true)
                {
                    bail!("NEEDS_WORK with subtaskId requires suggestedFixes (non-empty array)");
                }
            }
            Ok(())
        }
        // Other variants are fully validated by serde's type system
        _ => Ok(()),
    }
}

/// Check if the skill output indicates a terminal state (execution should stop)
pub fn is_terminal_status(data: &SkillOutputData) -> bool {
    matches!(
        data,
        SkillOutputData::SubtaskComplete { .. }
            | SkillOutputData::AllComplete { .. }
            | SkillOutputData::AllBlocked { .. }
            | SkillOutputData::NoSubtasks { .. }
            | SkillOutputData::VerificationFailed { .. }
            | SkillOutputData::Pass { .. }
            | SkillOutputData::Fail { .. }
    )
}

/// Check if the skill output indicates success
pub fn is_success_status(data: &SkillOutputData) -> bool {
    matches!(
        data,
        SkillOutputData::SubtaskComplete { .. }
            | SkillOutputData::AllComplete { .. }
            | SkillOutputData::Pass { .. }
    )
}

/// Check if the skill output indicates failure
pub fn is_failure_status(data: &SkillOutputData) -> bool {
    matches!(
        data,
        SkillOutputData::VerificationFailed { .. } | SkillOutputData::Fail { .. }
    )
}

/// Get the SkillOutputStatus enum value from SkillOutputData
pub fn get_status(data: &SkillOutputData) -> SkillOutputStatus {
    match data {
        SkillOutputData::SubtaskComplete { .. } => SkillOutputStatus::SubtaskComplete,
        SkillOutputData::SubtaskPartial { .. } => SkillOutputStatus::SubtaskPartial,
        SkillOutputData::AllComplete { .. } => SkillOutputStatus::AllComplete,
        SkillOutputData::AllBlocked { .. } => SkillOutputStatus::AllBlocked,
        SkillOutputData::NoSubtasks { .. } => SkillOutputStatus::NoSubtasks,
        SkillOutputData::VerificationFailed { .. } => SkillOutputStatus::VerificationFailed,
        SkillOutputData::NeedsWork { .. } => SkillOutputStatus::NeedsWork,
        SkillOutputData::Pass { .. } => SkillOutputStatus::Pass,
        SkillOutputData::Fail { .. } => SkillOutputStatus::Fail,
    }
}

/// Parse a status string into the SkillOutputStatus enum
fn parse_status_str(s: &str) -> Option<SkillOutputStatus> {
    match s {
        "SUBTASK_COMPLETE" => Some(SkillOutputStatus::SubtaskComplete),
        "SUBTASK_PARTIAL" => Some(SkillOutputStatus::SubtaskPartial),
        "ALL_COMPLETE" => Some(SkillOutputStatus::AllComplete),
        "ALL_BLOCKED" => Some(SkillOutputStatus::AllBlocked),
        "NO_SUBTASKS" => Some(SkillOutputStatus::NoSubtasks),
        "VERIFICATION_FAILED" => Some(SkillOutputStatus::VerificationFailed),
        "NEEDS_WORK" => Some(SkillOutputStatus::NeedsWork),
        "PASS" => Some(SkillOutputStatus::Pass),
        "FAIL" => Some(SkillOutputStatus::Fail),
        _ => None,
    }
}

/// Truncate a string for error messages
fn truncate_for_error(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        &s[..max_len]
    }
}
