//! Top-level task resolution (§4.D): LOOM_EDIT block, then fenced JSON,
//! then natural-language directives, then a narrow bare-JSON fallback.
//! First match wins; later levels are only tried when an earlier one
//! yields nothing.

use crate::json_extract::extract_json_object;
use crate::loom_edit::{extract_loom_edit_blocks, render_loom_edit_block};
use crate::nl::parse_directive_line;
use loom_core::Task;
use loom_errors::ErrorKind;
use serde_json::Value;

/// Parse zero or more tasks out of a single chunk of model output.
pub fn parse_tasks(text: &str) -> Result<Vec<Task>, ErrorKind> {
    let loom_edits = extract_loom_edit_blocks(text)?;
    if !loom_edits.is_empty() {
        return Ok(loom_edits
            .into_iter()
            .map(|directive| {
                let content = render_loom_edit_block(&directive);
                Task::EditFile {
                    path: directive.file,
                    content,
                    loom_edit_command: true,
                }
            })
            .collect());
    }

    if text.contains("```json") {
        let fenced = extract_json_object(text).ok_or(ErrorKind::ParseFailure)?;
        let value: Value = serde_json::from_str(fenced).map_err(|_| ErrorKind::ParseFailure)?;
        return tasks_from_json_value(&value).ok_or(ErrorKind::ParseFailure);
    }

    let mut tasks = Vec::new();
    for line in text.lines() {
        if let Some(task) = parse_directive_line(line) {
            tasks.push(task);
        }
    }
    if !tasks.is_empty() {
        return Ok(tasks);
    }

    let trimmed = text.trim_start();
    if trimmed.starts_with("{\"type\":") || trimmed.starts_with("{\"type\" :") {
        let value: Value = serde_json::from_str(trimmed).map_err(|_| ErrorKind::ParseFailure)?;
        return tasks_from_json_value(&value).ok_or(ErrorKind::ParseFailure);
    }

    Ok(Vec::new())
}

fn tasks_from_json_value(value: &Value) -> Option<Vec<Task>> {
    if let Some(tasks) = value.get("tasks").and_then(Value::as_array) {
        let parsed: Result<Vec<Task>, _> = tasks
            .iter()
            .map(|v| serde_json::from_value(v.clone()))
            .collect();
        return parsed.ok();
    }
    if value.get("type").is_some() {
        return serde_json::from_value(value.clone()).ok().map(|t| vec![t]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loom_edit_wins_over_everything_else() {
        let text = "{\"type\":\"ReadFile\",\"path\":\"a.rs\"}\n>>LOOM_EDIT file=b.rs REPLACE 1-1\nx\n<<LOOM_EDIT";
        let tasks = parse_tasks(text).expect("parse");
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], Task::EditFile { path, loom_edit_command: true, .. } if path == "b.rs"));
    }

    #[test]
    fn parses_fenced_json_task_list() {
        let text = "```json\n{\"tasks\":[{\"type\":\"ListDir\",\"path\":\".\"}]}\n```";
        let tasks = parse_tasks(text).expect("parse");
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], Task::ListDir { .. }));
    }

    #[test]
    fn malformed_fenced_json_is_a_parse_error() {
        let text = "```json\n{not valid json\n```";
        let err = parse_tasks(text).unwrap_err();
        assert_eq!(err, ErrorKind::ParseFailure);
    }

    #[test]
    fn fenced_json_with_backticks_inside_a_string_value_still_parses() {
        let text = "```json\n{\"type\":\"EditFile\",\"path\":\"a.md\",\"content\":\"```rust\\nfn f() {}\\n```\",\"loom_edit_command\":false}\n```";
        let tasks = parse_tasks(text).expect("parse");
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], Task::EditFile { path, .. } if path == "a.md"));
    }

    #[test]
    fn falls_back_to_natural_language_when_no_json() {
        let text = "Let's take a look.\nREAD src/main.rs\n";
        let tasks = parse_tasks(text).expect("parse");
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], Task::ReadFile { .. }));
    }

    #[test]
    fn commandless_prose_yields_zero_tasks() {
        let tasks = parse_tasks("I've reviewed the file and everything looks good.").expect("parse");
        assert!(tasks.is_empty());
    }

    #[test]
    fn bare_json_fallback_requires_exact_type_prefix() {
        let text = "{\"type\":\"ListDir\",\"path\":\".\"}";
        let tasks = parse_tasks(text).expect("parse");
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn natural_language_wins_over_incidental_json_in_prose() {
        let text = "READ a.rs\n{\"type\":\"ListDir\",\"path\":\".\"}";
        let tasks = parse_tasks(text).expect("parse");
        assert_eq!(tasks.len(), 1);
        assert!(matches!(&tasks[0], Task::ReadFile { path, .. } if path == "a.rs"));
    }

    #[test]
    fn prose_containing_braces_does_not_trigger_bare_json_fallback() {
        let text = "if (x) { return 1; } // just a code snippet in prose";
        let tasks = parse_tasks(text).expect("parse");
        assert!(tasks.is_empty());
    }
}
