//! The natural-language directive grammar (§4.D): `READ`, `LIST`, `SEARCH`,
//! `RUN`, `MEMORY`, `EDIT` lines emitted outside any JSON or LOOM_EDIT
//! wrapper.

use loom_core::{MemoryOperation, SearchOptions, Task};
use regex::Regex;
use std::sync::OnceLock;

/// Conversational fragments that must never be mistaken for a MEMORY id —
/// guards against `Memory saved!`/`Edit completed successfully.` being
/// parsed as directives (§4.D).
const CONVERSATIONAL_FRAGMENTS: &[&str] = &[
    "saved",
    "saved!",
    "complete",
    "completed",
    "successfully",
    "done",
    "ok",
];

/// Decorations (emoji, bullets) the model sometimes prefixes a directive
/// line with; stripped before matching a verb.
fn strip_decoration(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_whitespace() || (!c.is_ascii() && !c.is_alphanumeric()) || matches!(c, '-' | '*' | '>')
    })
}

fn read_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^READ\s+(?P<path>\S+?)(?:\s*\(max:\s*(?P<max>\d+)\s*lines?\))?(?:\s+(?P<numbered>with line numbers|numbered|with numbers))?(?:\s*\(lines\s+(?P<start>\d+)-(?P<end>\d+)\))?\s*$"#,
        )
        .expect("valid regex")
    })
}

fn list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^LIST\s+(?P<path>\S+)(?:\s+(?P<recursive>recursive))?\s*$"#)
            .expect("valid regex")
    })
}

fn search_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^SEARCH\s+"(?P<query>[^"]*)"(?:\s+in\s+(?P<path>\S+))?(?P<rest>.*)$"#,
        )
        .expect("valid regex")
    })
}

fn run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^RUN\s+(?P<command>.+?)(?:\s*\(timeout:\s*(?P<timeout>\d+)\))?\s*$"#)
            .expect("valid regex")
    })
}

fn memory_op_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^MEMORY\s+(?P<op>create|update|get|delete|list)\s+"(?P<id>[^"]+)"(?P<rest>.*)$"#,
        )
        .expect("valid regex")
    })
}

fn memory_shorthand_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)^MEMORY\s+"(?P<id>[^"]+)"\s*:\s*(?P<content>.+)$"#).expect("valid regex")
    })
}

fn edit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)^EDIT\s+(?P<path>\S+?):(?P<start>\d+)(?:-(?P<end>\d+))?\s*->\s*(?P<intent>.+)$"#,
        )
        .expect("valid regex")
    })
}

/// Parse a single natural-language directive line into a `Task`, or `None`
/// if the line does not match any directive grammar (treated by the
/// caller as commentary, not an error).
pub fn parse_directive_line(line: &str) -> Option<Task> {
    let line = strip_decoration(line).trim();
    if line.is_empty() {
        return None;
    }

    if let Some(caps) = read_re().captures(line) {
        let max_lines = caps
            .name("max")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(500);
        let start_line = caps.name("start").and_then(|m| m.as_str().parse().ok());
        let end_line = caps.name("end").and_then(|m| m.as_str().parse().ok());
        return Some(Task::ReadFile {
            path: caps["path"].to_string(),
            start_line,
            end_line,
            max_lines,
            show_line_numbers: caps.name("numbered").is_some(),
        });
    }

    if let Some(caps) = list_re().captures(line) {
        return Some(Task::ListDir {
            path: caps["path"].to_string(),
            recursive: caps.name("recursive").is_some(),
        });
    }

    if let Some(caps) = search_re().captures(line) {
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
        return Some(Task::Search {
            query: caps["query"].to_string(),
            path: caps
                .name("path")
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| ".".to_string()),
            options: parse_search_options(rest),
        });
    }

    if let Some(caps) = run_re().captures(line) {
        let timeout_seconds = caps
            .name("timeout")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(3);
        return Some(Task::RunShell {
            command: caps["command"].trim().to_string(),
            timeout_seconds,
            expected_prompts: Vec::new(),
            predefined_inputs: Vec::new(),
        });
    }

    if let Some(caps) = memory_op_re().captures(line) {
        let id = caps["id"].to_string();
        if is_conversational_fragment(&id) {
            return None;
        }
        let operation = match &caps["op"].to_ascii_lowercase()[..] {
            "create" => MemoryOperation::Create,
            "update" => MemoryOperation::Update,
            "get" => MemoryOperation::Get,
            "delete" => MemoryOperation::Delete,
            "list" => MemoryOperation::List,
            _ => return None,
        };
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");
        let (content, tags, active) = parse_memory_attrs(rest);
        return Some(Task::Memory {
            operation,
            id,
            content,
            tags,
            active,
            description: None,
        });
    }

    if let Some(caps) = memory_shorthand_re().captures(line) {
        let id = caps["id"].to_string();
        if is_conversational_fragment(&id) {
            return None;
        }
        return Some(Task::Memory {
            operation: MemoryOperation::Create,
            id,
            content: Some(caps["content"].trim().to_string()),
            tags: Vec::new(),
            active: None,
            description: None,
        });
    }

    if let Some(caps) = edit_re().captures(line) {
        let start: usize = caps["start"].parse().ok()?;
        let end: usize = caps
            .name("end")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(start);
        let intent = caps["intent"].trim().to_string();
        let content = format!(
            "{}:{}{} -> {}",
            &caps["path"],
            start,
            if end != start {
                format!("-{end}")
            } else {
                String::new()
            },
            intent
        );
        return Some(Task::EditFile {
            path: caps["path"].to_string(),
            content,
            loom_edit_command: false,
        });
    }

    None
}

fn is_conversational_fragment(id: &str) -> bool {
    let lowered = id.trim().to_ascii_lowercase();
    CONVERSATIONAL_FRAGMENTS
        .iter()
        .any(|frag| lowered == *frag)
}

fn parse_search_options(rest: &str) -> SearchOptions {
    let mut options = SearchOptions::default();
    for token in rest.split_whitespace() {
        if let Some(value) = token.strip_prefix("type:") {
            options.file_type_include = value.split(',').map(str::to_string).collect();
        } else if let Some(value) = token.strip_prefix("glob:") {
            options.glob_include = value.split(',').map(str::to_string).collect();
        } else if let Some(value) = token.strip_prefix("-glob:") {
            options.glob_exclude = value.split(',').map(str::to_string).collect();
        } else if let Some(value) = token.strip_prefix("context:") {
            if let Ok(n) = value.parse() {
                options.context_before = n;
                options.context_after = n;
            }
        } else if let Some(value) = token.strip_prefix("max:") {
            options.max_results = value.parse().ok();
        } else if token.eq_ignore_ascii_case("case-insensitive") {
            options.case_insensitive = true;
        } else if token.eq_ignore_ascii_case("whole-word") {
            options.whole_word = true;
        } else if token.eq_ignore_ascii_case("literal") {
            options.fixed_string = true;
        }
    }
    options
}

fn parse_memory_attrs(rest: &str) -> (Option<String>, Vec<String>, Option<bool>) {
    let mut content = None;
    let mut tags = Vec::new();
    let mut active = None;

    if let Some(re) = memory_content_re().captures(rest) {
        content = Some(re["value"].to_string());
    }
    if let Some(re) = memory_tags_re().captures(rest) {
        tags = re["value"].split(',').map(|t| t.trim().to_string()).collect();
    }
    if let Some(re) = memory_active_re().captures(rest) {
        active = re["value"].parse().ok();
    }

    (content, tags, active)
}

fn memory_content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"content:"(?P<value>[^"]*)""#).expect("valid regex"))
}

fn memory_tags_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"tags:(?P<value>[\w,\-]+)"#).expect("valid regex"))
}

fn memory_active_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"active:(?P<value>true|false)"#).expect("valid regex"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_read() {
        let task = parse_directive_line("READ src/main.rs").expect("parse");
        assert!(matches!(task, Task::ReadFile { path, .. } if path == "src/main.rs"));
    }

    #[test]
    fn parses_read_with_range_and_max() {
        let task =
            parse_directive_line("READ src/main.rs (max: 50 lines) (lines 10-20)").expect("parse");
        match task {
            Task::ReadFile {
                max_lines,
                start_line,
                end_line,
                ..
            } => {
                assert_eq!(max_lines, 50);
                assert_eq!(start_line, Some(10));
                assert_eq!(end_line, Some(20));
            }
            _ => panic!("expected ReadFile"),
        }
    }

    #[test]
    fn parses_recursive_list() {
        let task = parse_directive_line("LIST src recursive").expect("parse");
        assert!(matches!(task, Task::ListDir { recursive: true, .. }));
    }

    #[test]
    fn parses_search_with_options() {
        let task = parse_directive_line(r#"SEARCH "foo" type:rs,toml case-insensitive"#)
            .expect("parse");
        match task {
            Task::Search { query, options, .. } => {
                assert_eq!(query, "foo");
                assert!(options.case_insensitive);
                assert_eq!(options.file_type_include, vec!["rs", "toml"]);
            }
            _ => panic!("expected Search"),
        }
    }

    #[test]
    fn parses_run_with_timeout() {
        let task = parse_directive_line("RUN cargo test (timeout: 30)").expect("parse");
        assert!(matches!(
            task,
            Task::RunShell { timeout_seconds: 30, .. }
        ));
    }

    #[test]
    fn parses_memory_shorthand() {
        let task = parse_directive_line(r#"MEMORY "build-note": use cargo build"#).expect("parse");
        match task {
            Task::Memory { id, content, .. } => {
                assert_eq!(id, "build-note");
                assert_eq!(content, Some("use cargo build".to_string()));
            }
            _ => panic!("expected Memory"),
        }
    }

    #[test]
    fn rejects_conversational_affirmation_as_memory() {
        assert!(parse_directive_line("Memory saved!").is_none());
        assert!(parse_directive_line("Edit completed successfully.").is_none());
    }

    #[test]
    fn strips_emoji_decoration_before_verb() {
        let task = parse_directive_line("🔧 READ src/main.rs").expect("parse");
        assert!(matches!(task, Task::ReadFile { .. }));
    }

    #[test]
    fn parses_edit_directive_with_range() {
        let task =
            parse_directive_line("EDIT src/lib.rs:10-12 -> fix the off-by-one").expect("parse");
        match task {
            Task::EditFile { path, content, .. } => {
                assert_eq!(path, "src/lib.rs");
                assert!(content.contains("10-12"));
            }
            _ => panic!("expected EditFile"),
        }
    }

    #[test]
    fn non_directive_prose_returns_none() {
        assert!(parse_directive_line("I'll take a look at that now.").is_none());
    }
}
