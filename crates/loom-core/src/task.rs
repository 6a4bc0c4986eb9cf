use serde::{Deserialize, Serialize};

/// A single structured task extracted from model output by the command
/// parser, one variant per §3 kind. Every variant carries its own
/// path/timeout envelope rather than a shared base struct, because the
/// envelope fields differ per kind (a `Search` has no `timeout_seconds`,
/// a `RunShell` has no `path`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Task {
    ReadFile {
        path: String,
        #[serde(default)]
        start_line: Option<usize>,
        #[serde(default)]
        end_line: Option<usize>,
        #[serde(default = "default_max_lines")]
        max_lines: usize,
        #[serde(default)]
        show_line_numbers: bool,
    },
    EditFile {
        path: String,
        content: String,
        #[serde(default)]
        loom_edit_command: bool,
    },
    ListDir {
        path: String,
        #[serde(default)]
        recursive: bool,
    },
    RunShell {
        command: String,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
        #[serde(default)]
        expected_prompts: Vec<String>,
        #[serde(default)]
        predefined_inputs: Vec<String>,
    },
    Search {
        query: String,
        path: String,
        #[serde(default)]
        options: SearchOptions,
    },
    Memory {
        operation: MemoryOperation,
        id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        active: Option<bool>,
        #[serde(default)]
        description: Option<String>,
    },
}

fn default_max_lines() -> usize {
    500
}

fn default_timeout_seconds() -> u64 {
    3
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MemoryOperation {
    Create,
    Update,
    Get,
    Delete,
    List,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchOptions {
    pub case_insensitive: bool,
    pub whole_word: bool,
    pub fixed_string: bool,
    pub pcre2: bool,
    pub filenames_only: bool,
    pub count_only: bool,
    pub context_before: usize,
    pub context_after: usize,
    pub file_type_include: Vec<String>,
    pub file_type_exclude: Vec<String>,
    pub glob_include: Vec<String>,
    pub glob_exclude: Vec<String>,
    pub search_hidden: bool,
    pub max_results: Option<usize>,
    pub search_names: bool,
}

impl Task {
    /// The workspace-relative path this task principally concerns, if any.
    /// `RunShell` and `Memory` have no single path.
    pub fn path(&self) -> Option<&str> {
        match self {
            Task::ReadFile { path, .. }
            | Task::EditFile { path, .. }
            | Task::ListDir { path, .. } => Some(path),
            Task::Search { path, .. } => Some(path),
            Task::RunShell { .. } | Task::Memory { .. } => None,
        }
    }

    /// A short human label used in `TASK_RESULT` framing and UI status lines.
    pub fn describe(&self) -> String {
        match self {
            Task::ReadFile { path, .. } => format!("Read {path}"),
            Task::EditFile { path, .. } => format!("Edit {path}"),
            Task::ListDir { path, recursive } => {
                if *recursive {
                    format!("List {path} (recursive)")
                } else {
                    format!("List {path}")
                }
            }
            Task::RunShell { command, .. } => format!("Run `{command}`"),
            Task::Search { query, path, .. } => format!("Search \"{query}\" in {path}"),
            Task::Memory { operation, id, .. } => format!("Memory {operation:?} \"{id}\""),
        }
    }

    /// Validate the cross-field invariants from §3 that the parser cannot
    /// enforce purely through field types.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Task::ReadFile {
                start_line,
                end_line,
                max_lines,
                ..
            } => {
                if *max_lines == 0 {
                    return Err("max_lines must be >= 1".to_string());
                }
                if let (Some(start), Some(end)) = (start_line, end_line) {
                    if *start < 1 {
                        return Err("start_line must be >= 1".to_string());
                    }
                    if end < start {
                        return Err("end_line must be >= start_line".to_string());
                    }
                }
                Ok(())
            }
            Task::RunShell { timeout_seconds, .. } => {
                if *timeout_seconds == 0 {
                    Err("timeout_seconds must be > 0".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}
