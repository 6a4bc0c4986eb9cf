//! Typed error kinds for the edit engine, plus a thin user-guidance layer.
//!
//! The engine returns `anyhow::Result<T>` at most call boundaries (see
//! `loom_core::Result`), but callers that need to branch on *why* an
//! operation failed — the orchestrator deciding whether to re-read a file,
//! the staged executor deciding whether to undo a plan — match on
//! `ErrorKind` instead of string-sniffing an `anyhow::Error`. This mirrors
//! the split in the teacher between `PolicyError` (a matchable enum) and
//! `EnhancedError` (a rendering layer on top of any error).

use thiserror::Error;

/// One variant per error kind named in §7 of the specification.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("path '{0}' escapes the workspace root")]
    BadPath(String),

    #[error("'{0}' does not exist")]
    NotFound(String),

    #[error("'{0}' is a directory, not a file")]
    IsDirectory(String),

    #[error("'{0}' appears to be a binary file")]
    BinaryFile(String),

    #[error("'{path}' is {size} bytes, exceeding the {limit}-byte cap")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("could not extract a task from the model's output")]
    ParseFailure,

    #[error("malformed LOOM_EDIT block: {0}")]
    BadLoomEdit(String),

    #[error("range {start}-{end} is out of bounds for a {line_count}-line file")]
    BadRange {
        start: usize,
        end: usize,
        line_count: usize,
    },

    #[error("'{path}' changed on disk (expected sha {expected}, found {actual}); re-read the file")]
    StaleFile {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("no occurrence of the search text was found in '{0}'")]
    NoMatch(String),

    #[error("'{0}' changed since it was staged; re-stage the plan")]
    ConcurrentMutation(String),

    #[error("edit to '{path}' was rolled back by the validator: {diagnostic}")]
    ValidationRollback { path: String, diagnostic: String },

    #[error("this action requires user approval: {0}")]
    NeedsApproval(String),

    #[error("shell execution is disabled by policy")]
    ShellDisabled,

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("the model transport failed: {0}")]
    TransportFailure(String),

    #[error("'{path}' already exists; pass overwrite to replace it")]
    AlreadyExists { path: String },
}

impl ErrorKind {
    /// A short, UI-facing title.
    pub fn title(&self) -> &'static str {
        match self {
            ErrorKind::BadPath(_) => "Invalid Path",
            ErrorKind::NotFound(_) => "Not Found",
            ErrorKind::IsDirectory(_) => "Is a Directory",
            ErrorKind::BinaryFile(_) => "Binary File",
            ErrorKind::TooLarge { .. } => "File Too Large",
            ErrorKind::ParseFailure => "No Task Parsed",
            ErrorKind::BadLoomEdit(_) => "Malformed Edit",
            ErrorKind::BadRange { .. } => "Invalid Range",
            ErrorKind::StaleFile { .. } => "Stale File",
            ErrorKind::NoMatch(_) => "No Match",
            ErrorKind::ConcurrentMutation(_) => "Concurrent Mutation",
            ErrorKind::ValidationRollback { .. } => "Validation Failed",
            ErrorKind::NeedsApproval(_) => "Needs Approval",
            ErrorKind::ShellDisabled => "Shell Disabled",
            ErrorKind::Timeout(_) => "Timed Out",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::TransportFailure(_) => "Transport Failure",
            ErrorKind::AlreadyExists { .. } => "Already Exists",
        }
    }

    /// Recovery suggestions shown alongside the message, mirroring
    /// `deepseek_errors::EnhancedError::with_suggestions`.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            ErrorKind::StaleFile { .. } | ErrorKind::ConcurrentMutation(_) => {
                vec!["Re-read the file to get its current contents".to_string()]
            }
            ErrorKind::BadRange { line_count, .. } => {
                vec![format!("The file has {line_count} lines; re-check the range")]
            }
            ErrorKind::NoMatch(_) => {
                vec!["Re-read the file and copy the exact text to search for".to_string()]
            }
            ErrorKind::ShellDisabled => {
                vec!["Enable `policy.shell_enabled` in the workspace config".to_string()]
            }
            ErrorKind::BadLoomEdit(_) => {
                vec!["Check the LOOM_EDIT header and delimiter lines are exact".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Render a full guidance block: title, message, suggestions.
    pub fn guidance(&self) -> String {
        let mut out = format!("{}: {}\n", self.title(), self);
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            out.push_str("Suggestions:\n");
            for (i, s) in suggestions.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", i + 1, s));
            }
        }
        out
    }

    /// Whether the orchestrator should treat this as fatal to the current
    /// iteration versus something it can surface to the model and continue
    /// past (§7 recovery policy).
    pub fn aborts_iteration(&self) -> bool {
        matches!(self, ErrorKind::TransportFailure(_) | ErrorKind::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_file_guidance_tells_model_to_reread() {
        let err = ErrorKind::StaleFile {
            path: "a.rs".into(),
            expected: "aaa".into(),
            actual: "bbb".into(),
        };
        let guidance = err.guidance();
        assert!(guidance.contains("Re-read"));
    }

    #[test]
    fn transport_failure_and_cancelled_abort_iteration() {
        assert!(ErrorKind::TransportFailure("boom".into()).aborts_iteration());
        assert!(ErrorKind::Cancelled.aborts_iteration());
        assert!(!ErrorKind::NoMatch("x".into()).aborts_iteration());
    }
}
