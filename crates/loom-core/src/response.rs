use serde::{Deserialize, Serialize};

use crate::task::Task;

/// The result of executing one `Task`, carrying two distinct payloads: a
/// short `output` meant for the UI, and `actual_content`, the full text fed
/// back into the orchestrator's hidden scratch context. Keeping them
/// separate means UI chrome never leaks into the model's view and vice
/// versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task: Task,
    pub success: bool,
    pub error: Option<String>,
    pub output: String,
    pub actual_content: String,
    pub edit_summary: Option<EditSummary>,
    pub verification_text: Option<String>,
}

impl TaskResponse {
    pub fn ok(task: Task, output: impl Into<String>, actual_content: impl Into<String>) -> Self {
        Self {
            task,
            success: true,
            error: None,
            output: output.into(),
            actual_content: actual_content.into(),
            edit_summary: None,
            verification_text: None,
        }
    }

    pub fn err(task: Task, error: impl Into<String>, actual_content: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            task,
            success: false,
            error: Some(error.clone()),
            output: error,
            actual_content: actual_content.into(),
            edit_summary: None,
            verification_text: None,
        }
    }

    pub fn with_edit_summary(mut self, summary: EditSummary) -> Self {
        self.edit_summary = Some(summary);
        self
    }

    pub fn with_verification_text(mut self, text: impl Into<String>) -> Self {
        self.verification_text = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditType {
    Create,
    Delete,
    Modify,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Unchanged,
    Summary,
}

/// One entry in an `EditSummary.detailed_diff`. `old`/`new` are `None` when
/// not applicable to the change type (e.g. `old` is absent for `Added`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDiffEntry {
    pub line_number: usize,
    pub change_type: ChangeType,
    pub old: Option<String>,
    pub new: Option<String>,
    pub context: Vec<String>,
}

/// The structured, model- and human-readable description of an applied
/// edit produced by the diff analyzer (§4.G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSummary {
    pub file_path: String,
    pub edit_type: EditType,
    pub lines_before: usize,
    pub lines_after: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub lines_modified: usize,
    pub chars_added: usize,
    pub chars_removed: usize,
    pub detailed_diff: Vec<LineDiffEntry>,
    pub validation_summary: Option<String>,
    pub is_identical_content: bool,
    pub was_successful: bool,
    pub summary: String,
}
