use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::task::Task;

/// An ordered list of tasks the staged executor (§4.J) commits as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub title: String,
    pub description: String,
    pub tasks: Vec<Task>,
}

/// One staged edit within an in-flight `ActionPlanExecution`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedEdit {
    pub file_path: String,
    pub original_hash: String,
    pub new_content: String,
    pub diff_preview: String,
    /// Absent when the staged edit is a `CREATE` (nothing to back up).
    pub backup_path: Option<PathBuf>,
    pub task: Task,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Preparing,
    Staged,
    Applying,
    Completed,
    Failed,
    Undone,
}

/// The lifecycle object for a `Stage -> Apply -> Undo` batch (§4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlanExecution {
    pub plan: ActionPlan,
    pub staged_edits: Vec<StagedEdit>,
    pub status: PlanStatus,
}

impl ActionPlanExecution {
    pub fn new(plan: ActionPlan) -> Self {
        Self {
            plan,
            staged_edits: Vec::new(),
            status: PlanStatus::Preparing,
        }
    }

    pub fn is_undoable(&self) -> bool {
        self.status == PlanStatus::Completed
    }
}
