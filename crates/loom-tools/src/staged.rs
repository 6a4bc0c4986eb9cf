//! Two-phase Stage -> Apply -> Undo batch commit for an `ActionPlan` (§4.J).
//!
//! Staging never mutates the workspace: every `EditFile` task is previewed
//! against its current on-disk content and backed up, but nothing is
//! written until `apply`. This mirrors the optimistic-concurrency posture
//! of the immediate edit applier (`loom_diff::apply_edit`'s SHA
//! precondition) at the granularity of a whole plan instead of one file.

use std::fs;
use std::path::{Path, PathBuf};

use loom_core::{ActionPlan, ActionPlanExecution, PlanStatus, ProjectPaths, StagedEdit, Task};
use loom_errors::ErrorKind;

use crate::directive::directive_for_edit_task;

pub struct StagedExecutor<'a> {
    workspace: PathBuf,
    project_paths: &'a dyn ProjectPaths,
}

impl<'a> StagedExecutor<'a> {
    pub fn new(workspace: PathBuf, project_paths: &'a dyn ProjectPaths) -> Self {
        Self {
            workspace,
            project_paths,
        }
    }

    /// Stage every `EditFile` task in `plan` for later commit. Rejects the
    /// whole plan if two `EditFile` tasks target the same path, or if any
    /// directive fails to resolve (malformed LOOM_EDIT, bad range, ...).
    pub fn stage(&self, plan: ActionPlan) -> Result<ActionPlanExecution, ErrorKind> {
        let mut seen_paths = std::collections::HashSet::new();
        for task in &plan.tasks {
            if let Task::EditFile { path, .. } = task {
                if !seen_paths.insert(path.clone()) {
                    return Err(ErrorKind::BadLoomEdit(format!(
                        "plan stages '{path}' more than once"
                    )));
                }
            }
        }

        let mut execution = ActionPlanExecution::new(plan);
        let backups_dir = self.project_paths.backups_dir();
        fs::create_dir_all(&backups_dir).map_err(|_| {
            ErrorKind::BadPath(backups_dir.display().to_string())
        })?;

        for task in &execution.plan.tasks {
            let Task::EditFile { path, .. } = task else {
                continue;
            };
            let directive = directive_for_edit_task(task)?;
            let resolved = loom_policy::secure_path(&self.workspace, path)?;

            let pre_image = if resolved.exists() {
                fs::read_to_string(&resolved).map_err(|_| ErrorKind::NotFound(path.clone()))?
            } else {
                String::new()
            };
            let original_hash = loom_diff::content_sha256(&pre_image);

            let new_content = if directive.action == loom_core::EditAction::Create {
                let mut body = directive.body.join("\n");
                if !directive.body.is_empty() {
                    body.push('\n');
                }
                body
            } else {
                loom_diff::compute_post_image(&pre_image, &directive)?
            };

            let diff_preview = loom_diff::analyze(path, &pre_image, &new_content).summary;

            let backup_path = if resolved.exists() {
                let backup = backup_path_for(&backups_dir, path);
                fs::write(&backup, &pre_image)
                    .map_err(|_| ErrorKind::BadPath(backup.display().to_string()))?;
                Some(backup)
            } else {
                None
            };

            execution.staged_edits.push(StagedEdit {
                file_path: path.clone(),
                original_hash,
                new_content,
                diff_preview,
                backup_path,
                task: task.clone(),
            });
        }

        execution.status = PlanStatus::Staged;
        Ok(execution)
    }

    /// Re-check every staged file's current hash, then write all staged
    /// content and run any queued `RunShell` tasks in declaration order.
    /// On the first write failure the caller must call `undo`; this
    /// function does not roll back partial writes itself.
    pub fn apply(
        &self,
        execution: &mut ActionPlanExecution,
        shell: &dyn crate::shell::ShellRunner,
    ) -> Result<(), ErrorKind> {
        if execution.status != PlanStatus::Staged {
            return Err(ErrorKind::ConcurrentMutation(
                "plan is not in a staged state".to_string(),
            ));
        }
        execution.status = PlanStatus::Applying;

        for staged in &execution.staged_edits {
            let resolved = loom_policy::secure_path(&self.workspace, &staged.file_path)?;
            let current = if resolved.exists() {
                fs::read_to_string(&resolved).unwrap_or_default()
            } else {
                String::new()
            };
            let current_hash = loom_diff::content_sha256(&current);
            if current_hash != staged.original_hash {
                execution.status = PlanStatus::Failed;
                return Err(ErrorKind::ConcurrentMutation(staged.file_path.clone()));
            }
        }

        for staged in &execution.staged_edits {
            let resolved = loom_policy::secure_path(&self.workspace, &staged.file_path)?;
            if let Some(parent) = resolved.parent() {
                fs::create_dir_all(parent)
                    .map_err(|_| ErrorKind::BadPath(resolved.display().to_string()))?;
            }
            fs::write(&resolved, &staged.new_content)
                .map_err(|_| ErrorKind::BadPath(resolved.display().to_string()))?;
        }

        for task in &execution.plan.tasks {
            if let Task::RunShell { command, timeout_seconds, .. } = task {
                shell
                    .run(command, &self.workspace, std::time::Duration::from_secs(*timeout_seconds))
                    .map_err(|e| ErrorKind::TransportFailure(e.to_string()))?;
            }
        }

        execution.status = PlanStatus::Completed;
        Ok(())
    }

    /// Restore every staged edit from its backup (or delete it, if it was
    /// a `CREATE`). Only a `completed` plan may be undone.
    pub fn undo(&self, execution: &mut ActionPlanExecution) -> Result<(), ErrorKind> {
        if !execution.is_undoable() {
            return Err(ErrorKind::ConcurrentMutation(
                "only a completed plan can be undone".to_string(),
            ));
        }

        for staged in &execution.staged_edits {
            let resolved = loom_policy::secure_path(&self.workspace, &staged.file_path)?;
            match &staged.backup_path {
                Some(backup) => {
                    let original = fs::read_to_string(backup)
                        .map_err(|_| ErrorKind::NotFound(staged.file_path.clone()))?;
                    fs::write(&resolved, original)
                        .map_err(|_| ErrorKind::BadPath(resolved.display().to_string()))?;
                }
                None => {
                    fs::remove_file(&resolved).ok();
                }
            }
        }

        execution.status = PlanStatus::Undone;
        Ok(())
    }

    /// Best-effort removal of every backup file staged for `execution`.
    pub fn cleanup(&self, execution: &ActionPlanExecution) {
        for staged in &execution.staged_edits {
            if let Some(backup) = &staged.backup_path {
                let _ = fs::remove_file(backup);
            }
        }
    }
}

fn backup_path_for(backups_dir: &Path, rel_path: &str) -> PathBuf {
    let sanitized = rel_path.replace(['/', '\\'], "_");
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    backups_dir.join(format!("{sanitized}_{stamp}.backup"))
}
