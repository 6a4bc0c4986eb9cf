//! Dispatches a single `Task` to its handler (§4.I): read, list, search,
//! shell, memory, and edit. Each handler returns a `TaskResponse` carrying
//! both a short `output` for the UI and the fuller `actual_content` fed
//! back into the orchestrator's scratch context.

use std::path::{Path, PathBuf};
use std::time::Duration;

use loom_core::{
    CapsConfig, EditAction, IndexClassifier, MemoryOperation, MemoryRecord, MemoryRecordInput,
    MemoryStore, PolicyConfig, Task, TaskResponse, Validator,
};
use loom_policy::SecretRedactor;

use crate::directive::directive_for_edit_task;
use crate::shell::ShellRunner;

pub struct TaskExecutor {
    workspace: PathBuf,
    caps: CapsConfig,
    policy: PolicyConfig,
    redactor: SecretRedactor,
    index: Box<dyn IndexClassifier + Send + Sync>,
    memory: Box<dyn MemoryStore + Send + Sync>,
    validator: Box<dyn Validator + Send + Sync>,
    shell: Box<dyn ShellRunner + Send + Sync>,
}

impl TaskExecutor {
    pub fn new(
        workspace: PathBuf,
        caps: CapsConfig,
        policy: PolicyConfig,
        index: Box<dyn IndexClassifier + Send + Sync>,
        memory: Box<dyn MemoryStore + Send + Sync>,
        validator: Box<dyn Validator + Send + Sync>,
        shell: Box<dyn ShellRunner + Send + Sync>,
    ) -> Self {
        let redactor = SecretRedactor::new(&policy);
        Self {
            workspace,
            caps,
            policy,
            redactor,
            index,
            memory,
            validator,
            shell,
        }
    }

    /// Whether `task` is destructive enough that the caller should gate it
    /// behind user approval before calling `execute`: a shell command
    /// matching one of `policy.denied_command_prefixes`, or an edit whose
    /// resolved directive is a `DELETE` (content removal the staged
    /// executor's undo can't reach, since this is the immediate path).
    pub fn requires_approval(&self, task: &Task) -> bool {
        match task {
            Task::RunShell { command, .. } => {
                let trimmed = command.trim_start().to_ascii_lowercase();
                self.policy
                    .denied_command_prefixes
                    .iter()
                    .any(|prefix| trimmed.starts_with(&prefix.to_ascii_lowercase()))
            }
            Task::EditFile { .. } => directive_for_edit_task(task)
                .map(|d| d.action == EditAction::Delete)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn execute(&self, task: Task) -> TaskResponse {
        match &task {
            Task::ReadFile { .. } => self.read_file(task),
            Task::ListDir { .. } => self.list_dir(task),
            Task::Search { .. } => self.search(task),
            Task::RunShell { .. } => self.run_shell(task),
            Task::Memory { .. } => self.memory(task),
            Task::EditFile { .. } => self.edit_file(task),
        }
    }

    fn read_file(&self, task: Task) -> TaskResponse {
        let Task::ReadFile {
            ref path,
            start_line,
            end_line,
            max_lines,
            show_line_numbers,
        } = task
        else {
            unreachable!()
        };

        let resolved = match loom_policy::secure_path(&self.workspace, path) {
            Ok(p) => p,
            Err(e) => return TaskResponse::err(task, e.guidance(), ""),
        };
        if !resolved.exists() {
            return TaskResponse::err(task.clone(), format!("'{path}' does not exist"), "");
        }
        if resolved.is_dir() {
            return TaskResponse::err(task.clone(), format!("'{path}' is a directory, not a file"), "");
        }

        let bytes = match std::fs::read(&resolved) {
            Ok(b) => b,
            Err(e) => return TaskResponse::err(task.clone(), e.to_string(), ""),
        };
        if bytes.len() as u64 > self.caps.max_file_size {
            return TaskResponse::err(
                task.clone(),
                format!(
                    "'{path}' is {} bytes, exceeding the {}-byte cap",
                    bytes.len(),
                    self.caps.max_file_size
                ),
                "",
            );
        }
        if bytes.iter().take(512).any(|b| *b == 0) {
            return TaskResponse::err(task.clone(), format!("'{path}' appears to be a binary file"), "");
        }

        let content = String::from_utf8_lossy(&bytes).to_string();
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();

        let window_max = max_lines.min(self.caps.max_lines_per_read).max(1);
        let start = start_line.unwrap_or(1).max(1);
        let requested_end = end_line.unwrap_or(total).min(total);
        let window_end = start.saturating_add(window_max).saturating_sub(1);
        let end = requested_end.min(window_end);

        let mut body = String::new();
        let mut shown = 0usize;
        for (i, line) in lines.iter().enumerate() {
            let n = i + 1;
            if n < start || n > end {
                continue;
            }
            if show_line_numbers {
                body.push_str(&format!("{n:4}\t{line}\n"));
            } else {
                body.push_str(line);
                body.push('\n');
            }
            shown += 1;
        }

        let remaining = total.saturating_sub(end);
        if remaining > 0 {
            body.push_str(&format!(
                "[FILE CONTINUES: {remaining} more lines remaining, re-read with a later start_line to see them]\n"
            ));
        }

        let redacted = self.redactor.redact(&body);
        let output = format!("Read {shown} lines from {path} ({total} total)");
        TaskResponse::ok(task, output, redacted)
    }

    fn list_dir(&self, task: Task) -> TaskResponse {
        let Task::ListDir { ref path, recursive } = task else {
            unreachable!()
        };

        let resolved = match loom_policy::secure_path(&self.workspace, path) {
            Ok(p) => p,
            Err(e) => return TaskResponse::err(task, e.guidance(), ""),
        };
        if !resolved.exists() || !resolved.is_dir() {
            return TaskResponse::err(task.clone(), format!("'{path}' is not a directory"), "");
        }

        let mut entries = Vec::new();
        let mut truncated = false;
        let mut char_budget = self.caps.max_listing_output_chars;
        self.walk_dir(
            &resolved,
            recursive,
            0,
            &mut entries,
            &mut char_budget,
            &mut truncated,
        );

        let mut body = entries.join("\n");
        if truncated {
            body.push_str("\n[LISTING TRUNCATED: output cap reached]");
        }
        let output = format!("Listed {} entries under {path}", entries.len());
        TaskResponse::ok(task, output, body)
    }

    fn walk_dir(
        &self,
        dir: &Path,
        recursive: bool,
        depth: usize,
        out: &mut Vec<String>,
        char_budget: &mut usize,
        truncated: &mut bool,
    ) {
        if *truncated || out.len() >= self.caps.max_directory_listing_files {
            *truncated = true;
            return;
        }
        if depth > self.caps.max_directory_listing_depth {
            *truncated = true;
            return;
        }
        let Ok(read) = std::fs::read_dir(dir) else {
            return;
        };
        let mut children: Vec<_> = read.filter_map(|e| e.ok()).collect();
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            if out.len() >= self.caps.max_directory_listing_files {
                *truncated = true;
                return;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let rel = entry
                .path()
                .strip_prefix(&self.workspace)
                .unwrap_or(&entry.path())
                .to_string_lossy()
                .to_string();
            if self.index.should_skip(&rel, is_dir) {
                continue;
            }
            let label = if is_dir { format!("{rel}/") } else { rel };
            if label.len() > *char_budget {
                *truncated = true;
                return;
            }
            *char_budget -= label.len();
            out.push(label);
            if recursive && is_dir {
                self.walk_dir(&entry.path(), recursive, depth + 1, out, char_budget, truncated);
            }
        }
    }

    fn search(&self, task: Task) -> TaskResponse {
        let Task::Search {
            ref query,
            ref path,
            ref options,
        } = task
        else {
            unreachable!()
        };

        let matches = match self.index.search(query, path, options) {
            Ok(m) => m,
            Err(e) => return TaskResponse::err(task.clone(), e.to_string(), ""),
        };

        let header = format!("Search \"{query}\" in {path}: {} match(es)", matches.len());
        let mut body = String::new();
        for m in matches.iter().take(50) {
            body.push_str(&format!("{}:{}: {}\n", m.path, m.line, m.text));
        }
        if matches.len() > 50 {
            body.push_str(&format!(
                "... {} more match(es) not shown; narrow the query or add a glob filter\n",
                matches.len() - 50
            ));
        }
        let redacted = self.redactor.redact(&body);
        TaskResponse::ok(task, header, redacted)
    }

    fn run_shell(&self, task: Task) -> TaskResponse {
        let Task::RunShell {
            ref command,
            timeout_seconds,
            ..
        } = task
        else {
            unreachable!()
        };

        if !self.policy.shell_enabled {
            return TaskResponse::err(
                task.clone(),
                "shell execution is disabled by policy".to_string(),
                format!("Command: {command}\nExitCode: -\nSTDOUT:\n\nSTDERR:\nshell disabled\n"),
            );
        }

        let result = self
            .shell
            .run(command, &self.workspace, Duration::from_secs(timeout_seconds));

        let (status, stdout, stderr, timed_out) = match &result {
            Ok(r) => (r.status, r.stdout.clone(), r.stderr.clone(), r.timed_out),
            Err(e) => (None, String::new(), e.to_string(), false),
        };

        let redacted_stdout = self.redactor.redact(&stdout);
        let redacted_stderr = self.redactor.redact(&stderr);
        let actual_content = format!(
            "Command: {command}\nExitCode: {}\nSTDOUT:\n{redacted_stdout}\nSTDERR:\n{redacted_stderr}\n",
            status.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
        );

        if timed_out {
            return TaskResponse::err(
                task.clone(),
                format!("command timed out after {timeout_seconds}s"),
                actual_content,
            );
        }
        match status {
            Some(0) => {
                let output = format!("`{command}` exited 0");
                TaskResponse::ok(task, output, actual_content)
            }
            Some(code) => TaskResponse::err(task.clone(), format!("`{command}` exited {code}"), actual_content),
            None => TaskResponse::err(task.clone(), "command failed to run".to_string(), actual_content),
        }
    }

    fn memory(&self, task: Task) -> TaskResponse {
        let Task::Memory {
            operation,
            ref id,
            ref content,
            ref tags,
            active,
            ref description,
        } = task
        else {
            unreachable!()
        };

        let input = MemoryRecordInput {
            content: content.clone(),
            tags: tags.clone(),
            active,
            description: description.clone(),
        };

        let result = match operation {
            MemoryOperation::Create => self.memory.create(input).map(|r| vec![r]),
            MemoryOperation::Update => self.memory.update(id, input).map(|r| vec![r]),
            MemoryOperation::Get => self.memory.get(id).map(|r| r.into_iter().collect()),
            MemoryOperation::Delete => self.memory.delete(id).map(|_| Vec::new()),
            MemoryOperation::List => self.memory.list(active.unwrap_or(false)),
        };

        let records = match result {
            Ok(r) => r,
            Err(e) => return TaskResponse::err(task.clone(), e.to_string(), ""),
        };

        if operation == MemoryOperation::Delete {
            let deleted = self.memory.get(id).ok().flatten().is_none();
            let output = format!("Deleted memory \"{id}\"");
            let not_found = format!("no memory record with id '{id}'");
            return if deleted {
                TaskResponse::ok(task, output, "")
            } else {
                TaskResponse::err(task, not_found, "")
            };
        }

        let all = self.memory.list(false).unwrap_or_default();
        let active_count = all.iter().filter(|r| r.active).count();
        let body = format_memory_records(&records);
        let output = format!(
            "{} ({} total / {} active)",
            task.describe(),
            all.len(),
            active_count
        );
        TaskResponse::ok(task, output, body)
    }

    fn edit_file(&self, task: Task) -> TaskResponse {
        let directive = match directive_for_edit_task(&task) {
            Ok(d) => d,
            Err(e) => return TaskResponse::err(task.clone(), e.guidance(), ""),
        };
        let label = if directive.action == EditAction::Create {
            "Created"
        } else {
            "Edited"
        };
        let actual_content = format!("{label} {}", directive.file);

        match loom_diff::apply_edit(&self.workspace, &directive, self.validator.as_ref()) {
            Ok(outcome) => TaskResponse::ok(task, outcome.summary.summary.clone(), actual_content)
                .with_edit_summary(outcome.summary)
                .with_verification_text(outcome.verification_text),
            Err(e) => TaskResponse::err(task.clone(), e.guidance(), ""),
        }
    }
}

fn format_memory_records(records: &[MemoryRecord]) -> String {
    let mut body = String::new();
    for r in records {
        body.push_str(&format!(
            "[{}] {} (tags: {}, active: {})\n",
            r.id,
            r.content,
            r.tags.join(","),
            r.active
        ));
    }
    body
}
