//! The sequential orchestrator (§4.K): a bounded think -> act -> observe
//! loop around one `TaskExecutor`, mirroring the teacher's `ToolUseLoop`
//! but single-tool-per-turn rather than parallel tool calls, and driven by
//! the command-marker/LOOM_EDIT grammar instead of native function calling.

use loom_core::{ChatSession, ExplorationContext, LlmCapability, LlmRequest, Role, Task};
use loom_errors::ErrorKind;
use loom_tools::TaskExecutor;

use crate::cancel::CancellationToken;
use crate::signals::{is_complete_response, strip_completion_prefix};

/// Iteration cap from §5 (`max_iterations = 15`).
pub const MAX_ITERATIONS: usize = 15;

/// How one call to [`SequentialOrchestrator::handle_request`] ended.
#[derive(Debug, Clone)]
pub enum OrchestratorOutcome {
    /// The model emitted a commandless synthesis; its cleaned text.
    Completed { synthesis: String },
    /// `max_iterations` was reached without a completion signal.
    MaxIterationsReached,
    /// Cancelled before or during an iteration; the visible chat session
    /// was not touched.
    Cancelled,
}

/// Drives one user request through the explore/act loop. Owns the scratch
/// `ExplorationContext` and a cancellation token; borrows the LLM
/// transport, the visible chat session, and the task executor for the
/// lifetime of the call.
pub struct SequentialOrchestrator<'a> {
    llm: &'a dyn LlmCapability,
    chat: &'a dyn ChatSession,
    executor: &'a TaskExecutor,
    system_prompt: String,
    exploration_context: ExplorationContext,
    iteration: usize,
    max_iterations: usize,
    is_exploring: bool,
    objective: Option<String>,
    cancel: CancellationToken,
}

impl<'a> SequentialOrchestrator<'a> {
    pub fn new(
        llm: &'a dyn LlmCapability,
        chat: &'a dyn ChatSession,
        executor: &'a TaskExecutor,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            chat,
            executor,
            system_prompt: system_prompt.into(),
            exploration_context: ExplorationContext::new(),
            iteration: 0,
            max_iterations: MAX_ITERATIONS,
            is_exploring: false,
            objective: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// A cloned handle that can cancel this orchestrator's current or next
    /// run from another thread.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel whatever run is currently in flight.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn is_exploring(&self) -> bool {
        self.is_exploring
    }

    /// Run the explore/act loop for a new `objective`. A concurrent call on
    /// the same instance (from the caller's point of view: calling this
    /// again before a prior run observed its own cancellation) cancels the
    /// prior run by replacing its token before starting fresh.
    pub fn handle_request(&mut self, objective: &str) -> Result<OrchestratorOutcome, ErrorKind> {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.exploration_context.reset();
        self.iteration = 0;
        self.is_exploring = true;
        self.objective = Some(objective.to_string());
        self.exploration_context.push(Role::User, objective);

        let outcome = self.run_loop();
        self.is_exploring = false;
        outcome
    }

    fn run_loop(&mut self) -> Result<OrchestratorOutcome, ErrorKind> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(OrchestratorOutcome::Cancelled);
            }
            if self.iteration >= self.max_iterations {
                return Ok(OrchestratorOutcome::MaxIterationsReached);
            }
            self.iteration += 1;

            let request = self.build_request();
            let response = self
                .llm
                .send(&request)
                .map_err(|e| ErrorKind::TransportFailure(e.to_string()))?;

            if self.cancel.is_cancelled() {
                return Ok(OrchestratorOutcome::Cancelled);
            }

            if is_complete_response(&response.content) {
                let synthesis = strip_completion_prefix(&response.content).to_string();
                self.chat
                    .append_message(Role::Assistant, &synthesis)
                    .map_err(|e| ErrorKind::TransportFailure(e.to_string()))?;
                return Ok(OrchestratorOutcome::Completed { synthesis });
            }

            let tasks = match loom_parser::parse_tasks(&response.content) {
                Ok(tasks) => tasks,
                Err(_) => {
                    // A non-fatal parse failure: treat the turn as analysis
                    // and keep going (§7 recovery policy).
                    self.exploration_context
                        .push(Role::Assistant, response.content.clone());
                    continue;
                }
            };

            let Some(task) = tasks.into_iter().next() else {
                self.exploration_context
                    .push(Role::Assistant, response.content.clone());
                continue;
            };

            if self.executor.requires_approval(&task) {
                return Err(ErrorKind::NeedsApproval(task.describe()));
            }

            if let Some(commentary) = extract_commentary(&response.content, &task) {
                self.exploration_context.push(Role::Assistant, commentary);
            }

            let desc = task.describe();
            let result = self.executor.execute(task);
            let status = if result.success { "Success" } else { "Failed" };
            let task_result = format!(
                "TASK_RESULT: {desc}\nSTATUS: {status}\nCONTENT:\n{}\n",
                result.actual_content
            );
            self.exploration_context.push(Role::Assistant, task_result);
        }
    }

    fn build_request(&self) -> LlmRequest {
        let mut messages = vec![(Role::System, self.system_prompt.clone())];
        messages.extend(
            self.exploration_context
                .messages()
                .iter()
                .map(|m| (m.role, m.content.clone())),
        );
        LlmRequest {
            messages,
            deadline: std::time::Duration::from_secs(60),
        }
    }
}

/// Best-effort extraction of prose the model emitted alongside a task
/// directive, so it isn't lost when only the `TASK_RESULT` framing survives
/// into the scratch context. LOOM_EDIT bodies and JSON payloads consume the
/// whole response by construction, so those are left alone.
fn extract_commentary(response_text: &str, task: &Task) -> Option<String> {
    if matches!(
        task,
        Task::EditFile {
            loom_edit_command: true,
            ..
        }
    ) {
        return None;
    }
    let trimmed = response_text.trim_start();
    if trimmed.starts_with("```json") || trimmed.starts_with('{') {
        return None;
    }

    let mut commentary_lines = Vec::new();
    for line in response_text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match loom_parser::parse_tasks(line) {
            Ok(tasks) if !tasks.is_empty() => continue,
            _ => commentary_lines.push(line),
        }
    }
    if commentary_lines.is_empty() {
        None
    } else {
        Some(commentary_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::{CapsConfig, IndexClassifier, MemoryRecord, MemoryStore, MemoryRecordInput, PolicyConfig, SearchMatch, SearchOptions, Validator, ValidatorOutcome};
    use loom_tools::{PlatformShellRunner, TaskExecutor};
    use std::sync::{Mutex, RwLock};

    struct NullIndex;
    impl IndexClassifier for NullIndex {
        fn should_skip(&self, _rel_path: &str, _is_dir: bool) -> bool {
            false
        }
        fn search(&self, _q: &str, _p: &str, _o: &SearchOptions) -> loom_core::Result<Vec<SearchMatch>> {
            Ok(Vec::new())
        }
    }

    struct NullMemory;
    impl MemoryStore for NullMemory {
        fn create(&self, _record: MemoryRecordInput) -> loom_core::Result<MemoryRecord> {
            unimplemented!()
        }
        fn update(&self, _id: &str, _record: MemoryRecordInput) -> loom_core::Result<MemoryRecord> {
            unimplemented!()
        }
        fn get(&self, _id: &str) -> loom_core::Result<Option<MemoryRecord>> {
            Ok(None)
        }
        fn delete(&self, _id: &str) -> loom_core::Result<bool> {
            Ok(false)
        }
        fn list(&self, _active_only: bool) -> loom_core::Result<Vec<MemoryRecord>> {
            Ok(Vec::new())
        }
    }

    struct PassthroughValidator;
    impl Validator for PassthroughValidator {
        fn validate_edit(
            &self,
            _path: &str,
            _directive: &loom_core::EditDirective,
            _pre_image: &str,
            _post_image: Option<&str>,
        ) -> loom_core::Result<ValidatorOutcome> {
            Ok(ValidatorOutcome {
                is_valid: true,
                should_rollback: false,
                verification_text: "ok".to_string(),
                diagnostics: Vec::new(),
            })
        }
    }

    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
    }
    impl ScriptedLlm {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(str::to_string).collect()),
            }
        }
    }
    impl LlmCapability for ScriptedLlm {
        fn send(&self, _request: &LlmRequest) -> loom_core::Result<loom_core::LlmResponse> {
            let content = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no more scripted responses"))?;
            Ok(loom_core::LlmResponse { content })
        }
    }

    #[derive(Default)]
    struct RecordingChatSession {
        messages: RwLock<Vec<(Role, String)>>,
    }
    impl ChatSession for RecordingChatSession {
        fn append_message(&self, role: Role, content: &str) -> loom_core::Result<()> {
            self.messages.write().unwrap().push((role, content.to_string()));
            Ok(())
        }
    }

    fn executor(workspace: &std::path::Path) -> TaskExecutor {
        TaskExecutor::new(
            workspace.to_path_buf(),
            CapsConfig::default(),
            PolicyConfig::default(),
            Box::new(NullIndex),
            Box::new(NullMemory),
            Box::new(PassthroughValidator),
            Box::new(PlatformShellRunner),
        )
    }

    #[test]
    fn completes_on_commandless_synthesis() {
        let ws = tempfile::tempdir().unwrap();
        let exec = executor(ws.path());
        let llm = ScriptedLlm::new(vec![
            "TASK_COMPLETE: the project builds cleanly and all tests are green.",
        ]);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt");

        let outcome = orch.handle_request("check the build").unwrap();
        match outcome {
            OrchestratorOutcome::Completed { synthesis } => {
                assert_eq!(
                    synthesis,
                    "the project builds cleanly and all tests are green."
                );
            }
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(chat.messages.read().unwrap().len(), 1);
    }

    #[test]
    fn executes_a_task_then_completes() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("a.txt"), "hello\n").unwrap();
        let exec = executor(ws.path());
        let llm = ScriptedLlm::new(vec![
            "READ a.txt",
            "TASK_COMPLETE: read the file, it says hello.",
        ]);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt");

        let outcome = orch.handle_request("what's in a.txt?").unwrap();
        assert!(matches!(outcome, OrchestratorOutcome::Completed { .. }));
        assert_eq!(orch.iteration(), 2);
    }

    #[test]
    fn max_iterations_reached_stops_the_loop() {
        let ws = tempfile::tempdir().unwrap();
        let exec = executor(ws.path());
        let responses = vec!["LIST ."; 10];
        let llm = ScriptedLlm::new(responses);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt")
            .with_max_iterations(3);

        let outcome = orch.handle_request("keep listing").unwrap();
        assert!(matches!(outcome, OrchestratorOutcome::MaxIterationsReached));
        assert_eq!(orch.iteration(), 3);
    }

    #[test]
    fn parse_failure_is_non_fatal_and_keeps_going() {
        let ws = tempfile::tempdir().unwrap();
        let exec = executor(ws.path());
        let llm = ScriptedLlm::new(vec![
            "```json\nnot valid json\n```",
            "TASK_COMPLETE: recovered after a bad parse.",
        ]);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt");

        let outcome = orch.handle_request("try something weird").unwrap();
        assert!(matches!(outcome, OrchestratorOutcome::Completed { .. }));
    }

    #[test]
    fn cancellation_before_the_first_iteration_short_circuits() {
        let ws = tempfile::tempdir().unwrap();
        let exec = executor(ws.path());
        let llm = ScriptedLlm::new(vec!["TASK_COMPLETE: unreachable"]);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt");
        orch.stop();

        let outcome = orch.handle_request("go").unwrap();
        assert!(matches!(outcome, OrchestratorOutcome::Cancelled));
    }

    #[test]
    fn a_shell_command_needing_approval_fails_fast() {
        let ws = tempfile::tempdir().unwrap();
        let exec = executor(ws.path());
        let llm = ScriptedLlm::new(vec!["RUN rm -rf / --no-preserve-root"]);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt");

        let err = orch.handle_request("clean everything").unwrap_err();
        assert!(matches!(err, ErrorKind::NeedsApproval(_)));
    }

    #[test]
    fn commentary_alongside_a_directive_is_preserved() {
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(ws.path().join("a.txt"), "hi\n").unwrap();
        let exec = executor(ws.path());
        let llm = ScriptedLlm::new(vec![
            "Let me take a look at that file first.\nREAD a.txt",
            "TASK_COMPLETE: done looking.",
        ]);
        let chat = RecordingChatSession::default();
        let mut orch = SequentialOrchestrator::new(&llm, &chat, &exec, "system prompt");

        orch.handle_request("investigate").unwrap();
        let scratch: Vec<_> = orch
            .exploration_context
            .messages()
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert!(scratch
            .iter()
            .any(|m| m.contains("Let me take a look at that file first.")));
    }
}
