//! Shared test fixtures (§4.O): scripted/recording capability doubles and a
//! seeded temp workspace helper, so every crate's test module exercises the
//! same shapes instead of redefining its own ad hoc stand-ins.

use std::path::Path;
use std::sync::{Mutex, RwLock};

use loom_core::{ChatSession, EditDirective, LlmCapability, LlmRequest, LlmResponse, Result, Role, ValidatorOutcome};

/// An `LlmCapability` that replays a fixed script of responses, one per
/// call, in order. Panics (via the returned error) once the script is
/// exhausted rather than looping or stalling, so a test with the wrong
/// number of expected turns fails loudly.
pub struct FakeLlm {
    responses: Mutex<Vec<String>>,
    requests_seen: Mutex<Vec<LlmRequest>>,
}

impl FakeLlm {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).rev().collect()),
            requests_seen: Mutex::new(Vec::new()),
        }
    }

    /// The requests handed to `send`, in call order, for assertions about
    /// what the caller built (system prompt placement, message count, ...).
    pub fn requests_seen(&self) -> Vec<LlmRequest> {
        self.requests_seen.lock().unwrap().clone()
    }
}

impl LlmCapability for FakeLlm {
    fn send(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests_seen.lock().unwrap().push(request.clone());
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| anyhow::anyhow!("FakeLlm script exhausted"))?;
        Ok(LlmResponse { content })
    }
}

/// A `ChatSession` that records every appended message instead of routing it
/// anywhere, for asserting what actually reached the visible transcript.
#[derive(Default)]
pub struct RecordingChatSession {
    messages: RwLock<Vec<(Role, String)>>,
}

impl RecordingChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Role, String)> {
        self.messages.read().unwrap().clone()
    }
}

impl ChatSession for RecordingChatSession {
    fn append_message(&self, role: Role, content: &str) -> Result<()> {
        self.messages.write().unwrap().push((role, content.to_string()));
        Ok(())
    }
}

/// A `Validator` that always accepts, for exercising edit/task flows that
/// don't care about language-specific validation.
pub struct PassthroughValidator;

impl loom_core::Validator for PassthroughValidator {
    fn validate_edit(
        &self,
        _path: &str,
        _directive: &EditDirective,
        _pre_image: &str,
        _post_image: Option<&str>,
    ) -> Result<ValidatorOutcome> {
        Ok(ValidatorOutcome {
            is_valid: true,
            should_rollback: false,
            verification_text: "ok".to_string(),
            diagnostics: Vec::new(),
        })
    }
}

/// A `Validator` that always flags the edit for rollback, for exercising
/// the staged executor's undo path.
pub struct AlwaysRollbackValidator;

impl loom_core::Validator for AlwaysRollbackValidator {
    fn validate_edit(
        &self,
        _path: &str,
        _directive: &EditDirective,
        _pre_image: &str,
        _post_image: Option<&str>,
    ) -> Result<ValidatorOutcome> {
        Ok(ValidatorOutcome {
            is_valid: false,
            should_rollback: true,
            verification_text: "forced rollback".to_string(),
            diagnostics: vec!["always_rollback".to_string()],
        })
    }
}

/// Build a `tempfile::TempDir` seeded with `(relative_path, content)` pairs,
/// creating parent directories as needed.
pub fn temp_workspace(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create temp workspace");
    for (rel_path, content) in files {
        let full = dir.path().join(rel_path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&full, content).expect("write fixture file");
    }
    dir
}

/// Smoke-check that a freshly `ensure`d config round-trips on disk, mirroring
/// the teacher's `run_replay_smoke` shape: a one-call sanity check other
/// crates' integration tests can lean on instead of re-deriving it.
pub fn run_config_roundtrip_smoke(workspace: &Path) -> anyhow::Result<loom_core::AppConfig> {
    let config = loom_core::AppConfig::ensure(workspace)?;
    let reloaded = loom_core::AppConfig::load(workspace)?;
    anyhow::ensure!(
        config.caps.max_iterations == reloaded.caps.max_iterations,
        "config did not round-trip through disk"
    );
    Ok(reloaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_llm_replays_script_in_order() {
        let llm = FakeLlm::new(["first", "second"]);
        let request = LlmRequest {
            messages: Vec::new(),
            deadline: std::time::Duration::from_secs(1),
        };
        assert_eq!(llm.send(&request).unwrap().content, "first");
        assert_eq!(llm.send(&request).unwrap().content, "second");
        assert!(llm.send(&request).is_err());
    }

    #[test]
    fn recording_chat_session_captures_messages_in_order() {
        let chat = RecordingChatSession::new();
        chat.append_message(Role::User, "hi").unwrap();
        chat.append_message(Role::Assistant, "hello").unwrap();
        assert_eq!(
            chat.messages(),
            vec![
                (Role::User, "hi".to_string()),
                (Role::Assistant, "hello".to_string()),
            ]
        );
    }

    #[test]
    fn temp_workspace_seeds_nested_files() {
        let ws = temp_workspace(&[("src/a.rs", "fn main() {}"), ("README.md", "hi")]);
        assert_eq!(
            std::fs::read_to_string(ws.path().join("src/a.rs")).unwrap(),
            "fn main() {}"
        );
        assert_eq!(std::fs::read_to_string(ws.path().join("README.md")).unwrap(), "hi");
    }

    #[test]
    fn config_roundtrip_smoke_passes_on_a_fresh_workspace() {
        let ws = temp_workspace(&[]);
        let result = run_config_roundtrip_smoke(ws.path());
        assert!(result.is_ok(), "config roundtrip smoke failed: {:?}", result.err());
    }
}
