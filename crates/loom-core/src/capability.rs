use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::edit::EditDirective;
use crate::Result;

/// A single request sent to the LLM transport. `deadline` is relative to
/// the call, mirroring the teacher's `send(messages, deadline)` contract;
/// it is expressed as a `Duration` here rather than an absolute instant so
/// the trait stays free of a clock dependency.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<(crate::context::Role, String)>,
    pub deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
}

/// The LLM transport capability. Implementations own retries, streaming,
/// and API-key handling; this crate only needs a blocking round trip with a
/// deadline and a cancellation check performed by the caller between calls.
pub trait LlmCapability {
    fn send(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// The visible chat session the user actually reads. The orchestrator's
/// scratch context is never routed through this trait — only the initial
/// user query and the final synthesis are.
pub trait ChatSession {
    fn append_message(&self, role: crate::context::Role, content: &str) -> Result<()>;
}

/// Workspace indexing / gitignore matching, consumed as a path-classifier
/// capability (§6). `should_skip` answers "would a directory listing or
/// search normally omit this path".
pub trait IndexClassifier {
    fn should_skip(&self, rel_path: &str, is_dir: bool) -> bool;

    fn search(
        &self,
        query: &str,
        path: &str,
        options: &crate::task::SearchOptions,
    ) -> Result<Vec<SearchMatch>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// Outcome of a pre/post edit validation pass (§4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorOutcome {
    pub is_valid: bool,
    pub should_rollback: bool,
    pub verification_text: String,
    pub diagnostics: Vec<String>,
}

/// The per-language syntactic validator, consumed as a pre/post validate
/// capability. `pre_image` is the file content *before* the directive is
/// applied in both calls, so a post-edit validator can diff against the
/// baseline if it wants to.
pub trait Validator {
    fn validate_edit(
        &self,
        path: &str,
        directive: &EditDirective,
        pre_image: &str,
        post_image: Option<&str>,
    ) -> Result<ValidatorOutcome>;
}

/// The external key-addressed memory record store backing the `Memory`
/// task kind. `loom-memory` provides a default `SqliteMemoryStore`
/// implementation of this trait.
pub trait MemoryStore {
    fn create(&self, record: MemoryRecordInput) -> Result<MemoryRecord>;
    fn update(&self, id: &str, record: MemoryRecordInput) -> Result<MemoryRecord>;
    fn get(&self, id: &str) -> Result<Option<MemoryRecord>>;
    fn delete(&self, id: &str) -> Result<bool>;
    fn list(&self, active_only: bool) -> Result<Vec<MemoryRecord>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryRecordInput {
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub active: Option<bool>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub active: bool,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Where staged-edit backups live, supplied by an external "project paths"
/// capability (§6).
pub trait ProjectPaths {
    fn backups_dir(&self) -> std::path::PathBuf;
}
