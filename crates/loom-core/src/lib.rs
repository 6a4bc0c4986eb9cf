//! Shared data model and capability contracts for the loom edit engine.
//!
//! This crate has no filesystem or process side effects of its own; it only
//! defines the types that flow between the command parser, edit applier,
//! diff analyzer, task executor, and sequential orchestrator, plus the
//! capability traits those components borrow from their caller (LLM
//! transport, chat session, workspace index, validator, memory store).

mod capability;
mod config;
mod context;
mod edit;
mod response;
mod staged;
mod task;

pub use capability::{
    ChatSession, IndexClassifier, LlmCapability, LlmRequest, LlmResponse, MemoryRecord,
    MemoryRecordInput, MemoryStore, ProjectPaths, SearchMatch, Validator, ValidatorOutcome,
};
pub use config::{AppConfig, CapsConfig, IndexConfig, MemoryConfig, PolicyConfig};
pub use context::{ExplorationContext, Role, ScratchMessage};
pub use edit::{EditAction, EditDirective};
pub use response::{ChangeType, EditSummary, EditType, LineDiffEntry, TaskResponse};
pub use staged::{ActionPlan, ActionPlanExecution, PlanStatus, StagedEdit};
pub use task::{MemoryOperation, SearchOptions, Task};

use std::path::{Path, PathBuf};

pub type Result<T> = anyhow::Result<T>;

/// The per-workspace runtime directory (`<workspace>/.loom`), mirroring the
/// teacher's `deepseek_core::runtime_dir` convention.
pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".loom")
}
