//! The sequential explore/act orchestrator (§4.K) and its observational
//! change-summary store (§4.L).

mod cancel;
mod orchestrator;
mod signals;
mod summary;

pub use cancel::CancellationToken;
pub use orchestrator::{OrchestratorOutcome, SequentialOrchestrator, MAX_ITERATIONS};
pub use signals::{is_complete_response, strip_completion_prefix};
pub use summary::{extract_change_summary, ChangeSummary, ChangeSummaryStore};
