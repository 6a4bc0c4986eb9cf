//! Task execution (§4.I) and staged batch commits (§4.J): turns a `Task`
//! into filesystem/shell effects, and turns an `ActionPlan` into an
//! all-or-nothing Stage -> Apply -> Undo cycle.

mod directive;
mod executor;
mod shell;
mod staged;

pub use directive::{directive_for_edit_task, looks_like_unified_diff};
pub use executor::TaskExecutor;
pub use shell::{PlatformShellRunner, ShellRunResult, ShellRunner};
pub use staged::StagedExecutor;
