//! Turns free-form model output into structured `Task`s (§4.D) and parses
//! the `LOOM_EDIT` patch block format (§4.E).
//!
//! Four parsing levels are tried in order — LOOM_EDIT block, fenced JSON,
//! natural-language directive, bare JSON fallback — and the first level
//! that produces anything wins; see `dispatch::parse_tasks`.

mod dispatch;
mod json_extract;
mod loom_edit;
mod nl;

pub use dispatch::parse_tasks;
pub use json_extract::extract_json_object;
pub use loom_edit::{extract_loom_edit_blocks, render_loom_edit_block};
pub use nl::parse_directive_line;
