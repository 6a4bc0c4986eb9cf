//! Edit application (§4.F) and line-level diff analysis (§4.G).

mod analyzer;
mod applier;

pub use analyzer::analyze;
pub use applier::{apply_edit, compute_post_image, content_sha256, ApplyOutcome};
