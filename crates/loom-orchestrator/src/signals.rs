//! Completion-signal detection (§4.K step 4): a response is "complete" when
//! it carries none of the command markers and looks like prose rather than
//! a one-line acknowledgement.

const COMMAND_MARKERS: &[&str] = &["READ ", "LIST ", "SEARCH ", "RUN ", "MEMORY ", ">>LOOM_EDIT"];

const COMPLETION_PREFIXES: &[&str] = &[
    "EXPLORATION_COMPLETE:",
    "ANALYSIS_COMPLETE:",
    "TASK_COMPLETE:",
    "OBJECTIVE_COMPLETE:",
    "exploration_complete:",
    "analysis_complete:",
    "task_complete:",
    "objective_complete:",
];

const COMPLETION_MIN_CHARS: usize = 80;

/// Strip the emoji/bullet decoration the model sometimes prefixes a
/// directive line with, mirroring the command parser's own leniency so
/// `"\u{1F4C4} READ a.rs"` is still recognized as a command line.
fn strip_decoration(line: &str) -> &str {
    line.trim_start_matches(|c: char| {
        c.is_whitespace() || (!c.is_ascii() && !c.is_alphanumeric()) || matches!(c, '-' | '*' | '>')
    })
}

fn line_starts_command(line: &str) -> bool {
    let stripped = strip_decoration(line);
    if stripped.starts_with(">>LOOM_EDIT") {
        return true;
    }
    let upper = stripped.to_ascii_uppercase();
    COMMAND_MARKERS
        .iter()
        .any(|marker| *marker != ">>LOOM_EDIT" && upper.starts_with(marker))
}

/// A response is complete iff none of its lines open with a command marker
/// and the text is long enough (or multi-line enough) to be a synthesis
/// rather than a stray short acknowledgement.
pub fn is_complete_response(text: &str) -> bool {
    if text.lines().any(line_starts_command) {
        return false;
    }
    text.chars().count() > COMPLETION_MIN_CHARS || text.contains('\n')
}

/// Strip a leading completion-signal prefix (`TASK_COMPLETE:` and friends),
/// returning the cleaned synthesis text.
pub fn strip_completion_prefix(text: &str) -> &str {
    let trimmed = text.trim_start();
    for prefix in COMPLETION_PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_command_line_is_not_complete() {
        assert!(!is_complete_response("READ src/main.rs"));
    }

    #[test]
    fn emoji_prefixed_command_is_not_complete() {
        assert!(!is_complete_response("\u{1F4C4} READ src/main.rs"));
    }

    #[test]
    fn loom_edit_block_is_not_complete() {
        let text = ">>LOOM_EDIT file=a.rs REPLACE 1-1\nhi\n<<LOOM_EDIT";
        assert!(!is_complete_response(text));
    }

    #[test]
    fn short_commandless_text_is_not_complete() {
        assert!(!is_complete_response("Looking now."));
    }

    #[test]
    fn long_commandless_text_is_complete() {
        let text = "a".repeat(81);
        assert!(is_complete_response(&text));
    }

    #[test]
    fn multiline_commandless_text_is_complete() {
        assert!(is_complete_response("Done.\nEverything checks out."));
    }

    #[test]
    fn strips_known_prefix() {
        assert_eq!(
            strip_completion_prefix("TASK_COMPLETE: all done"),
            "all done"
        );
        assert_eq!(
            strip_completion_prefix("task_complete: all done"),
            "all done"
        );
    }

    #[test]
    fn leaves_text_without_a_prefix_untouched() {
        assert_eq!(strip_completion_prefix("all done"), "all done");
    }
}
