//! Change-summary store (§4.L): pulls a few free-form fields out of model
//! prose via anchored regexes and keeps a bounded history. Observational
//! only — nothing here feeds back into edit semantics.

use std::sync::OnceLock;

use regex::Regex;

const MAX_ENTRIES: usize = 50;

/// One extracted summary of a change the model described in prose.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeSummary {
    pub file: Option<String>,
    pub summary: Option<String>,
    pub rationale: Option<String>,
    pub impact: Option<String>,
    pub test_suggestion: Option<String>,
}

impl ChangeSummary {
    fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.rationale.is_none()
            && self.impact.is_none()
            && self.test_suggestion.is_none()
    }
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^summary:\s*(.+)$").expect("valid regex"))
}

fn rationale_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?ims)^rationale:\s*(.+?)(?:\n\s*\n|\n[a-z][a-z _-]*:|\z)").expect("valid regex"))
}

fn impact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^impact:\s*(.+)$").expect("valid regex"))
}

fn test_suggestion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^test[ _-]?suggestion:\s*(.+)$").expect("valid regex")
    })
}

/// Pull the four recognized fields out of `text`, anchored at line start so
/// prose mentioning the word "impact" mid-sentence isn't mistaken for the
/// field. Returns `None` when none of the fields are present.
pub fn extract_change_summary(file: Option<&str>, text: &str) -> Option<ChangeSummary> {
    let summary = ChangeSummary {
        file: file.map(str::to_string),
        summary: summary_re()
            .captures(text)
            .map(|c| c[1].trim().to_string()),
        rationale: rationale_re()
            .captures(text)
            .map(|c| c[1].trim().to_string()),
        impact: impact_re().captures(text).map(|c| c[1].trim().to_string()),
        test_suggestion: test_suggestion_re()
            .captures(text)
            .map(|c| c[1].trim().to_string()),
    };
    if summary.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// Bounded FIFO history of extracted change summaries, capped at
/// [`MAX_ENTRIES`]. Never influences edit semantics — strictly a
/// query/display aid for the UI layer.
#[derive(Debug, Default)]
pub struct ChangeSummaryStore {
    entries: Vec<ChangeSummary>,
}

impl ChangeSummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a summary from `text` and record it, dropping the oldest
    /// entry once the store is at capacity. No-op if nothing was extracted.
    pub fn record(&mut self, file: Option<&str>, text: &str) {
        let Some(summary) = extract_change_summary(file, text) else {
            return;
        };
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.remove(0);
        }
        self.entries.push(summary);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all(&self) -> &[ChangeSummary] {
        &self.entries
    }

    /// All summaries recorded against `file`, most recent last.
    pub fn for_file<'a>(&'a self, file: &'a str) -> Vec<&'a ChangeSummary> {
        self.entries
            .iter()
            .filter(|s| s.file.as_deref() == Some(file))
            .collect()
    }

    /// A compact, human-readable rendering of one entry for display.
    pub fn format_entry(summary: &ChangeSummary) -> String {
        let mut out = String::new();
        if let Some(ref file) = summary.file {
            out.push_str(&format!("[{file}] "));
        }
        out.push_str(summary.summary.as_deref().unwrap_or("(no summary)"));
        if let Some(ref rationale) = summary.rationale {
            out.push_str(&format!("\n  why: {rationale}"));
        }
        if let Some(ref impact) = summary.impact {
            out.push_str(&format!("\n  impact: {impact}"));
        }
        if let Some(ref test) = summary.test_suggestion {
            out.push_str(&format!("\n  test: {test}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_four_fields() {
        let text = "Summary: renamed the helper\nRationale: the old name collided with a stdlib trait\n\nImpact: callers in loom-tools\nTest-suggestion: add a regression test for the rename";
        let summary = extract_change_summary(Some("a.rs"), text).expect("summary");
        assert_eq!(summary.summary.as_deref(), Some("renamed the helper"));
        assert_eq!(
            summary.rationale.as_deref(),
            Some("the old name collided with a stdlib trait")
        );
        assert_eq!(summary.impact.as_deref(), Some("callers in loom-tools"));
        assert_eq!(
            summary.test_suggestion.as_deref(),
            Some("add a regression test for the rename")
        );
    }

    #[test]
    fn mid_sentence_mention_is_not_mistaken_for_a_field() {
        let text = "This change has a big impact on performance but no structured fields here.";
        assert!(extract_change_summary(Some("a.rs"), text).is_none());
    }

    #[test]
    fn store_is_bounded_and_drops_oldest() {
        let mut store = ChangeSummaryStore::new();
        for i in 0..60 {
            store.record(Some("a.rs"), &format!("Summary: change {i}"));
        }
        assert_eq!(store.len(), MAX_ENTRIES);
        assert_eq!(store.all()[0].summary.as_deref(), Some("change 10"));
        assert_eq!(
            store.all().last().unwrap().summary.as_deref(),
            Some("change 59")
        );
    }

    #[test]
    fn for_file_filters_by_file() {
        let mut store = ChangeSummaryStore::new();
        store.record(Some("a.rs"), "Summary: touched a");
        store.record(Some("b.rs"), "Summary: touched b");
        store.record(Some("a.rs"), "Summary: touched a again");
        let a_entries = store.for_file("a.rs");
        assert_eq!(a_entries.len(), 2);
    }

    #[test]
    fn record_without_fields_is_a_no_op() {
        let mut store = ChangeSummaryStore::new();
        store.record(Some("a.rs"), "just some chatter with no fields");
        assert!(store.is_empty());
    }
}
