use serde::{Deserialize, Serialize};

/// The action a `LOOM_EDIT` directive performs, per §4.E's grammar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EditAction {
    Replace,
    InsertAfter,
    InsertBefore,
    Delete,
    SearchReplace,
    Create,
}

impl EditAction {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "REPLACE" => Some(Self::Replace),
            "INSERT_AFTER" => Some(Self::InsertAfter),
            "INSERT_BEFORE" => Some(Self::InsertBefore),
            "DELETE" => Some(Self::Delete),
            "SEARCH_REPLACE" => Some(Self::SearchReplace),
            "CREATE" => Some(Self::Create),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replace => "REPLACE",
            Self::InsertAfter => "INSERT_AFTER",
            Self::InsertBefore => "INSERT_BEFORE",
            Self::Delete => "DELETE",
            Self::SearchReplace => "SEARCH_REPLACE",
            Self::Create => "CREATE",
        }
    }

    /// Whether this action addresses the file by line range (as opposed to
    /// `SEARCH_REPLACE`'s find/replace pair or `CREATE`'s whole-body write).
    pub fn uses_line_range(&self) -> bool {
        !matches!(self, Self::SearchReplace | Self::Create)
    }
}

/// The output of the LOOM_EDIT parser (§4.E) and the input to the edit
/// applier (§4.F).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EditDirective {
    pub file: String,
    pub action: EditAction,
    /// 1-based inclusive start line; ignored for `SearchReplace`/`Create`.
    pub start: usize,
    /// 1-based inclusive end line; equal to `start` for single-line edits.
    pub end: usize,
    /// New body lines for REPLACE/INSERT_*/CREATE; the literal `find` string
    /// (as a single-element vec) for SEARCH_REPLACE is carried in
    /// `search_replace` instead.
    pub body: Vec<String>,
    /// Populated only for `SearchReplace`: `(find, replace)`.
    pub search_replace: Option<(String, String)>,
    /// Pinned expected SHA-256 of the newline-normalized pre-image.
    pub expected_sha: Option<String>,
    /// Whether `CREATE` may overwrite an existing file.
    pub overwrite: bool,
}

impl EditDirective {
    pub fn new(file: impl Into<String>, action: EditAction) -> Self {
        Self {
            file: file.into(),
            action,
            start: 1,
            end: 1,
            body: Vec::new(),
            search_replace: None,
            expected_sha: None,
            overwrite: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_as_str() {
        for action in [
            EditAction::Replace,
            EditAction::InsertAfter,
            EditAction::InsertBefore,
            EditAction::Delete,
            EditAction::SearchReplace,
            EditAction::Create,
        ] {
            assert_eq!(EditAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn action_parse_is_case_insensitive() {
        assert_eq!(EditAction::parse("replace"), Some(EditAction::Replace));
        assert_eq!(EditAction::parse("bogus"), None);
    }
}
