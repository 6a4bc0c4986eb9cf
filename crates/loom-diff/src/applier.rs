//! Applies a parsed `EditDirective` to a file on disk (§4.F): SHA-256
//! staleness precondition, line-addressed mutation, write-and-rename
//! persistence, pre/post validator hooks, and rollback on validator
//! rejection.

use std::fs;
use std::path::Path;

use loom_core::{EditAction, EditDirective, Validator};
use loom_errors::ErrorKind;
use sha2::{Digest, Sha256};

use crate::analyzer::analyze;
use loom_core::EditSummary;

/// The outcome of a successful `apply_edit` call.
pub struct ApplyOutcome {
    pub summary: EditSummary,
    pub verification_text: String,
}

/// Apply `directive` against the file it names, resolved relative to
/// `workspace`. `validator` is run both before and after the mutation;
/// a post-edit `should_rollback` restores the pre-image and fails the
/// call with `ValidationRollback`.
pub fn apply_edit(
    workspace: &Path,
    directive: &EditDirective,
    validator: &dyn Validator,
) -> Result<ApplyOutcome, ErrorKind> {
    let path = loom_policy::secure_path(workspace, &directive.file)?;

    if directive.action == EditAction::Create {
        return apply_create(&path, directive, validator);
    }

    if !path.exists() {
        return Err(ErrorKind::NotFound(directive.file.clone()));
    }
    if path.is_dir() {
        return Err(ErrorKind::IsDirectory(directive.file.clone()));
    }

    let raw = fs::read_to_string(&path).map_err(|_| ErrorKind::NotFound(directive.file.clone()))?;
    let pre_image = normalize_newlines(&raw);
    let pre_sha = sha256_hex(&pre_image);

    if let Some(expected) = &directive.expected_sha {
        if expected != &pre_sha {
            return Err(ErrorKind::StaleFile {
                path: directive.file.clone(),
                expected: expected.clone(),
                actual: pre_sha,
            });
        }
    }

    let _baseline = validator
        .validate_edit(&directive.file, directive, &pre_image, None)
        .ok();

    let post_image = compute_post_image(&pre_image, directive)?;

    write_atomic(&path, &post_image)?;

    let outcome = validator.validate_edit(&directive.file, directive, &pre_image, Some(&post_image));
    match outcome {
        Ok(result) if result.should_rollback => {
            write_atomic(&path, &pre_image).ok();
            return Err(ErrorKind::ValidationRollback {
                path: directive.file.clone(),
                diagnostic: result.verification_text,
            });
        }
        Ok(result) => {
            let summary = analyze(&directive.file, &pre_image, &post_image);
            Ok(ApplyOutcome {
                summary,
                verification_text: result.verification_text,
            })
        }
        Err(_) => {
            let summary = analyze(&directive.file, &pre_image, &post_image);
            Ok(ApplyOutcome {
                summary,
                verification_text: String::new(),
            })
        }
    }
}

fn apply_create(
    path: &Path,
    directive: &EditDirective,
    validator: &dyn Validator,
) -> Result<ApplyOutcome, ErrorKind> {
    if path.exists() && !directive.overwrite {
        return Err(ErrorKind::AlreadyExists {
            path: directive.file.clone(),
        });
    }
    let pre_image = if path.exists() {
        normalize_newlines(&fs::read_to_string(path).unwrap_or_default())
    } else {
        String::new()
    };
    let mut post_image = directive.body.join("\n");
    if !directive.body.is_empty() {
        post_image.push('\n');
    }

    write_atomic(path, &post_image)?;

    let outcome = validator.validate_edit(&directive.file, directive, &pre_image, Some(&post_image));
    match outcome {
        Ok(result) if result.should_rollback => {
            if pre_image.is_empty() {
                fs::remove_file(path).ok();
            } else {
                write_atomic(path, &pre_image).ok();
            }
            Err(ErrorKind::ValidationRollback {
                path: directive.file.clone(),
                diagnostic: result.verification_text,
            })
        }
        Ok(result) => {
            let summary = analyze(&directive.file, &pre_image, &post_image);
            Ok(ApplyOutcome {
                summary,
                verification_text: result.verification_text,
            })
        }
        Err(_) => {
            let summary = analyze(&directive.file, &pre_image, &post_image);
            Ok(ApplyOutcome {
                summary,
                verification_text: String::new(),
            })
        }
    }
}

/// Compute the post-image a directive would produce against `pre_image`,
/// without touching disk. Shared by `apply_edit` and the staged executor's
/// Stage phase, which needs a preview before anything is written.
pub fn compute_post_image(pre_image: &str, directive: &EditDirective) -> Result<String, ErrorKind> {
    let (lines, had_trailing_newline) = split_lines_preserve_trailing(pre_image);
    let line_count = lines.len();

    if directive.action == EditAction::SearchReplace {
        let (find, replace) = directive
            .search_replace
            .as_ref()
            .ok_or_else(|| ErrorKind::BadLoomEdit("missing search/replace pair".to_string()))?;
        if !pre_image.contains(find.as_str()) {
            return Err(ErrorKind::NoMatch(find.clone()));
        }
        return Ok(pre_image.replace(find.as_str(), replace));
    }

    validate_range(directive.action, directive.start, directive.end, line_count)?;
    let start = directive.start;
    let end = directive.end;

    let new_lines: Vec<String> = match directive.action {
        EditAction::Replace => concat_lines(&lines[..start - 1], &directive.body, &lines[end..]),
        EditAction::InsertAfter => concat_lines(&lines[..start], &directive.body, &lines[start..]),
        EditAction::InsertBefore => {
            concat_lines(&lines[..start - 1], &directive.body, &lines[start - 1..])
        }
        EditAction::Delete => concat_lines(&lines[..start - 1], &[], &lines[end..]),
        EditAction::SearchReplace | EditAction::Create => unreachable!(),
    };

    let trailing = if new_lines.is_empty() {
        false
    } else {
        had_trailing_newline
    };
    Ok(join_lines(&new_lines, trailing))
}

fn concat_lines(before: &[String], body: &[String], after: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(before.len() + body.len() + after.len());
    out.extend_from_slice(before);
    out.extend_from_slice(body);
    out.extend_from_slice(after);
    out
}

fn validate_range(
    action: EditAction,
    start: usize,
    end: usize,
    line_count: usize,
) -> Result<(), ErrorKind> {
    if start < 1 || end < start {
        return Err(ErrorKind::BadRange {
            start,
            end,
            line_count,
        });
    }
    let max_end = if matches!(action, EditAction::InsertAfter | EditAction::InsertBefore) {
        line_count + 1
    } else {
        line_count
    };
    if end > max_end {
        return Err(ErrorKind::BadRange {
            start,
            end,
            line_count,
        });
    }
    Ok(())
}

fn split_lines_preserve_trailing(content: &str) -> (Vec<String>, bool) {
    if content.is_empty() {
        return (Vec::new(), false);
    }
    let trailing = content.ends_with('\n');
    let body = if trailing {
        &content[..content.len() - 1]
    } else {
        content
    };
    (body.split('\n').map(str::to_string).collect(), trailing)
}

fn join_lines(lines: &[String], trailing: bool) -> String {
    let mut joined = lines.join("\n");
    if trailing {
        joined.push('\n');
    }
    joined
}

fn normalize_newlines(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn write_atomic(path: &Path, content: &str) -> Result<(), ErrorKind> {
    let parent = path.parent().ok_or_else(|| ErrorKind::BadPath(path.display().to_string()))?;
    fs::create_dir_all(parent).map_err(|_| ErrorKind::BadPath(path.display().to_string()))?;
    let tmp_path = parent.join(format!(
        ".{}.loom-tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("edit")
    ));
    fs::write(&tmp_path, content).map_err(|_| ErrorKind::BadPath(path.display().to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o644));
    }

    fs::rename(&tmp_path, path).map_err(|_| ErrorKind::BadPath(path.display().to_string()))?;
    Ok(())
}

/// Expose the SHA-256 of normalized content for callers that need a
/// pre-image hash without going through `apply_edit` (the staged executor
/// stages a hash before writing anything).
pub fn content_sha256(content: &str) -> String {
    sha256_hex(&normalize_newlines(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use loom_core::ValidatorOutcome;

    struct PassthroughValidator;
    impl Validator for PassthroughValidator {
        fn validate_edit(
            &self,
            _path: &str,
            _directive: &EditDirective,
            _pre_image: &str,
            _post_image: Option<&str>,
        ) -> loom_core::Result<ValidatorOutcome> {
            Ok(ValidatorOutcome {
                is_valid: true,
                should_rollback: false,
                verification_text: "ok".to_string(),
                diagnostics: Vec::new(),
            })
        }
    }

    struct RollbackValidator;
    impl Validator for RollbackValidator {
        fn validate_edit(
            &self,
            _path: &str,
            _directive: &EditDirective,
            _pre_image: &str,
            post_image: Option<&str>,
        ) -> loom_core::Result<ValidatorOutcome> {
            Ok(ValidatorOutcome {
                is_valid: post_image.is_none(),
                should_rollback: post_image.is_some(),
                verification_text: "syntax error".to_string(),
                diagnostics: vec!["syntax error".to_string()],
            })
        }
    }

    fn workspace_with(file: &str, content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join(file), content).expect("seed file");
        dir
    }

    #[test]
    fn s1_targeted_replace() {
        let ws = workspace_with("README.md", "# Loom\n\nThis is a test file.");
        let mut directive = EditDirective::new("README.md", EditAction::Replace);
        directive.start = 1;
        directive.end = 1;
        directive.body = vec!["# Spoon".to_string()];

        let outcome = apply_edit(ws.path(), &directive, &PassthroughValidator).expect("apply");
        let post = fs::read_to_string(ws.path().join("README.md")).unwrap();
        assert_eq!(post, "# Spoon\n\nThis is a test file.");
        assert!(!post.contains("- #"));
        assert!(!post.contains("+ #"));
        assert_eq!(outcome.summary.lines_modified, 1);
    }

    #[test]
    fn s2_search_replace_all_occurrences() {
        let content = "Loom Loom\nLoom\nLoom Loom\n";
        let ws = workspace_with("f.txt", content);
        let mut directive = EditDirective::new("f.txt", EditAction::SearchReplace);
        directive.search_replace = Some(("Loom".to_string(), "Spoon".to_string()));

        apply_edit(ws.path(), &directive, &PassthroughValidator).expect("apply");
        let post = fs::read_to_string(ws.path().join("f.txt")).unwrap();
        assert_eq!(post.matches("Loom").count(), 0);
        assert_eq!(post.matches("Spoon").count(), 5);
    }

    #[test]
    fn s3_stale_sha_fails_and_leaves_file_untouched() {
        let ws = workspace_with("f.txt", "original\n");
        let stale_sha = content_sha256("something else\n");
        let mut directive = EditDirective::new("f.txt", EditAction::Replace);
        directive.start = 1;
        directive.end = 1;
        directive.body = vec!["changed".to_string()];
        directive.expected_sha = Some(stale_sha);

        let err = apply_edit(ws.path(), &directive, &PassthroughValidator).unwrap_err();
        assert!(matches!(err, ErrorKind::StaleFile { .. }));
        let post = fs::read_to_string(ws.path().join("f.txt")).unwrap();
        assert_eq!(post, "original\n");
    }

    #[test]
    fn validator_rollback_restores_pre_image() {
        let ws = workspace_with("f.txt", "fn main() {}\n");
        let mut directive = EditDirective::new("f.txt", EditAction::Replace);
        directive.start = 1;
        directive.end = 1;
        directive.body = vec!["fn main( {}".to_string()];

        let err = apply_edit(ws.path(), &directive, &RollbackValidator).unwrap_err();
        assert!(matches!(err, ErrorKind::ValidationRollback { .. }));
        let post = fs::read_to_string(ws.path().join("f.txt")).unwrap();
        assert_eq!(post, "fn main() {}\n");
    }

    #[test]
    fn search_replace_with_no_match_fails() {
        let ws = workspace_with("f.txt", "hello\n");
        let mut directive = EditDirective::new("f.txt", EditAction::SearchReplace);
        directive.search_replace = Some(("absent".to_string(), "x".to_string()));

        let err = apply_edit(ws.path(), &directive, &PassthroughValidator).unwrap_err();
        assert!(matches!(err, ErrorKind::NoMatch(_)));
    }

    #[test]
    fn create_rejects_existing_file_without_overwrite() {
        let ws = workspace_with("f.txt", "already here\n");
        let mut directive = EditDirective::new("f.txt", EditAction::Create);
        directive.body = vec!["new content".to_string()];

        let err = apply_edit(ws.path(), &directive, &PassthroughValidator).unwrap_err();
        assert!(matches!(err, ErrorKind::AlreadyExists { .. }));
    }

    #[test]
    fn insert_after_then_delete_round_trips_to_original() {
        let ws = workspace_with("f.txt", "a\nb\nc\n");

        let mut insert = EditDirective::new("f.txt", EditAction::InsertAfter);
        insert.start = 1;
        insert.end = 1;
        insert.body = vec!["inserted".to_string()];
        apply_edit(ws.path(), &insert, &PassthroughValidator).expect("insert");
        let after_insert = fs::read_to_string(ws.path().join("f.txt")).unwrap();
        assert_eq!(after_insert, "a\ninserted\nb\nc\n");

        let mut delete = EditDirective::new("f.txt", EditAction::Delete);
        delete.start = 2;
        delete.end = 2;
        apply_edit(ws.path(), &delete, &PassthroughValidator).expect("delete");
        let restored = fs::read_to_string(ws.path().join("f.txt")).unwrap();
        assert_eq!(restored, "a\nb\nc\n");
    }

    #[test]
    fn bad_range_is_rejected() {
        let ws = workspace_with("f.txt", "a\nb\n");
        let mut directive = EditDirective::new("f.txt", EditAction::Replace);
        directive.start = 5;
        directive.end = 5;
        directive.body = vec!["x".to_string()];

        let err = apply_edit(ws.path(), &directive, &PassthroughValidator).unwrap_err();
        assert!(matches!(err, ErrorKind::BadRange { .. }));
    }
}
