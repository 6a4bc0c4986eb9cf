//! Line-level diff analysis (§4.G): LCS-based change classification plus
//! Levenshtein/structural-similarity pairing so an indentation tweak or a
//! variable rename reads as *modified*, not as a delete-then-add.

use loom_core::{ChangeType, EditSummary, EditType, LineDiffEntry};

const SIMILARITY_THRESHOLD: f64 = 0.3;
const FULL_DETAIL_LIMIT: usize = 50;
const TRUNCATED_DETAIL_COUNT: usize = 25;
const CONTEXT_LINES: usize = 2;

enum Op {
    Equal(String),
    Delete(String),
    Insert(String),
}

struct Change {
    change_type: ChangeType,
    old: Option<String>,
    new: Option<String>,
}

/// Produce a structured, model- and human-readable summary of the
/// difference between `pre` and `post`.
pub fn analyze(file_path: &str, pre: &str, post: &str) -> EditSummary {
    if pre == post {
        return EditSummary {
            file_path: file_path.to_string(),
            edit_type: EditType::Modify,
            lines_before: count_lines(pre),
            lines_after: count_lines(post),
            lines_added: 0,
            lines_removed: 0,
            lines_modified: 0,
            chars_added: 0,
            chars_removed: 0,
            detailed_diff: Vec::new(),
            validation_summary: None,
            is_identical_content: true,
            was_successful: true,
            summary: "file already contains desired content".to_string(),
        };
    }

    let edit_type = if pre.is_empty() {
        EditType::Create
    } else if post.is_empty() {
        EditType::Delete
    } else {
        EditType::Modify
    };

    let pre_lines = split_lines(pre);
    let post_lines = split_lines(post);

    let ops = lcs_ops(&pre_lines, &post_lines);
    let changes = pair_and_classify(ops);

    let lines_added = changes
        .iter()
        .filter(|c| c.change_type == ChangeType::Added)
        .count();
    let lines_removed = changes
        .iter()
        .filter(|c| c.change_type == ChangeType::Removed)
        .count();
    let lines_modified = changes
        .iter()
        .filter(|c| c.change_type == ChangeType::Modified)
        .count();

    let (chars_added, chars_removed) = if post.len() >= pre.len() {
        (post.len() - pre.len(), 0)
    } else {
        (0, pre.len() - post.len())
    };

    let detailed_diff = build_detailed_diff(&changes);

    let summary = format!(
        "{} line(s) added, {} removed, {} modified",
        lines_added, lines_removed, lines_modified
    );

    EditSummary {
        file_path: file_path.to_string(),
        edit_type,
        lines_before: pre_lines.len(),
        lines_after: post_lines.len(),
        lines_added,
        lines_removed,
        lines_modified,
        chars_added,
        chars_removed,
        detailed_diff,
        validation_summary: None,
        is_identical_content: false,
        was_successful: true,
        summary,
    }
}

fn count_lines(content: &str) -> usize {
    split_lines(content).len()
}

/// Split into lines, stripping exactly one trailing empty line (the
/// artifact of a trailing `\n`) if present.
fn split_lines(content: &str) -> Vec<String> {
    if content.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

fn lcs_ops(a: &[String], b: &[String]) -> Vec<Op> {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let mut i = 0;
    let mut j = 0;
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Equal(a[i].clone()));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            ops.push(Op::Delete(a[i].clone()));
            i += 1;
        } else {
            ops.push(Op::Insert(b[j].clone()));
            j += 1;
        }
    }
    while i < n {
        ops.push(Op::Delete(a[i].clone()));
        i += 1;
    }
    while j < m {
        ops.push(Op::Insert(b[j].clone()));
        j += 1;
    }
    ops
}

/// Walk the LCS ops, and for every run of deletes/inserts between two
/// equal lines, greedily pair similar deleted/inserted lines as
/// `Modified` rather than leaving them as unrelated add/remove pairs.
fn pair_and_classify(ops: Vec<Op>) -> Vec<Change> {
    let mut changes = Vec::with_capacity(ops.len());
    let mut idx = 0;
    while idx < ops.len() {
        match &ops[idx] {
            Op::Equal(line) => {
                changes.push(Change {
                    change_type: ChangeType::Unchanged,
                    old: Some(line.clone()),
                    new: Some(line.clone()),
                });
                idx += 1;
            }
            _ => {
                let start = idx;
                while idx < ops.len() && !matches!(ops[idx], Op::Equal(_)) {
                    idx += 1;
                }
                classify_run(&ops[start..idx], &mut changes);
            }
        }
    }
    changes
}

fn classify_run(run: &[Op], changes: &mut Vec<Change>) {
    let deletes: Vec<&String> = run
        .iter()
        .filter_map(|o| match o {
            Op::Delete(s) => Some(s),
            _ => None,
        })
        .collect();
    let inserts: Vec<&String> = run
        .iter()
        .filter_map(|o| match o {
            Op::Insert(s) => Some(s),
            _ => None,
        })
        .collect();

    let mut used_insert = vec![false; inserts.len()];
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    for (di, d) in deletes.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        for (ii, ins) in inserts.iter().enumerate() {
            if used_insert[ii] {
                continue;
            }
            let sim = line_similarity(d, ins);
            if sim > SIMILARITY_THRESHOLD && best.is_none_or(|(_, b)| sim > b) {
                best = Some((ii, sim));
            }
        }
        if let Some((ii, _)) = best {
            used_insert[ii] = true;
            pairs.push((di, ii));
        }
    }

    let paired_deletes: std::collections::HashSet<usize> = pairs.iter().map(|(d, _)| *d).collect();
    let paired_inserts: std::collections::HashSet<usize> = pairs.iter().map(|(_, i)| *i).collect();

    for (di, ii) in &pairs {
        changes.push(Change {
            change_type: ChangeType::Modified,
            old: Some(deletes[*di].clone()),
            new: Some(inserts[*ii].clone()),
        });
    }
    for (di, d) in deletes.iter().enumerate() {
        if !paired_deletes.contains(&di) {
            changes.push(Change {
                change_type: ChangeType::Removed,
                old: Some((*d).clone()),
                new: None,
            });
        }
    }
    for (ii, insr) in inserts.iter().enumerate() {
        if !paired_inserts.contains(&ii) {
            changes.push(Change {
                change_type: ChangeType::Added,
                old: None,
                new: Some((*insr).clone()),
            });
        }
    }
}

/// `1 - normalized levenshtein` plus a structural bonus from shared
/// indentation width and shared bracket/punctuation tokens, capped at 1.0.
fn line_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.len().max(b.len()).max(1);
    let distance = strsim::levenshtein(a, b);
    let base = 1.0 - (distance as f64 / max_len as f64);

    let indent_bonus = indentation_bonus(a, b);
    let structural_bonus = structural_token_bonus(a, b);

    (base + indent_bonus + structural_bonus).min(1.0)
}

fn indentation_bonus(a: &str, b: &str) -> f64 {
    let wa = a.len() - a.trim_start().len();
    let wb = b.len() - b.trim_start().len();
    let delta = wa.abs_diff(wb);
    if delta == 0 {
        0.3
    } else if delta <= 2 {
        0.1
    } else {
        0.0
    }
}

fn structural_token_bonus(a: &str, b: &str) -> f64 {
    const TOKENS: &[char] = &['{', '}', '(', ')', '[', ']', '=', ';', ':', ','];
    let mut bonus = 0.0;
    for token in TOKENS {
        if a.contains(*token) && b.contains(*token) {
            bonus += 0.1;
        }
    }
    bonus.min(0.2)
}

fn build_detailed_diff(changes: &[Change]) -> Vec<LineDiffEntry> {
    let differing_indices: Vec<usize> = changes
        .iter()
        .enumerate()
        .filter(|(_, c)| c.change_type != ChangeType::Unchanged)
        .map(|(i, _)| i)
        .collect();

    let truncated = differing_indices.len() > FULL_DETAIL_LIMIT;
    let take_indices: Vec<usize> = if truncated {
        differing_indices
            .into_iter()
            .take(TRUNCATED_DETAIL_COUNT)
            .collect()
    } else {
        differing_indices
    };

    let mut entries: Vec<LineDiffEntry> = take_indices
        .iter()
        .map(|&i| {
            let context_start = i.saturating_sub(CONTEXT_LINES);
            let context = changes[context_start..i]
                .iter()
                .filter_map(|c| c.new.clone().or_else(|| c.old.clone()))
                .collect();
            LineDiffEntry {
                line_number: i + 1,
                change_type: changes[i].change_type,
                old: changes[i].old.clone(),
                new: changes[i].new.clone(),
                context,
            }
        })
        .collect();

    if truncated {
        let remaining = changes
            .iter()
            .filter(|c| c.change_type != ChangeType::Unchanged)
            .count()
            - TRUNCATED_DETAIL_COUNT;
        entries.push(LineDiffEntry {
            line_number: 0,
            change_type: ChangeType::Summary,
            old: None,
            new: Some(format!("... {remaining} more changed line(s) omitted ...")),
            context: Vec::new(),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_short_circuits() {
        let summary = analyze("a.rs", "fn main() {}\n", "fn main() {}\n");
        assert!(summary.is_identical_content);
        assert_eq!(summary.lines_modified, 0);
    }

    #[test]
    fn pure_addition_has_zero_modified_and_removed() {
        let pre = "func main() {\n\tfmt.Println(\"Hello\")\n}\n";
        let post = "func main() {\n\tfmt.Println(\"Hello\")\n\tfmt.Println(\"World\")\n}\n";
        let summary = analyze("main.go", pre, post);
        assert_eq!(summary.lines_added, 1);
        assert_eq!(summary.lines_removed, 0);
        assert_eq!(summary.lines_modified, 0);
    }

    #[test]
    fn pure_deletion_has_zero_modified_and_added() {
        let pre = "a\nb\nc\n";
        let post = "a\nc\n";
        let summary = analyze("f.txt", pre, post);
        assert_eq!(summary.lines_removed, 1);
        assert_eq!(summary.lines_added, 0);
        assert_eq!(summary.lines_modified, 0);
    }

    #[test]
    fn indentation_only_change_is_modified_not_add_and_remove() {
        let pre = "if x {\nfoo()\n}\n";
        let post = "if x {\n    foo()\n}\n";
        let summary = analyze("f.rs", pre, post);
        assert_eq!(summary.lines_modified, 1);
        assert_eq!(summary.lines_added, 0);
        assert_eq!(summary.lines_removed, 0);
    }

    #[test]
    fn variable_rename_across_three_lines_is_modified() {
        let pre = "func process(data []string) {\n\tuse(data)\n\titem := data[0]\n}\n";
        let post = "func process(items []string) {\n\tuse(items)\n\tentry := items[0]\n}\n";
        let summary = analyze("f.go", pre, post);
        assert_eq!(summary.lines_modified, 3);
        assert_eq!(summary.lines_added, 0);
        assert_eq!(summary.lines_removed, 0);
    }

    #[test]
    fn lines_before_and_after_match_input_line_counts() {
        let pre = "a\nb\nc\n";
        let post = "a\nb\n";
        let summary = analyze("f.txt", pre, post);
        assert_eq!(summary.lines_before, 3);
        assert_eq!(summary.lines_after, 2);
    }

    #[test]
    fn large_diff_is_truncated_with_marker() {
        let pre: String = (0..100).map(|i| format!("old-{i}\n")).collect();
        let post: String = (0..100).map(|i| format!("new-{i}\n")).collect();
        let summary = analyze("f.txt", &pre, &post);
        assert!(summary.detailed_diff.len() <= TRUNCATED_DETAIL_COUNT + 1);
        assert_eq!(
            summary.detailed_diff.last().unwrap().change_type,
            ChangeType::Summary
        );
    }
}
