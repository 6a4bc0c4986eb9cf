//! Turns an `EditFile` task's content into the `EditDirective` the diff
//! engine understands (§4.I), shared by the immediate executor and the
//! staged executor so both resolve a task's edit the same way.

use loom_core::{EditAction, EditDirective, Task};
use loom_errors::ErrorKind;

/// Resolve the `EditDirective` an `EditFile` task names: a `LOOM_EDIT`
/// block when `loom_edit_command` is set, otherwise a whole-file `CREATE`
/// built from the task's literal content.
pub fn directive_for_edit_task(task: &Task) -> Result<EditDirective, ErrorKind> {
    let Task::EditFile {
        path,
        content,
        loom_edit_command,
    } = task
    else {
        return Err(ErrorKind::BadLoomEdit("not an EditFile task".to_string()));
    };

    if *loom_edit_command {
        let directives = loom_parser::extract_loom_edit_blocks(content)?;
        return directives
            .into_iter()
            .next()
            .ok_or_else(|| ErrorKind::BadLoomEdit("no LOOM_EDIT block found".to_string()));
    }

    if looks_like_unified_diff(content) {
        return Err(ErrorKind::BadLoomEdit(
            "this looks like a unified diff; use the LOOM_EDIT format instead".to_string(),
        ));
    }

    let mut directive = EditDirective::new(path.clone(), EditAction::Create);
    directive.body = content.lines().map(str::to_string).collect();
    Ok(directive)
}

/// Heuristic: a block where at least a fifth of its lines are `+`/`-`
/// prefixed is almost certainly a unified diff pasted in place of a real
/// `LOOM_EDIT` block or whole-file content.
pub fn looks_like_unified_diff(content: &str) -> bool {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 5 {
        return false;
    }
    let marked = lines
        .iter()
        .filter(|l| l.starts_with('-') || l.starts_with('+'))
        .count();
    marked as f64 / lines.len() as f64 >= 0.2
}
