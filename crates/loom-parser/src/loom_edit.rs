//! Parse and render `LOOM_EDIT` blocks (§4.E).
//!
//! ```text
//! >>LOOM_EDIT file=<relpath> <ACTION> [<start>[-<end>]]
//! <body lines>
//! <<LOOM_EDIT
//! ```

use loom_core::{EditAction, EditDirective};
use loom_errors::ErrorKind;

const OPEN_DELIM: &str = ">>LOOM_EDIT";
const CLOSE_DELIM: &str = "<<LOOM_EDIT";

/// Find every `LOOM_EDIT` block in `text` and parse each into an
/// `EditDirective`, in source order. A block with a malformed header,
/// action, or range is a hard parse error — unlike the natural-language
/// path, a LOOM_EDIT block is an unambiguous signal of editing intent, so
/// we never silently skip it.
pub fn extract_loom_edit_blocks(text: &str) -> Result<Vec<EditDirective>, ErrorKind> {
    let mut directives = Vec::new();
    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim_start();
        if trimmed.starts_with(OPEN_DELIM) && lines[i] != trimmed {
            // delimiter must be at column 0 per the wire format
            return Err(ErrorKind::BadLoomEdit(
                "LOOM_EDIT open delimiter must be at column 0".to_string(),
            ));
        }
        if lines[i].starts_with(OPEN_DELIM) {
            let header_line = lines[i];
            let mut j = i + 1;
            let mut body = Vec::new();
            let mut closed = false;
            while j < lines.len() {
                if lines[j] == CLOSE_DELIM {
                    closed = true;
                    break;
                }
                body.push(lines[j]);
                j += 1;
            }
            if !closed {
                return Err(ErrorKind::BadLoomEdit(
                    "missing <<LOOM_EDIT closing delimiter".to_string(),
                ));
            }
            let directive = parse_block(header_line, &body)?;
            directives.push(directive);
            i = j + 1;
        } else {
            i += 1;
        }
    }
    Ok(directives)
}

fn parse_block(header_line: &str, body: &[&str]) -> Result<EditDirective, ErrorKind> {
    let tokens = tokenize_header(header_line)?;
    // tokens[0] is the ">>LOOM_EDIT" literal.
    let mut idx = 1;
    let mut file: Option<String> = None;
    let mut expected_sha: Option<String> = None;
    let mut overwrite = false;

    while idx < tokens.len() {
        if let Some((key, value)) = tokens[idx].split_once('=') {
            match key {
                "file" => file = Some(value.to_string()),
                "sha" => expected_sha = Some(value.to_string()),
                "overwrite" => overwrite = value.eq_ignore_ascii_case("true"),
                _ => {
                    return Err(ErrorKind::BadLoomEdit(format!(
                        "unrecognized attribute '{key}'"
                    )));
                }
            }
            idx += 1;
        } else {
            break;
        }
    }

    let file = file.ok_or_else(|| {
        ErrorKind::BadLoomEdit("missing required 'file=' attribute".to_string())
    })?;

    let action_token = tokens
        .get(idx)
        .ok_or_else(|| ErrorKind::BadLoomEdit("missing action".to_string()))?;
    let action = EditAction::parse(action_token)
        .ok_or_else(|| ErrorKind::BadLoomEdit(format!("unknown action '{action_token}'")))?;
    idx += 1;

    let mut directive = EditDirective::new(file, action);
    directive.expected_sha = expected_sha;
    directive.overwrite = overwrite;

    match action {
        EditAction::SearchReplace => {
            let remaining = &tokens[idx..];
            if remaining.len() != 2 {
                return Err(ErrorKind::BadLoomEdit(
                    "SEARCH_REPLACE requires exactly two quoted arguments".to_string(),
                ));
            }
            let find = unquote(&remaining[0])?;
            let replace = unquote(&remaining[1])?;
            directive.search_replace = Some((find, replace));
        }
        EditAction::Create => {
            directive.start = 1;
            directive.end = 1;
            directive.body = normalize_body(body);
        }
        EditAction::Delete => {
            let (start, end) = parse_range(&tokens[idx..])?;
            directive.start = start;
            directive.end = end;
            if !body.iter().all(|l| l.trim().is_empty()) {
                return Err(ErrorKind::BadLoomEdit(
                    "DELETE requires an empty body".to_string(),
                ));
            }
        }
        EditAction::Replace | EditAction::InsertAfter | EditAction::InsertBefore => {
            let (start, end) = parse_range(&tokens[idx..])?;
            directive.start = start;
            directive.end = end;
            directive.body = normalize_body(body);
        }
    }

    Ok(directive)
}

fn parse_range(tokens: &[String]) -> Result<(usize, usize), ErrorKind> {
    let token = tokens
        .first()
        .ok_or_else(|| ErrorKind::BadLoomEdit("missing line range".to_string()))?;
    match token.split_once('-') {
        Some((a, b)) => {
            let start: usize = a
                .parse()
                .map_err(|_| ErrorKind::BadLoomEdit(format!("bad range '{token}'")))?;
            let end: usize = b
                .parse()
                .map_err(|_| ErrorKind::BadLoomEdit(format!("bad range '{token}'")))?;
            if end < start {
                return Err(ErrorKind::BadLoomEdit(format!(
                    "range end {end} precedes start {start}"
                )));
            }
            Ok((start, end))
        }
        None => {
            let n: usize = token
                .parse()
                .map_err(|_| ErrorKind::BadLoomEdit(format!("bad range '{token}'")))?;
            Ok((n, n))
        }
    }
}

fn normalize_body(body: &[&str]) -> Vec<String> {
    body.iter().map(|l| l.replace('\r', "")).collect()
}

fn unquote(token: &str) -> Result<String, ErrorKind> {
    let inner = token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| ErrorKind::BadLoomEdit(format!("expected a quoted argument, got '{token}'")))?;
    Ok(inner.to_string())
}

/// Split a header line into whitespace-separated tokens, treating a
/// `"..."` run as a single token even if it contains spaces.
fn tokenize_header(line: &str) -> Result<Vec<String>, ErrorKind> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(ErrorKind::BadLoomEdit(
            "unterminated quoted argument in header".to_string(),
        ));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Render a directive back to wire format, the inverse of `parse_block`,
/// used by the round-trip law in the test scenarios.
pub fn render_loom_edit_block(directive: &EditDirective) -> String {
    let mut header = format!("{OPEN_DELIM} file={}", directive.file);
    if let Some(sha) = &directive.expected_sha {
        header.push_str(&format!(" sha={sha}"));
    }
    header.push(' ');
    header.push_str(directive.action.as_str());

    let mut out = String::new();
    match directive.action {
        EditAction::SearchReplace => {
            let (find, replace) = directive.search_replace.as_ref().expect("search_replace");
            header.push_str(&format!(" \"{find}\" \"{replace}\""));
            out.push_str(&header);
            out.push('\n');
        }
        EditAction::Create => {
            out.push_str(&header);
            out.push('\n');
            for line in &directive.body {
                out.push_str(line);
                out.push('\n');
            }
        }
        EditAction::Delete => {
            if directive.start == directive.end {
                header.push_str(&format!(" {}", directive.start));
            } else {
                header.push_str(&format!(" {}-{}", directive.start, directive.end));
            }
            out.push_str(&header);
            out.push('\n');
        }
        EditAction::Replace | EditAction::InsertAfter | EditAction::InsertBefore => {
            if directive.start == directive.end {
                header.push_str(&format!(" {}", directive.start));
            } else {
                header.push_str(&format!(" {}-{}", directive.start, directive.end));
            }
            out.push_str(&header);
            out.push('\n');
            for line in &directive.body {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out.push_str(CLOSE_DELIM);
    out.push('\n');
    out
}
