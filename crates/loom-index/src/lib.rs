//! Default `IndexClassifier` implementation (§6): a gitignore-respecting
//! walk plus a `grep`-style line scanner, grounded on the teacher's
//! `ignore::WalkBuilder` usage in `deepseek-index` but without pulling in
//! a search-engine dependency — this crate's "index" is the filesystem
//! itself, consulted fresh on every call.

use std::fs;
use std::path::Path;

use glob::Pattern;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use loom_core::{IndexClassifier, Result, SearchMatch, SearchOptions};
use regex::RegexBuilder;

/// Directories skipped unconditionally, regardless of `.gitignore`
/// contents — mirrors the hard skip list in §4.I's `ListDir` contract.
const HARD_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    ".vscode",
    ".idea",
    "target",
    "dist",
    "__pycache__",
    ".next",
    ".nuxt",
    "build",
    "out",
];

pub struct WalkIndex {
    workspace: std::path::PathBuf,
    gitignore: Gitignore,
}

impl WalkIndex {
    pub fn new(workspace: &Path) -> Self {
        let mut builder = GitignoreBuilder::new(workspace);
        builder.add(workspace.join(".gitignore"));
        let gitignore = builder.build().unwrap_or_else(|_| Gitignore::empty());
        Self {
            workspace: workspace.to_path_buf(),
            gitignore,
        }
    }

    fn walker(&self, root: &Path) -> ignore::Walk {
        let mut builder = WalkBuilder::new(root);
        builder.hidden(false);
        builder.follow_links(false);
        builder.git_ignore(true);
        builder.git_global(true);
        builder.git_exclude(true);
        builder.require_git(false);
        builder.filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !HARD_SKIP_DIRS.contains(&name))
                .unwrap_or(true)
        });
        builder.build()
    }
}

impl IndexClassifier for WalkIndex {
    fn should_skip(&self, rel_path: &str, is_dir: bool) -> bool {
        if Path::new(rel_path)
            .components()
            .any(|c| matches!(c.as_os_str().to_str(), Some(name) if HARD_SKIP_DIRS.contains(&name)))
        {
            return true;
        }
        self.gitignore
            .matched(self.workspace.join(rel_path), is_dir)
            .is_ignore()
    }

    fn search(&self, query: &str, path: &str, options: &SearchOptions) -> Result<Vec<SearchMatch>> {
        let root = loom_policy::secure_path(&self.workspace, path)?;
        let pattern = build_pattern(query, options)?;
        let mut matches = Vec::new();

        for entry in self.walker(&root) {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.workspace)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();

            if self.should_skip(&rel, false) {
                continue;
            }
            if !passes_type_filter(&rel, options) {
                continue;
            }
            if !passes_glob_filter(&rel, options) {
                continue;
            }

            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            for (line_no, line) in content.lines().enumerate() {
                if pattern.is_match(line) {
                    matches.push(SearchMatch {
                        path: rel.clone(),
                        line: line_no + 1,
                        text: line.to_string(),
                    });
                    if let Some(max) = options.max_results {
                        if matches.len() >= max {
                            return Ok(matches);
                        }
                    }
                }
            }
        }

        Ok(matches)
    }
}

fn build_pattern(query: &str, options: &SearchOptions) -> Result<regex::Regex> {
    let escaped = if options.fixed_string {
        regex::escape(query)
    } else {
        query.to_string()
    };
    let body = if options.whole_word {
        format!(r"\b{escaped}\b")
    } else {
        escaped
    };
    RegexBuilder::new(&body)
        .case_insensitive(options.case_insensitive)
        .build()
        .map_err(|e| anyhow::anyhow!("invalid search pattern: {e}"))
}

fn passes_type_filter(rel_path: &str, options: &SearchOptions) -> bool {
    let ext = Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    if !options.file_type_include.is_empty() && !options.file_type_include.iter().any(|t| t == ext)
    {
        return false;
    }
    if options.file_type_exclude.iter().any(|t| t == ext) {
        return false;
    }
    true
}

fn passes_glob_filter(rel_path: &str, options: &SearchOptions) -> bool {
    if !options.glob_include.is_empty()
        && !options
            .glob_include
            .iter()
            .any(|g| Pattern::new(g).map(|p| p.matches(rel_path)).unwrap_or(false))
    {
        return false;
    }
    if options
        .glob_exclude
        .iter()
        .any(|g| Pattern::new(g).map(|p| p.matches(rel_path)).unwrap_or(false))
    {
        return false;
    }
    true
}
