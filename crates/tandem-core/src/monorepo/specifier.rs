//! Dependency specifier classification

use std::path::{Component, Path, PathBuf};

use semver::{Version, VersionReq};

/// Operator carried by a `workspace:` specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceRange {
    /// `workspace:*`, published as the exact version
    Any,
    /// `workspace:^`
    Caret,
    /// `workspace:~`
    Tilde,
    /// `workspace:<range>`, published as the range itself
    Range(String),
}

/// A classified dependency specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// `file:`, `link:` or bare relative path
    Directory(PathBuf),
    /// `workspace:` protocol
    Workspace(WorkspaceRange),
    /// A semver range
    Range(String),
    /// Anything else (dist tags, git urls, aliases)
    Other(String),
}

impl Specifier {
    /// Classify a raw specifier string
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        if let Some(rest) = raw.strip_prefix("workspace:") {
            return Self::Workspace(match rest {
                "*" | "" => WorkspaceRange::Any,
                "^" => WorkspaceRange::Caret,
                "~" => WorkspaceRange::Tilde,
                range => WorkspaceRange::Range(range.to_string()),
            });
        }

        if let Some(path) = raw
            .strip_prefix("file:")
            .or_else(|| raw.strip_prefix("link:"))
        {
            return Self::Directory(PathBuf::from(path));
        }

        if raw.starts_with("./") || raw.starts_with("../") || raw.starts_with('/') || raw == "." || raw == ".." {
            return Self::Directory(PathBuf::from(raw));
        }

        if parse_range(raw).is_some() {
            return Self::Range(raw.to_string());
        }

        Self::Other(raw.to_string())
    }
}

/// Whether `version` satisfies an npm-style range.
///
/// Handles `||` alternatives, whitespace separated comparators and
/// hyphen ranges on top of what `semver::VersionReq` accepts.
pub fn range_matches(range: &str, version: &Version) -> bool {
    parse_range(range)
        .map(|alternatives| alternatives.iter().any(|req| req.matches(version)))
        .unwrap_or(false)
}

fn parse_range(range: &str) -> Option<Vec<VersionReq>> {
    let range = range.trim();
    if range.is_empty() {
        return None;
    }
    range
        .split("||")
        .map(|alternative| VersionReq::parse(&normalize_comparators(alternative.trim())).ok())
        .collect()
}

fn normalize_comparators(set: &str) -> String {
    if set.is_empty() {
        return "*".to_string();
    }
    let tokens: Vec<&str> = set.split_whitespace().collect();

    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={}, <={}", low, high);
    }

    // Join operators separated from their version (">= 1.0.0")
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{}{}", op, token)),
            None => comparators.push(bare_comparator(token)),
        }
    }
    comparators.join(", ")
}

/// npm reads an operator-less version as exact (`1.0.0` is `=1.0.0`) and a
/// partial one as its whole minor or major (`1.2` is `~1.2`)
fn bare_comparator(token: &str) -> String {
    let token = token.trim_start_matches('v');
    let core = token.split(['-', '+']).next().unwrap_or(token);
    if !token.starts_with(|c: char| c.is_ascii_digit()) || core.contains(['*', 'x', 'X']) {
        return token.to_string();
    }
    if core.split('.').count() >= 3 {
        format!("={}", token)
    } else {
        format!("~{}", token)
    }
}

/// Lexically normalize a path, folding `.` and `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
