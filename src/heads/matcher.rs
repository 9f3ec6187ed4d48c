//! Path matching for heads.
//!
//! # Responsibilities
//! - Normalize request and declared paths (leading slash, no trailing slash)
//! - Exact mode: full-regex match with `:name` captures
//! - Mount mode: prefix match on a segment boundary
//!
//! # Design Decisions
//! - Query strings never take part in matching
//! - `:name` compiles to a named group so captures bind by name, in
//!   declaration order, regardless of other groups in the pattern
//! - Regexes are compiled once, when the head is built

use regex::Regex;
use std::collections::HashMap;

use crate::error::{HydraError, HydraResult};

/// Ensure a leading slash and strip trailing slashes (except for the root).
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Rewrite `:name` segments into named groups.
///
/// Returns the regex source and the parameter names in declaration order.
/// A `:` inside a group opener (`(?:`, `(?i:`, `(?-x:`) is regex syntax and is kept.
fn compile_pattern(pattern: &str) -> (String, Vec<String>) {
    let mut source = String::with_capacity(pattern.len() + 16);
    let mut params = Vec::new();
    let mut chars = pattern.chars().peekable();
    let mut prev = None;
    let mut in_group_opener = false;

    while let Some(c) = chars.next() {
        let starts_param = c == ':'
            && !in_group_opener
            && chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_');
        if starts_param {
            let mut name = String::new();
            while let Some(&n) = chars.peek() {
                if n.is_ascii_alphanumeric() || n == '_' {
                    name.push(n);
                    chars.next();
                } else {
                    break;
                }
            }
            source.push_str(&format!("(?P<{name}>[^/]+)"));
            params.push(name);
            prev = Some('_');
        } else {
            in_group_opener = match c {
                '?' => prev == Some('('),
                c if in_group_opener => c.is_ascii_alphabetic() || c == '-',
                _ => false,
            };
            source.push(c);
            prev = Some(c);
        }
    }

    (source, params)
}

/// How a head decides whether a path belongs to it.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// Whole-path regex match.
    Exact {
        declared: String,
        regex: Regex,
        params: Vec<String>,
    },
    /// Prefix match on a segment boundary.
    Mount { mount_path: String },
}

impl PathMatcher {
    /// Compile an exact-mode pattern.
    pub fn exact(pattern: &str) -> HydraResult<Self> {
        let declared = normalize_path(pattern);
        let (source, params) = compile_pattern(&declared);
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            HydraError::InvalidConfiguration(format!("invalid path pattern '{pattern}': {e}"))
        })?;
        Ok(PathMatcher::Exact {
            declared,
            regex,
            params,
        })
    }

    pub fn mount(mount_path: &str) -> Self {
        PathMatcher::Mount {
            mount_path: normalize_path(mount_path),
        }
    }

    /// The normalized path or pattern as declared.
    pub fn declared(&self) -> &str {
        match self {
            PathMatcher::Exact { declared, .. } => declared,
            PathMatcher::Mount { mount_path } => mount_path,
        }
    }

    pub fn is_mount(&self) -> bool {
        matches!(self, PathMatcher::Mount { .. })
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> &[String] {
        match self {
            PathMatcher::Exact { params, .. } => params,
            PathMatcher::Mount { .. } => &[],
        }
    }

    /// Match a query-stripped request path.
    pub fn matches(&self, path: &str) -> bool {
        let path = normalize_path(path);
        match self {
            PathMatcher::Exact { regex, .. } => regex.is_match(&path),
            PathMatcher::Mount { mount_path } => mount_remainder(mount_path, &path).is_some(),
        }
    }

    /// Named captures for `path`. Empty for mount heads or on mismatch.
    pub fn captures(&self, path: &str) -> HashMap<String, String> {
        let PathMatcher::Exact { regex, params, .. } = self else {
            return HashMap::new();
        };
        let path = normalize_path(path);
        let Some(caps) = regex.captures(&path) else {
            return HashMap::new();
        };
        params
            .iter()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect()
    }

    /// Part of `path` after the mount point (`""` when the path is the
    /// mount point itself). Exact heads return the whole path.
    pub fn remainder(&self, path: &str) -> String {
        let path = normalize_path(path);
        match self {
            PathMatcher::Exact { .. } => path,
            PathMatcher::Mount { mount_path } => mount_remainder(mount_path, &path)
                .map(str::to_string)
                .unwrap_or_default(),
        }
    }
}

fn mount_remainder<'a>(mount_path: &str, path: &'a str) -> Option<&'a str> {
    if mount_path == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(mount_path)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}
