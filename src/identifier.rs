//! Project identity: the (import-path, source-override) pair every
//! dependency edge, lock entry, and cache key is keyed by.

use crate::version::Constraint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The canonical import-path prefix owned by one repository, e.g.
/// `example.com/foo/bar`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectRoot(pub String);

impl ProjectRoot {
    pub fn new(s: impl Into<String>) -> Self {
        ProjectRoot(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Is `import` this root, or a subpackage of it? Uses a slash-prefix
    /// test, not a raw string prefix (`example.com/foo/barbaz` is not a
    /// subpackage of `example.com/foo/bar`).
    pub fn contains_import(&self, import: &str) -> bool {
        import == self.0 || import.strip_prefix(&self.0).is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project identity: its import-path root, plus an optional source
/// override. Two identifiers are equal iff both fields match; two
/// identifiers with the same root but different (or absent) sources name
/// the same import path but may resolve to different repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectIdentifier {
    pub root: ProjectRoot,
    /// Overrides the deduced repository URL; does not change import
    /// identity.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

impl ProjectIdentifier {
    pub fn new(root: impl Into<String>) -> Self {
        ProjectIdentifier { root: ProjectRoot::new(root), source: None }
    }

    pub fn with_source(root: impl Into<String>, source: impl Into<String>) -> Self {
        ProjectIdentifier { root: ProjectRoot::new(root), source: Some(source.into()) }
    }

    /// The name the source coordinator normalizes gateways under: the
    /// source override if set, else the project root.
    pub fn normalized_source(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.root.0)
    }
}

impl PartialOrd for ProjectIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProjectIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.root.cmp(&other.root).then_with(|| self.source.cmp(&other.source))
    }
}

impl fmt::Display for ProjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(s) => write!(f, "{} ({s})", self.root),
            None => write!(f, "{}", self.root),
        }
    }
}

/// The right-hand side of every dependency edge: a constraint plus an
/// optional source override.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectProperties {
    pub constraint: Constraint,
    pub source: Option<String>,
}

impl ProjectProperties {
    pub fn new(constraint: Constraint) -> Self {
        ProjectProperties { constraint, source: None }
    }

    pub fn with_source(constraint: Constraint, source: impl Into<String>) -> Self {
        ProjectProperties { constraint, source: Some(source.into()) }
    }
}
