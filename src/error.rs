//! Top-level, user-visible structured failures.
//!
//! Per-module errors (manifest parsing, lock parsing, analyzer, deduction,
//! gateway I/O) each get their own `thiserror` enum close to the code that
//! raises them. This module only holds the top-level `SolveError` that wraps
//! them for a caller, plus `ProblemImportError`, the causal-chain renderer
//! for poisoned packages.

use crate::identifier::ProjectRoot;
use crate::version::Constraint;
use thiserror::Error;

/// An import that could not be resolved because something on its transitive
/// closure is broken, with the chain of packages between the poisoned
/// import and the underlying cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemImportError {
    /// The import path whose closure is poisoned.
    pub import_path: String,
    /// Ancestor paths between `import_path` and the cause, exclusive of the
    /// cause itself when the cause is absent from the workmap.
    pub cause_chain: Vec<String>,
    /// Human-readable description of the underlying cause.
    pub cause: String,
}

impl std::fmt::Display for ProblemImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.cause_chain.len() {
            0 => write!(f, "{}: {}", self.import_path, self.cause),
            1 => write!(
                f,
                "{} (via {}): {}",
                self.import_path, self.cause_chain[0], self.cause
            ),
            n => write!(
                f,
                "{} (via {} hops, through {}): {}",
                self.import_path,
                n,
                self.cause_chain.join(" -> "),
                self.cause
            ),
        }
    }
}

impl std::error::Error for ProblemImportError {}

/// A version was tried and rejected; kept for solver failure diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct TriedVersion {
    pub project: ProjectRoot,
    pub version: String,
    pub rejected_by: Constraint,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("malformed manifest: {0}")]
    Manifest(#[from] crate::manifest::ManifestError),

    #[error("malformed lock: {0}")]
    Lock(#[from] crate::lock::LockError),

    #[error("all candidate sources failed for {root}: {causes:?}")]
    SourceSetupFailure { root: ProjectRoot, causes: Vec<String> },

    #[error("could not deduce a repository for {0}: no known prefix matched and vanity metadata was unreachable or invalid")]
    DeductionFailure(ProjectRoot),

    #[error("unsupported version-control system {0:?} for {1}")]
    UnsupportedVcs(String, ProjectRoot),

    #[error(transparent)]
    LocalImports(#[from] crate::analyzer::LocalImportsError),

    #[error("malformed source for {0}: {1}")]
    MalformedSource(String, String),

    #[error("package {0} has no source files")]
    NoSourceFiles(String),

    #[error("permission denied reading {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    ProblemImport(#[from] ProblemImportError),

    #[error("no version of {project} satisfies the accumulated constraints; tried {tried:?}")]
    NoVersionsMeetConstraints { project: ProjectRoot, tried: Vec<TriedVersion> },

    #[error("{project} is imported but its import path is ignored")]
    DependencyOnIgnored { project: ProjectRoot },

    #[error("import {0} is not provided by any known source")]
    MissingSourceImports(String),

    #[error("root package is missing from disk")]
    RootPackageMissing,

    #[error("operation cancelled")]
    Cancelled,

    #[error("step limit of {0} exceeded without finding a solution")]
    StepLimitExceeded(u64),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_import_display_varies_by_chain_length() {
        let direct = ProblemImportError {
            import_path: "a".into(),
            cause_chain: vec![],
            cause: "malformed source".into(),
        };
        assert_eq!(direct.to_string(), "a: malformed source");

        let one_hop = ProblemImportError {
            import_path: "a".into(),
            cause_chain: vec!["b".into()],
            cause: "malformed source".into(),
        };
        assert_eq!(one_hop.to_string(), "a (via b): malformed source");

        let transitive = ProblemImportError {
            import_path: "a".into(),
            cause_chain: vec!["b".into(), "c".into()],
            cause: "malformed source".into(),
        };
        assert!(transitive.to_string().contains("via 2 hops"));
    }
}
