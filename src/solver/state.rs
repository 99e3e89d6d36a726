//! Search state and backtracking frames.

use crate::identifier::ProjectRoot;
use crate::source::{Gateway, RemoteVersion};
use crate::version::{Constraint, Version};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Everything the search needs to resume from a point in time: which
/// projects are selected and at what version, the accumulated constraint
/// each unselected project is under, and the bimodal reach bookkeeping
/// (which projects the search has actually reached, and through which
/// subpackages) that determines inclusion. Snapshotting this whole struct on
/// every frame push is simpler than a true incremental undo log and, at the
/// depths a dependency graph actually reaches, cheap enough.
#[derive(Debug, Clone, Default)]
pub struct SolverState {
    pub selected: BTreeMap<ProjectRoot, (Version, Option<String>)>,
    pub constraints: BTreeMap<ProjectRoot, Constraint>,
    /// Projects that contributed a constraint to each unselected root, used
    /// both for conflict reporting and to compute a backjump target: the
    /// most recent still-open selection among a failing root's dependents.
    pub dependents: BTreeMap<ProjectRoot, Vec<ProjectRoot>>,
    /// Projects the bimodal reach closure has actually reached — declaring a
    /// constraint alone does not put a project here; only an import someone
    /// actually follows does. Only members of this set are ever selected or
    /// appear in the assembled lock.
    pub reached: BTreeSet<ProjectRoot>,
    /// Per-project subpackage names (relative to the project root, `""` for
    /// the root package itself) actually reached through some import chain.
    pub subpackages: BTreeMap<ProjectRoot, BTreeSet<String>>,
    /// Absolute import paths already folded into `reached`/`subpackages`, so
    /// re-discovering the same import through a second path is a no-op
    /// instead of double-counting a dependent.
    pub seen_imports: BTreeSet<String>,
}

impl SolverState {
    pub fn constraint_for(&self, root: &ProjectRoot) -> Constraint {
        self.constraints.get(root).cloned().unwrap_or(Constraint::Any)
    }

    /// Folds a new constraint into the accumulated one for `root`, and
    /// records `from` as one of the dependents responsible for it.
    pub fn add_constraint(&mut self, root: ProjectRoot, constraint: Constraint, from: ProjectRoot) {
        let existing = self.constraint_for(&root);
        self.constraints.insert(root.clone(), existing.intersection(&constraint));
        self.dependents.entry(root).or_default().push(from);
    }

    /// Projects that are reached but not yet selected: the search frontier
    /// the selection loop picks from.
    pub fn pending(&self) -> BTreeSet<ProjectRoot> {
        self.reached.iter().filter(|r| !self.selected.contains_key(*r)).cloned().collect()
    }
}

/// One entry on the backtracking stack: the root being decided, the
/// candidate versions still left to try (best-first), everything needed to
/// retry without refetching, and the state to restore to before trying the
/// next candidate.
pub struct SelectionFrame {
    pub root: ProjectRoot,
    pub remaining: Vec<Version>,
    pub remote_versions: Vec<RemoteVersion>,
    pub normalized_source: String,
    pub gateway: Arc<Gateway>,
    pub state_before: SolverState,
}
