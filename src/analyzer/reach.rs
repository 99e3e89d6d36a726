//! Reachability with poison propagation.
//!
//! A DFS over the package import graph, three-colored the usual way (white
//! = unvisited, gray = on the current path, black = finished). A cycle closes
//! back onto a gray node; every package still on the stack at that point is
//! poisoned with an import-cycle cause. Any other poisoned child propagates
//! outward: the parent becomes poisoned too, with the child's import path
//! prepended to the cause chain, so the original `ProblemImportError`'s hop
//! count grows by one at each level instead of being rebuilt from scratch.

use super::Package;
use crate::error::ProblemImportError;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Gray,
    Black,
}

/// The result of reachability analysis: for every package that resolved
/// cleanly, the full set of import paths reachable from it (itself
/// included); for every package whose closure hit a cycle or a missing
/// internal import, the poison describing why.
#[derive(Debug, Clone, Default)]
pub struct ReachMap {
    clean: HashMap<String, BTreeSet<String>>,
    poisoned: HashMap<String, ProblemImportError>,
}

impl ReachMap {
    pub fn is_poisoned(&self, import_path: &str) -> bool {
        self.poisoned.contains_key(import_path)
    }

    pub fn poison_reason(&self, import_path: &str) -> Option<&ProblemImportError> {
        self.poisoned.get(import_path)
    }

    pub fn reachable_from(&self, import_path: &str) -> Option<&BTreeSet<String>> {
        self.clean.get(import_path)
    }

    /// External imports reachable from `import_path`: everything in its
    /// closure that does not fall under `internal_root` (the project-level
    /// half of bimodal reachability — what drives dependency constraints).
    pub fn external_imports(&self, import_path: &str, internal_root: &str) -> BTreeSet<String> {
        self.clean
            .get(import_path)
            .into_iter()
            .flatten()
            .filter(|p| !(*p == internal_root || p.strip_prefix(internal_root).is_some_and(|r| r.starts_with('/'))))
            .cloned()
            .collect()
    }
}

/// Computes reachability for every package in `packages`. `root` is the
/// import root of the project being analyzed: imports under it are treated
/// as internal and recursed into; any internal import missing from
/// `packages` poisons the importing package outright.
pub fn compute_reach_map(packages: &BTreeMap<String, Package>, root: &str) -> ReachMap {
    let mut color: HashMap<String, Color> = HashMap::new();
    let mut clean: HashMap<String, BTreeSet<String>> = HashMap::new();
    let mut poisoned: HashMap<String, ProblemImportError> = HashMap::new();
    let mut stack: Vec<String> = Vec::new();

    let keys: Vec<String> = packages.keys().cloned().collect();
    for key in keys {
        visit(&key, packages, root, &mut color, &mut clean, &mut poisoned, &mut stack);
    }

    ReachMap { clean, poisoned }
}

fn is_internal(import_path: &str, root: &str) -> bool {
    import_path == root || import_path.strip_prefix(root).is_some_and(|r| r.starts_with('/'))
}

fn visit(
    path: &str,
    packages: &BTreeMap<String, Package>,
    root: &str,
    color: &mut HashMap<String, Color>,
    clean: &mut HashMap<String, BTreeSet<String>>,
    poisoned: &mut HashMap<String, ProblemImportError>,
    stack: &mut Vec<String>,
) {
    match color.get(path) {
        Some(Color::Black) | Some(Color::Gray) => return,
        _ => {}
    }

    color.insert(path.to_string(), Color::Gray);
    stack.push(path.to_string());

    let Some(pkg) = packages.get(path) else {
        // Not found in the workmap at all: only a problem if it claims to be
        // part of this project's own tree; otherwise it's an ordinary
        // external dependency and is left unanalyzed here.
        color.insert(path.to_string(), Color::Black);
        stack.pop();
        if is_internal(path, root) {
            poisoned.insert(
                path.to_string(),
                ProblemImportError {
                    import_path: path.to_string(),
                    cause_chain: vec![],
                    cause: "package not found".to_string(),
                },
            );
        }
        return;
    };

    let mut reach = BTreeSet::new();
    reach.insert(path.to_string());
    let mut own_poison: Option<ProblemImportError> = None;

    for imp in &pkg.imports {
        if imp == path {
            continue;
        }
        if !is_internal(imp, root) {
            reach.insert(imp.clone());
            continue;
        }

        if color.get(imp) == Some(&Color::Gray) {
            // Closed a cycle back onto the current path: poison every
            // package from `imp` to `path` inclusive.
            let cycle_start = stack.iter().position(|p| p == imp).unwrap_or(0);
            for member in &stack[cycle_start..] {
                poisoned.insert(
                    member.clone(),
                    ProblemImportError {
                        import_path: member.clone(),
                        cause_chain: vec![],
                        cause: "import cycle".to_string(),
                    },
                );
            }
            if own_poison.is_none() {
                own_poison = poisoned.get(path).cloned();
            }
            continue;
        }

        visit(imp, packages, root, color, clean, poisoned, stack);

        if let Some(child_err) = poisoned.get(imp) {
            if own_poison.is_none() {
                let mut cause_chain = vec![imp.clone()];
                cause_chain.extend(child_err.cause_chain.clone());
                own_poison = Some(ProblemImportError {
                    import_path: path.to_string(),
                    cause_chain,
                    cause: child_err.cause.clone(),
                });
            }
        } else if let Some(child_reach) = clean.get(imp) {
            reach.extend(child_reach.iter().cloned());
        }
    }

    color.insert(path.to_string(), Color::Black);
    stack.pop();

    match own_poison {
        Some(err) => {
            poisoned.insert(path.to_string(), err);
        }
        None => {
            clean.insert(path.to_string(), reach);
        }
    }
}
