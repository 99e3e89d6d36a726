//! The backtracking version solver.
//!
//! Inclusion is bimodal: a project only enters the search if some package
//! somewhere in the closure actually imports it (`manifest.required` is the
//! one deliberate exception — those are force-included). The root project's
//! own package tree is analyzed up front to seed the initial reach frontier,
//! and every candidate version considered thereafter has its own tree
//! exported and analyzed in turn, so the imports that matter are the ones a
//! real package follows, not merely the constraints a manifest declares.
//!
//! One project root is selected at a time, in [`order::select_next_root`]
//! order; candidate versions for that root are tried newest-first (or
//! oldest-first in downgrade mode, see [`order::order_candidates`]), and a
//! root whose accumulated constraint admits no candidate triggers a
//! conflict-directed backjump: using [`state::SolverState::dependents`] to
//! find the most recent still-open selection implicated in the failure,
//! discarding every frame tried after it rather than retrying them one at a
//! time.

pub mod order;
pub mod state;

use crate::analyzer::reach::compute_reach_map;
use crate::analyzer::{self, Package, RegexImportExtractor};
use crate::callmgr::{CallManager, CallType};
use crate::config::SolveConfig;
use crate::error::{SolveError, TriedVersion};
use crate::identifier::{ProjectIdentifier, ProjectProperties, ProjectRoot};
use crate::lock::{Lock, LockedProject};
use crate::manifest::Manifest;
use crate::source::{Gateway, RemoteVersion, SourceCoordinator};
use crate::version::{Constraint, Version};
use state::{SelectionFrame, SolverState};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Solver<'a> {
    manifest: &'a Manifest,
    root_packages: &'a BTreeMap<String, Package>,
    root_import_root: &'a str,
    coordinator: &'a SourceCoordinator,
    config: SolveConfig,
    calls: CallManager,
}

impl<'a> Solver<'a> {
    pub fn new(
        manifest: &'a Manifest,
        root_packages: &'a BTreeMap<String, Package>,
        root_import_root: &'a str,
        coordinator: &'a SourceCoordinator,
        config: SolveConfig,
    ) -> Self {
        Solver { manifest, root_packages, root_import_root, coordinator, config, calls: CallManager::new() }
    }

    /// Cancels the in-progress solve; every outstanding and future call
    /// this solver makes observes the cancellation.
    pub fn cancel(&self) {
        self.calls.cancel_all();
    }

    pub async fn solve(&self) -> Result<Lock, SolveError> {
        let root_marker = ProjectRoot::new("<root>");
        let mut state = SolverState::default();

        let root_reach = compute_reach_map(self.root_packages, self.root_import_root);
        let mut frontier: BTreeSet<String> = BTreeSet::new();
        for key in self.root_packages.keys() {
            if root_reach.is_poisoned(key) {
                let err = root_reach.poison_reason(key).cloned().expect("poisoned key has a reason");
                return Err(SolveError::ProblemImport(err));
            }
            frontier.extend(root_reach.external_imports(key, self.root_import_root));
        }
        Self::extend_reached(&mut state, frontier, &self.manifest.dependencies, root_marker.clone())?;

        for required in &self.manifest.required {
            let root = ProjectRoot::new(required.clone());
            state.add_constraint(root.clone(), Constraint::Any, root_marker.clone());
            state.reached.insert(root.clone());
            state.subpackages.entry(root).or_default().insert(String::new());
        }

        let mut stack: Vec<SelectionFrame> = Vec::new();
        let mut steps: u64 = 0;

        loop {
            if self.calls.is_cancelled() {
                return Err(SolveError::Cancelled);
            }
            steps += 1;
            if steps > self.config.step_limit {
                return Err(SolveError::StepLimitExceeded(self.config.step_limit));
            }

            let pending = state.pending();
            let Some(root) = order::select_next_root(&pending) else {
                debug!(selected = state.selected.len(), "solve complete");
                return Ok(self.assemble_lock(&state));
            };

            if self.is_ignored(&root) {
                return Err(SolveError::DependencyOnIgnored { project: root });
            }

            let override_props = self.manifest.overrides.get(&root);
            let constraint = match override_props {
                Some(props) => props.constraint.clone(),
                None => state.constraint_for(&root),
            };

            if constraint.is_statically_empty() {
                warn!(%root, "constraint is statically empty, backjumping");
                if self.backjump(&root, &mut stack, &mut state).await? {
                    continue;
                }
                return Err(SolveError::NoVersionsMeetConstraints { project: root, tried: vec![] });
            }

            let source_override = override_props
                .and_then(|p| p.source.clone())
                .or_else(|| self.manifest.dependencies.get(&root).and_then(|p| p.source.clone()));
            let normalized_source = source_override.unwrap_or_else(|| root.as_str().to_string());

            let gateway = self
                .coordinator
                .gateway_for(&normalized_source)
                .await
                .map_err(|_| SolveError::DeductionFailure(root.clone()))?;

            let call = self.calls.begin_call(normalized_source.clone(), CallType::ListVersions);
            let remote_versions = gateway.list_versions().await.map_err(|e| {
                SolveError::SourceSetupFailure { root: root.clone(), causes: vec![e.to_string()] }
            })?;
            drop(call);

            let candidate_versions: Vec<Version> =
                remote_versions.iter().map(|rv| rv.version.clone()).filter(|v| constraint.matches(v)).collect();
            let ordered = order::order_candidates(&candidate_versions, self.config.downgrade);

            if ordered.is_empty() {
                warn!(%root, "no candidate version satisfies accumulated constraints");
                let tried: Vec<TriedVersion> = remote_versions
                    .iter()
                    .map(|rv| TriedVersion {
                        project: root.clone(),
                        version: rv.version.to_string(),
                        rejected_by: constraint.clone(),
                    })
                    .collect();
                if self.backjump(&root, &mut stack, &mut state).await? {
                    continue;
                }
                return Err(SolveError::NoVersionsMeetConstraints { project: root, tried });
            }

            let state_before = state.clone();
            let mut remaining = ordered;
            let chosen = remaining.remove(0);
            self.select(&root, &chosen, &remote_versions, &mut state, &normalized_source, &gateway).await?;

            stack.push(SelectionFrame {
                root,
                remaining,
                remote_versions,
                normalized_source,
                gateway,
                state_before,
            });
        }
    }

    fn is_ignored(&self, root: &ProjectRoot) -> bool {
        self.manifest
            .ignored
            .iter()
            .any(|prefix| root.as_str() == prefix || root.as_str().starts_with(&format!("{prefix}/")))
    }

    /// Folds freshly-discovered external imports into the search: each
    /// import is matched against the declared root that owns it (by
    /// slash-prefix), which both narrows that root's constraint and marks it
    /// reached, and records the subpackage name (relative to the owning
    /// root, empty string for the root package itself) the import resolved
    /// to. An import matching no declared root is a hard failure — nothing
    /// in the manifest claims to provide it.
    fn extend_reached(
        state: &mut SolverState,
        imports: impl IntoIterator<Item = String>,
        declared: &BTreeMap<ProjectRoot, ProjectProperties>,
        dependent: ProjectRoot,
    ) -> Result<(), SolveError> {
        for import in imports {
            if !state.seen_imports.insert(import.clone()) {
                continue;
            }
            let Some(owner) = declared.keys().find(|r| r.contains_import(&import)) else {
                return Err(SolveError::MissingSourceImports(import));
            };
            let owner = owner.clone();
            let props = &declared[&owner];
            state.add_constraint(owner.clone(), props.constraint.clone(), dependent.clone());
            state.reached.insert(owner.clone());

            let sub = if import == owner.as_str() {
                String::new()
            } else {
                import.strip_prefix(owner.as_str()).unwrap_or(&import).trim_start_matches('/').to_string()
            };
            state.subpackages.entry(owner).or_default().insert(sub);
        }
        Ok(())
    }

    /// Tentatively selects `chosen` for `root`: records it, fetches the
    /// candidate's own manifest to fold in the dependency constraints it
    /// declares, and exports the candidate's tree to analyze which of those
    /// declared dependencies its actually-reached subpackages import. A
    /// missing or unparsable manifest, or a tree that can't be exported or
    /// walked, is tolerated rather than treated as fatal — a leaf dependency
    /// with no manifest of its own simply introduces no further constraints.
    async fn select(
        &self,
        root: &ProjectRoot,
        chosen: &Version,
        remote_versions: &[RemoteVersion],
        state: &mut SolverState,
        normalized_source: &str,
        gateway: &Arc<Gateway>,
    ) -> Result<(), SolveError> {
        let source = (normalized_source != root.as_str()).then(|| normalized_source.to_string());
        state.selected.insert(root.clone(), (chosen.clone(), source));

        let Some(revision) = remote_versions.iter().find(|rv| &rv.version == chosen).map(|rv| rv.revision.clone())
        else {
            return Ok(());
        };

        let call = self.calls.begin_call(normalized_source.to_string(), CallType::GetManifestAndLock);
        let contents = gateway.read_file_at(&revision, &self.config.manifest_file_name).await;
        drop(call);

        let Ok(Some(contents)) = contents else {
            return Ok(());
        };
        let Ok(dep_manifest) = Manifest::from_str(&contents) else {
            debug!(%root, %chosen, "candidate manifest did not parse, treating as leaf");
            return Ok(());
        };

        let Ok(export_dir) = tempfile::tempdir() else {
            return Ok(());
        };
        let call = self.calls.begin_call(normalized_source.to_string(), CallType::ExportTo);
        let exported = gateway.export_to(&revision, export_dir.path()).await;
        drop(call);
        let Ok(()) = exported else {
            return Ok(());
        };

        let extractor = RegexImportExtractor::default();
        let Ok(packages) = analyzer::list_packages(export_dir.path(), root.as_str(), &extractor) else {
            return Ok(());
        };
        let reach = compute_reach_map(&packages, root.as_str());

        let entries = state.subpackages.get(root).cloned().unwrap_or_default();
        let mut frontier: BTreeSet<String> = BTreeSet::new();
        for entry in &entries {
            let import_path =
                if entry.is_empty() { root.as_str().to_string() } else { format!("{}/{}", root.as_str(), entry) };
            if reach.is_poisoned(&import_path) {
                let err = reach.poison_reason(&import_path).cloned().expect("poisoned key has a reason");
                return Err(SolveError::ProblemImport(err));
            }
            frontier.extend(reach.external_imports(&import_path, root.as_str()));
        }

        Self::extend_reached(state, frontier, &dep_manifest.dependencies, root.clone())
    }

    /// Computes the minimal conflict set for `failing_root` from the
    /// dependents that narrowed its constraint, then jumps the search back
    /// to the most recent stack frame whose root is implicated, discarding
    /// (not retrying) every frame tried after it. If that frame is itself
    /// exhausted, its own dependents widen the conflict set and the search
    /// continues jumping further back. Returns `false` once no implicated
    /// frame remains.
    async fn backjump(
        &self,
        failing_root: &ProjectRoot,
        stack: &mut Vec<SelectionFrame>,
        state: &mut SolverState,
    ) -> Result<bool, SolveError> {
        let mut conflict: BTreeSet<ProjectRoot> = BTreeSet::new();
        conflict.insert(failing_root.clone());
        if let Some(deps) = state.dependents.get(failing_root) {
            conflict.extend(deps.iter().cloned());
        }

        loop {
            let Some(pos) = stack.iter().rposition(|f| conflict.contains(&f.root)) else {
                return Ok(false);
            };
            let mut discarded = stack.split_off(pos);
            let frame = discarded.remove(0);
            drop(discarded);

            if frame.remaining.is_empty() {
                if let Some(deps) = state.dependents.get(&frame.root) {
                    conflict.extend(deps.iter().cloned());
                }
                conflict.insert(frame.root.clone());
                *state = frame.state_before;
                continue;
            }

            let mut remaining = frame.remaining;
            let chosen = remaining.remove(0);
            *state = frame.state_before.clone();

            self.select(&frame.root, &chosen, &frame.remote_versions, state, &frame.normalized_source, &frame.gateway)
                .await?;

            stack.push(SelectionFrame {
                root: frame.root,
                remaining,
                remote_versions: frame.remote_versions,
                normalized_source: frame.normalized_source,
                gateway: frame.gateway,
                state_before: frame.state_before,
            });
            return Ok(true);
        }
    }

    fn assemble_lock(&self, state: &SolverState) -> Lock {
        let projects: Vec<LockedProject> = state
            .selected
            .iter()
            .map(|(root, (version, source))| {
                let identifier = match source {
                    Some(s) => ProjectIdentifier::with_source(root.as_str(), s.clone()),
                    None => ProjectIdentifier::new(root.as_str()),
                };
                let subpackages: Vec<String> = state.subpackages.get(root).cloned().unwrap_or_default().into_iter().collect();
                LockedProject { identifier, version: version.clone(), subpackages }
            })
            .collect();
        let fingerprint = format!("{:?}", self.manifest);
        let memo = Lock::compute_memo(&[fingerprint.as_bytes()]);
        Lock::new(memo, projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ProjectProperties;
    use crate::source::{Deducer, StaticRepo, StaticVcsClient, VcsClient};
    use std::collections::BTreeMap;

    fn client_with(repos: Vec<(&str, StaticRepo)>) -> Arc<dyn VcsClient> {
        let mut client = StaticVcsClient::new();
        for (url, repo) in repos {
            client = client.with_repo(url, repo);
        }
        Arc::new(client)
    }

    fn repo(versions: &[&str]) -> StaticRepo {
        StaticRepo {
            versions: versions
                .iter()
                .enumerate()
                .map(|(i, v)| crate::source::RemoteVersion {
                    version: Version::parse_semver(v).unwrap(),
                    revision: format!("rev{i}"),
                })
                .collect(),
            files: BTreeMap::new(),
        }
    }

    fn root_importing(paths: &[&str]) -> BTreeMap<String, Package> {
        let mut packages = BTreeMap::new();
        packages.insert(
            "example.com/root".to_string(),
            Package {
                import_path: "example.com/root".to_string(),
                imports: paths.iter().map(|s| s.to_string()).collect(),
                test_imports: vec![],
            },
        );
        packages
    }

    #[tokio::test]
    async fn solves_a_single_direct_dependency_to_its_newest_matching_version() {
        let client = client_with(vec![("github.com/org/a", repo(&["1.0.0", "1.5.0", "2.0.0"]))]);
        let deducer = Deducer::new(reqwest::Client::new());
        let coordinator = SourceCoordinator::new(deducer, client);

        let mut manifest = Manifest {
            dependencies: BTreeMap::new(),
            overrides: BTreeMap::new(),
            ignored: vec![],
            required: vec![],
        };
        manifest.dependencies.insert(
            ProjectRoot::new("github.com/org/a"),
            ProjectProperties::new(Constraint::parse_semver("^1.0.0").unwrap()),
        );

        let root_packages = root_importing(&["github.com/org/a"]);
        let solver = Solver::new(&manifest, &root_packages, "example.com/root", &coordinator, SolveConfig::default());
        let lock = solver.solve().await.unwrap();

        assert_eq!(lock.projects.len(), 1);
        assert_eq!(lock.projects[0].version.to_string(), "1.5.0");
        assert_eq!(lock.projects[0].subpackages, vec![String::new()]);
    }

    #[tokio::test]
    async fn declaring_a_dependency_without_importing_it_produces_an_empty_lock() {
        let client = client_with(vec![("github.com/org/a", repo(&["1.0.0"]))]);
        let deducer = Deducer::new(reqwest::Client::new());
        let coordinator = SourceCoordinator::new(deducer, client);

        let mut manifest = Manifest {
            dependencies: BTreeMap::new(),
            overrides: BTreeMap::new(),
            ignored: vec![],
            required: vec![],
        };
        manifest.dependencies.insert(
            ProjectRoot::new("github.com/org/a"),
            ProjectProperties::new(Constraint::parse_semver("^1.0.0").unwrap()),
        );

        let root_packages: BTreeMap<String, Package> = BTreeMap::new();
        let solver = Solver::new(&manifest, &root_packages, "example.com/root", &coordinator, SolveConfig::default());
        let lock = solver.solve().await.unwrap();

        assert!(lock.projects.is_empty());
    }

    #[tokio::test]
    async fn fails_with_no_versions_meet_constraints_when_range_is_unsatisfiable() {
        let client = client_with(vec![("github.com/org/a", repo(&["1.0.0"]))]);
        let deducer = Deducer::new(reqwest::Client::new());
        let coordinator = SourceCoordinator::new(deducer, client);

        let mut manifest = Manifest {
            dependencies: BTreeMap::new(),
            overrides: BTreeMap::new(),
            ignored: vec![],
            required: vec![],
        };
        manifest.dependencies.insert(
            ProjectRoot::new("github.com/org/a"),
            ProjectProperties::new(Constraint::parse_semver("^2.0.0").unwrap()),
        );

        let root_packages = root_importing(&["github.com/org/a"]);
        let solver = Solver::new(&manifest, &root_packages, "example.com/root", &coordinator, SolveConfig::default());
        let err = solver.solve().await.unwrap_err();
        match err {
            SolveError::NoVersionsMeetConstraints { tried, .. } => {
                assert_eq!(tried.len(), 1);
                assert_eq!(tried[0].version, "1.0.0");
            }
            other => panic!("expected NoVersionsMeetConstraints, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dependency_on_ignored_prefix_is_rejected() {
        let client = client_with(vec![("github.com/org/a", repo(&["1.0.0"]))]);
        let deducer = Deducer::new(reqwest::Client::new());
        let coordinator = SourceCoordinator::new(deducer, client);

        let mut manifest = Manifest {
            dependencies: BTreeMap::new(),
            overrides: BTreeMap::new(),
            ignored: vec!["github.com/org".to_string()],
            required: vec![],
        };
        manifest.dependencies.insert(
            ProjectRoot::new("github.com/org/a"),
            ProjectProperties::new(Constraint::Any),
        );

        let root_packages = root_importing(&["github.com/org/a"]);
        let solver = Solver::new(&manifest, &root_packages, "example.com/root", &coordinator, SolveConfig::default());
        let err = solver.solve().await.unwrap_err();
        assert!(matches!(err, SolveError::DependencyOnIgnored { .. }));
    }
}
