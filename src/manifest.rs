//! Manifest parsing.
//!
//! A serde wire struct, a `from_str`/`from_file`/`to_file` trio, and a
//! `validate` pass folded into parsing, with the wire shape and the domain
//! shape kept separate: the wire struct only ever holds plain strings (what
//! TOML can serialize), and `Manifest::from_raw` does the semantic parsing
//! into `Constraint`s.

use crate::identifier::{ProjectProperties, ProjectRoot};
use crate::version::Constraint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("dependency {0} specifies more than one of branch/version/revision")]
    MultipleVersionKinds(String),
}

/// One dependency entry as it appears on disk: at most one of
/// branch/version/revision may be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawDependencyEntry {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source: Option<String>,
}

/// The manifest as written and read from disk. Duplicate keys within one
/// `dependencies`/`overrides` table are rejected by the TOML parser itself
/// (a table cannot repeat a key), so a `ProjectRoot` appearing twice in the
/// same table is caught without extra bookkeeping here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, RawDependencyEntry>,
    #[serde(default)]
    pub overrides: BTreeMap<String, RawDependencyEntry>,
    #[serde(default)]
    pub ignored: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// The parsed manifest: direct dependency constraints, root-only overrides,
/// ignored import-path prefixes, and force-included packages.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub dependencies: BTreeMap<ProjectRoot, ProjectProperties>,
    pub overrides: BTreeMap<ProjectRoot, ProjectProperties>,
    pub ignored: Vec<String>,
    pub required: Vec<String>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawManifest) -> Result<Self, ManifestError> {
        let dependencies = Self::parse_table(raw.dependencies)?;
        let overrides = Self::parse_table(raw.overrides)?;
        let mut ignored = raw.ignored;
        ignored.sort();
        ignored.dedup();
        let mut required = raw.required;
        required.sort();
        required.dedup();
        Ok(Manifest { dependencies, overrides, ignored, required })
    }

    fn parse_table(
        table: BTreeMap<String, RawDependencyEntry>,
    ) -> Result<BTreeMap<ProjectRoot, ProjectProperties>, ManifestError> {
        let mut out = BTreeMap::new();
        for (name, entry) in table {
            let set_count = [entry.branch.is_some(), entry.version.is_some(), entry.revision.is_some()]
                .iter()
                .filter(|b| **b)
                .count();
            if set_count > 1 {
                return Err(ManifestError::MultipleVersionKinds(name));
            }

            let constraint = if let Some(branch) = entry.branch {
                Constraint::ExactBranch(branch)
            } else if let Some(rev) = entry.revision {
                Constraint::ExactRevision(rev)
            } else if let Some(version) = entry.version {
                Constraint::parse_semver(&version).unwrap_or(Constraint::ExactPlain(version))
            } else {
                Constraint::Any
            };

            let props = match entry.source {
                Some(src) => ProjectProperties::with_source(constraint, src),
                None => ProjectProperties::new(constraint),
            };
            out.insert(ProjectRoot::new(name), props);
        }
        Ok(out)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ManifestError> {
        let raw = self.to_raw();
        let content = toml::to_string_pretty(&raw)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_raw(&self) -> RawManifest {
        let to_table = |map: &BTreeMap<ProjectRoot, ProjectProperties>| {
            map.iter()
                .map(|(root, props)| {
                    let mut entry = RawDependencyEntry { source: props.source.clone(), ..Default::default() };
                    match &props.constraint {
                        Constraint::ExactBranch(b) => entry.branch = Some(b.clone()),
                        Constraint::ExactRevision(r) => entry.revision = Some(r.clone()),
                        Constraint::ExactPlain(p) => entry.version = Some(p.clone()),
                        Constraint::Semver(r) => entry.version = Some(r.to_string()),
                        Constraint::Any | Constraint::None => {}
                    }
                    (root.as_str().to_string(), entry)
                })
                .collect()
        };
        RawManifest {
            dependencies: to_table(&self.dependencies),
            overrides: to_table(&self.overrides),
            ignored: self.ignored.clone(),
            required: self.required.clone(),
        }
    }

    /// All import-path prefixes ignored, ready to be dropped from a reach
    /// map before constraints are derived.
    pub fn ignored_prefixes(&self) -> &[String] {
        &self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_version_dependency() {
        let toml = r#"
[dependencies]
"example.com/a" = { version = "^1.2.0" }
"#;
        let m = Manifest::from_str(toml).unwrap();
        let props = &m.dependencies[&ProjectRoot::new("example.com/a")];
        assert!(props.constraint.matches(&crate::version::Version::parse_semver("1.5.0").unwrap()));
    }

    #[test]
    fn rejects_multiple_version_kinds() {
        let toml = r#"
[dependencies]
"example.com/a" = { version = "^1.0.0", branch = "master" }
"#;
        let err = Manifest::from_str(toml).unwrap_err();
        assert!(matches!(err, ManifestError::MultipleVersionKinds(_)));
    }

    #[test]
    fn rejects_duplicate_dependency_keys_at_toml_level() {
        let toml = r#"
[dependencies]
"example.com/a" = { version = "^1.0.0" }
"example.com/a" = { version = "^2.0.0" }
"#;
        assert!(Manifest::from_str(toml).is_err());
    }

    #[test]
    fn ignored_and_required_are_sorted_and_deduped() {
        let toml = r#"
ignored = ["b/x", "a/x", "a/x"]
required = ["z", "y", "y"]
"#;
        let m = Manifest::from_str(toml).unwrap();
        assert_eq!(m.ignored, vec!["a/x", "b/x"]);
        assert_eq!(m.required, vec!["y", "z"]);
    }

    #[test]
    fn branch_and_revision_and_source_override_round_trip() {
        let toml = r#"
[dependencies]
"example.com/a" = { branch = "master" }
"example.com/b" = { revision = "deadbeef" }

[overrides]
"example.com/c" = { version = "^1.0.0", source = "https://mirror.example.com/c" }
"#;
        let m = Manifest::from_str(toml).unwrap();
        assert_eq!(
            m.dependencies[&ProjectRoot::new("example.com/a")].constraint,
            Constraint::ExactBranch("master".into())
        );
        assert_eq!(
            m.dependencies[&ProjectRoot::new("example.com/b")].constraint,
            Constraint::ExactRevision("deadbeef".into())
        );
        assert_eq!(
            m.overrides[&ProjectRoot::new("example.com/c")].source.as_deref(),
            Some("https://mirror.example.com/c")
        );
    }
}
