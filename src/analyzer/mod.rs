//! Package tree analysis: listing packages.
//!
//! Walks a project's source tree into a map of packages and their raw import
//! lists. Reachability (the part that actually drives the solver) lives in
//! [`reach`]; this module is only concerned with turning a directory into a
//! `{import path -> Package}` map the way a package tree analyzer reads a
//! working copy before any dependency resolution happens.

pub mod reach;

pub use reach::{Color, ReachMap};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory names skipped outright: vendored copies of dependencies, the
/// legacy Godeps vendoring convention, and anything hidden.
const SKIP_DIR_NAMES: &[&str] = &["vendor", "Godeps", "testdata", "node_modules"];

/// A leading line that marks a source file as excluded from package
/// analysis entirely (distinct from being merely test-only).
const IGNORE_MARKER: &str = "// tree-analyzer:ignore";

#[derive(Debug, Error)]
pub enum LocalImportsError {
    #[error("failed to walk {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("package {0} has no source files")]
    NoSourceFiles(String),

    #[error("permission denied reading {0}")]
    PermissionDenied(PathBuf),
}

/// One package: its import path (relative to the import root it was walked
/// under) and the raw imports extracted from its non-test and test source
/// files, kept separate because test imports never constrain the resolved
/// graph of a package that merely *depends on* this one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub import_path: String,
    pub imports: Vec<String>,
    pub test_imports: Vec<String>,
}

/// Extracts the set of import paths referenced by one source file. Kept
/// pluggable because the tree analyzer is agnostic to any one source
/// language; [`RegexImportExtractor`] is the only implementation shipped.
pub trait ImportExtractor {
    fn extract_imports(&self, contents: &str) -> Vec<String>;
}

/// Recognizes both a single `import "path"` statement and a grouped
/// `import (\n "a"\n "b"\n)` block, matching on quoted string literals that
/// follow the `import` keyword. Good enough to drive reachability analysis
/// without committing to any one compiler's grammar.
pub struct RegexImportExtractor {
    single: regex::Regex,
    quoted: regex::Regex,
}

impl Default for RegexImportExtractor {
    fn default() -> Self {
        RegexImportExtractor {
            single: regex::Regex::new(r#"(?m)^\s*import\s+"([^"]+)"\s*$"#).unwrap(),
            quoted: regex::Regex::new(r#""([^"]+)""#).unwrap(),
        }
    }
}

impl ImportExtractor for RegexImportExtractor {
    fn extract_imports(&self, contents: &str) -> Vec<String> {
        let mut out = Vec::new();
        for cap in self.single.captures_iter(contents) {
            out.push(cap[1].to_string());
        }
        if let Some(block_start) = contents.find("import (") {
            if let Some(block_end) = contents[block_start..].find(')') {
                let block = &contents[block_start..block_start + block_end];
                for cap in self.quoted.captures_iter(block) {
                    out.push(cap[1].to_string());
                }
            }
        }
        out.sort();
        out.dedup();
        out
    }
}

fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || SKIP_DIR_NAMES.contains(&name)
}

fn is_skipped_file(name: &str) -> bool {
    name.starts_with('_') || name.starts_with('.')
}

fn is_test_file(stem: &str) -> bool {
    stem.ends_with("_test")
}

/// Walk `root` and return every package found, keyed by its import path
/// (the import root joined with the path relative to `root`). Directories
/// named in [`SKIP_DIR_NAMES`], dot-directories, and `_`-prefixed
/// directories are skipped entirely.
pub fn list_packages(
    root: &Path,
    import_root: &str,
    extractor: &dyn ImportExtractor,
) -> Result<BTreeMap<String, Package>, LocalImportsError> {
    let mut packages = BTreeMap::new();
    walk(root, root, import_root, extractor, &mut packages)?;
    Ok(packages)
}

fn walk(
    base: &Path,
    dir: &Path,
    import_root: &str,
    extractor: &dyn ImportExtractor,
    packages: &mut BTreeMap<String, Package>,
) -> Result<(), LocalImportsError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;

    let mut imports = Vec::new();
    let mut test_imports = Vec::new();
    let mut has_source_file = false;
    let mut subdirs = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy().to_string();

        if path.is_dir() {
            if !is_skipped_dir(&name) {
                subdirs.push(path);
            }
            continue;
        }

        if is_skipped_file(&name) {
            continue;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err(LocalImportsError::PermissionDenied(path));
            }
            Err(e) => return Err(io_err(&path, e)),
        };
        if contents.starts_with(IGNORE_MARKER) {
            continue;
        }

        has_source_file = true;
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let found = extractor.extract_imports(&contents);
        if is_test_file(&stem) {
            test_imports.extend(found);
        } else {
            imports.extend(found);
        }
    }

    if has_source_file {
        imports.sort();
        imports.dedup();
        test_imports.sort();
        test_imports.dedup();

        let rel = dir.strip_prefix(base).unwrap_or(Path::new(""));
        let import_path = if rel.as_os_str().is_empty() {
            import_root.to_string()
        } else {
            format!("{import_root}/{}", rel.to_string_lossy().replace('\\', "/"))
        };
        packages.insert(import_path.clone(), Package { import_path, imports, test_imports });
    }

    for sub in subdirs {
        walk(base, &sub, import_root, extractor, packages)?;
    }

    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> LocalImportsError {
    LocalImportsError::Io { path: path.to_path_buf(), source }
}
