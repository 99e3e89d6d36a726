use repodep::manifest::{Manifest, ManifestError};
use repodep::{Constraint, ProjectRoot};

#[test]
fn full_manifest_with_overrides_and_ignores() {
    let toml = r#"
ignored = ["example.com/internal"]
required = ["example.com/force-include"]

[dependencies]
"example.com/a" = { version = "^1.0.0" }
"example.com/b" = { branch = "develop" }

[overrides]
"example.com/a" = { version = "=1.2.3", source = "https://mirror.example.com/a" }
"#;

    let manifest = Manifest::from_str(toml).unwrap();
    assert_eq!(manifest.dependencies.len(), 2);
    assert_eq!(manifest.ignored, vec!["example.com/internal".to_string()]);
    assert_eq!(manifest.required, vec!["example.com/force-include".to_string()]);

    let over = &manifest.overrides[&ProjectRoot::new("example.com/a")];
    assert_eq!(over.constraint, Constraint::parse_semver("=1.2.3").unwrap());
    assert_eq!(over.source.as_deref(), Some("https://mirror.example.com/a"));
}

#[test]
fn round_trips_through_to_file_and_from_file() {
    let toml = r#"
[dependencies]
"example.com/a" = { version = "^1.0.0" }
"#;
    let manifest = Manifest::from_str(toml).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dependencies.toml");
    manifest.to_file(&path).unwrap();

    let reloaded = Manifest::from_file(&path).unwrap();
    assert_eq!(reloaded, manifest);
}

#[test]
fn entries_with_conflicting_version_kinds_are_rejected() {
    let toml = r#"
[dependencies]
"example.com/a" = { version = "^1.0.0", revision = "deadbeef" }
"#;
    let err = Manifest::from_str(toml).unwrap_err();
    assert!(matches!(err, ManifestError::MultipleVersionKinds(_)));
}
