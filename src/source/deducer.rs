//! Source deduction: turning a bare import-path root into a
//! concrete repository location and VCS kind.
//!
//! Three strategies are tried in order: a known-hosting-prefix table, a
//! VCS-extension match on the root itself (e.g. a trailing `.git`), and
//! finally an HTTP fetch of vanity import metadata. No radix/patricia-trie
//! crate showed up anywhere in the retrieval pack, so the known-prefix
//! table below is a small hand-rolled `BTreeMap` keyed by host, in the
//! BTreeMap-heavy style the pack's other dependency-graph code uses for its
//! own lookup tables.

use super::vcs::VcsKind;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DeductionError {
    #[error("no known prefix matched {0} and vanity metadata was unreachable: {1}")]
    VanityUnreachable(String, String),

    #[error("vanity metadata for {0} was malformed")]
    MalformedVanityMetadata(String),

    #[error("{0} names an unsupported version-control system {1:?}")]
    UnsupportedVcs(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeducedSource {
    pub vcs: VcsKind,
    pub repo_root: String,
    pub repo_url: String,
}

struct KnownHost {
    vcs: VcsKind,
    path_segments: usize,
}

static KNOWN_HOSTS: Lazy<BTreeMap<&'static str, KnownHost>> = Lazy::new(|| {
    BTreeMap::from([
        ("github.com", KnownHost { vcs: VcsKind::Git, path_segments: 2 }),
        ("gitlab.com", KnownHost { vcs: VcsKind::Git, path_segments: 2 }),
        ("bitbucket.org", KnownHost { vcs: VcsKind::Git, path_segments: 2 }),
        ("gitea.com", KnownHost { vcs: VcsKind::Git, path_segments: 2 }),
        ("hub.darcs.net", KnownHost { vcs: VcsKind::Bazaar, path_segments: 1 }),
    ])
});

/// Matches a known hosting prefix: splits the root on its host and takes
/// exactly as many following path segments as that host's repos are rooted
/// at (almost always `org/repo`, i.e. 2).
fn match_known_prefix(root: &str) -> Option<DeducedSource> {
    let mut parts = root.splitn(2, '/');
    let host = parts.next()?;
    let rule = KNOWN_HOSTS.get(host)?;
    let rest = parts.next().unwrap_or("");
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).take(rule.path_segments).collect();
    if segments.len() < rule.path_segments {
        return None;
    }
    let repo_root = format!("{host}/{}", segments.join("/"));
    Some(DeducedSource { vcs: rule.vcs, repo_url: format!("https://{repo_root}"), repo_root })
}

/// Matches a root that names its VCS by file extension, e.g.
/// `example.com/foo.git`.
fn match_extension(root: &str) -> Option<DeducedSource> {
    const EXTENSIONS: &[(&str, VcsKind)] =
        &[(".git", VcsKind::Git), (".hg", VcsKind::Mercurial), (".bzr", VcsKind::Bazaar)];
    for (ext, vcs) in EXTENSIONS {
        if let Some(stripped) = root.strip_suffix(ext) {
            return Some(DeducedSource {
                vcs: *vcs,
                repo_root: stripped.to_string(),
                repo_url: format!("https://{root}"),
            });
        }
    }
    None
}

static VANITY_META: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r#"<meta\s+name="dep-source"\s+content="([^\s"]+)\s+(\w+)\s+([^"]+)"\s*/?>"#).unwrap()
});

fn parse_vanity_body(root: &str, body: &str) -> Result<DeducedSource, DeductionError> {
    let caps = VANITY_META
        .captures(body)
        .ok_or_else(|| DeductionError::MalformedVanityMetadata(root.to_string()))?;
    let repo_root = caps[1].to_string();
    let vcs = match &caps[2] {
        "git" => VcsKind::Git,
        "hg" => VcsKind::Mercurial,
        "svn" => VcsKind::Subversion,
        "bzr" => VcsKind::Bazaar,
        other => return Err(DeductionError::UnsupportedVcs(root.to_string(), other.to_string())),
    };
    Ok(DeducedSource { vcs, repo_root, repo_url: caps[3].to_string() })
}

/// Deduces repository sources for import-path roots, folding in concurrent
/// requests for the same root so a burst of packages under one unresolved
/// host only costs a single HTTP round trip.
pub struct Deducer {
    http: reqwest::Client,
    inflight: dashmap::DashMap<String, Arc<tokio::sync::OnceCell<Result<DeducedSource, DeductionError>>>>,
}

impl Deducer {
    pub fn new(http: reqwest::Client) -> Self {
        Deducer { http, inflight: dashmap::DashMap::new() }
    }

    pub async fn deduce(&self, root: &str) -> Result<DeducedSource, DeductionError> {
        if let Some(found) = match_known_prefix(root) {
            return Ok(found);
        }
        if let Some(found) = match_extension(root) {
            return Ok(found);
        }

        let cell = self
            .inflight
            .entry(root.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::OnceCell::new()))
            .clone();

        cell.get_or_init(|| async { self.fetch_vanity(root).await }).await.clone()
    }

    async fn fetch_vanity(&self, root: &str) -> Result<DeducedSource, DeductionError> {
        let url = format!("https://{root}?dep-get=1");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| DeductionError::VanityUnreachable(root.to_string(), e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| DeductionError::VanityUnreachable(root.to_string(), e.to_string()))?;
        parse_vanity_body(root, &body)
    }
}
