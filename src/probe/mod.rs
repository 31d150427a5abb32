// src/probe/mod.rs
pub mod providers;
pub mod registry;

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CheckResult;
pub use providers::{
    brew::BrewFormula, github_commit::GithubCommit, github_pr::GithubPr,
    github_release::GithubRelease, npm::NpmPackage,
};
pub use registry::Registry;

/// Previous value that makes a release probe extract highlights even though
/// nothing changed remotely.
pub const FORCE_NOTES: &str = "force-notes";

/// Dotted three-component version with an optional `-prerelease` suffix.
pub static VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+(\.[0-9]+){2}(-[0-9A-Za-z.-]+)?").expect("version regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Extract release highlights when a new release shows up.
    pub include_notes: bool,
}

/// What a probe observed remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    /// Opaque value diffed against the previous run.
    pub current: String,
    pub message: String,
    pub links: BTreeMap<String, String>,
    pub highlights: Option<String>,
}

/// Every kind of source the tracker knows how to probe.
pub enum Probe {
    GithubRelease(GithubRelease),
    GithubCommit(GithubCommit),
    GithubPr(GithubPr),
    Brew(BrewFormula),
    Npm(NpmPackage),
}

impl Probe {
    /// Observe the source. `previous` only shapes the message, links and
    /// highlights; classification happens in the scheduler.
    pub async fn check(&self, previous: &str, opts: CheckOptions) -> CheckResult<ProbeResult> {
        match self {
            Probe::GithubRelease(p) => p.check(previous, opts).await,
            Probe::GithubCommit(p) => p.check(previous).await,
            Probe::GithubPr(p) => p.check().await,
            Probe::Brew(p) => p.check(previous).await,
            Probe::Npm(p) => p.check(previous).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Probe::GithubRelease(_) => "github-release",
            Probe::GithubCommit(_) => "github-commit",
            Probe::GithubPr(_) => "github-pr",
            Probe::Brew(_) => "brew",
            Probe::Npm(_) => "npm",
        }
    }
}

/// True when there is a previous value and it differs from `current`.
pub(crate) fn is_new(previous: &str, current: &str) -> bool {
    let prev = previous.trim();
    !prev.is_empty() && prev != current
}

pub fn short_sha(s: &str) -> &str {
    match s.char_indices().nth(12) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip markup from an HTML fragment, unescape entities and collapse
/// whitespace.
pub fn normalize_fragment(s: &str) -> String {
    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").expect("tag regex"));

    let stripped = RE_TAGS.replace_all(s, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
