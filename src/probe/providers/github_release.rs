// src/probe/providers/github_release.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use super::github_commit::GithubCommit;
use crate::error::{CheckError, CheckResult};
use crate::probe::{is_new, normalize_fragment, CheckOptions, ProbeResult};
use crate::transport::Fetcher;

const MAX_HIGHLIGHTS: usize = 6;
const MAX_HIGHLIGHT_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: Option<Content>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "$text", default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: String,
}

/// Latest entry of a repository's release Atom feed. Repositories without
/// releases are tracked by their branch tip instead.
pub struct GithubRelease {
    pub http: Arc<dyn Fetcher>,
    pub user_agent: String,
    pub repo: String,
    pub fallback: GithubCommit,
}

impl GithubRelease {
    pub async fn check(&self, previous: &str, opts: CheckOptions) -> CheckResult<ProbeResult> {
        let repo_url = format!("https://github.com/{}", self.repo);
        let feed_url = format!("{repo_url}/releases.atom");

        let body = self
            .http
            .get(&feed_url, &[("User-Agent", self.user_agent.as_str())])
            .await?;
        let xml = String::from_utf8_lossy(&body);
        let feed: Feed =
            from_str(&xml).map_err(|e| CheckError::Parse(format!("parse atom: {e}")))?;

        let Some(entry) = feed.entries.into_iter().next() else {
            tracing::debug!(repo = %self.repo, "no releases; falling back to branch tip");
            let mut fb = self
                .fallback
                .check(previous)
                .await
                .map_err(|e| CheckError::NoReleasesFallback(Box::new(e)))?;
            fb.links.insert("feed".to_string(), feed_url);
            fb.message = format!("no releases; {}", fb.message);
            return Ok(fb);
        };

        let title = match entry.title.trim() {
            "" => entry.id.trim().to_string(),
            t => t.to_string(),
        };
        if title.is_empty() {
            return Err(CheckError::Missing("atom: missing entry title/id".into()));
        }

        let release_link = entry
            .links
            .iter()
            .find(|l| l.rel.is_empty() || l.rel == "alternate")
            .or_else(|| entry.links.first())
            .map(|l| l.href.clone())
            .filter(|h| !h.is_empty());

        let mut links = BTreeMap::from([
            ("repo".to_string(), repo_url),
            ("feed".to_string(), feed_url),
        ]);
        if let Some(href) = release_link {
            links.insert("release".to_string(), href);
        }

        let mut highlights = None;
        let message = if is_new(previous, &title) {
            if opts.include_notes {
                let html = entry.content.as_ref().map(|c| c.body.as_str()).unwrap_or("");
                highlights = extract_highlights(html);
            }
            format!("new release {title}")
        } else {
            format!("latest release {title}")
        };

        Ok(ProbeResult {
            current: title,
            message,
            links,
            highlights,
        })
    }
}

/// Bullet points from the "Highlights" section of release notes HTML.
///
/// Starts at the first mention of "highlights" (whole document if there is
/// none, or if no list items follow it). At most six bullets, 500 chars.
pub fn extract_highlights(html: &str) -> Option<String> {
    static RE_LI: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)<li[^>]*>(.*?)</li>").expect("li regex"));

    let raw = html.trim();
    if raw.is_empty() {
        return None;
    }

    // ASCII lowercasing keeps byte offsets aligned with `raw`.
    let section = match raw.to_ascii_lowercase().find("highlights") {
        Some(idx) => &raw[idx..],
        None => raw,
    };
    let mut items: Vec<&str> = RE_LI
        .captures_iter(section)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if items.is_empty() && section.len() != raw.len() {
        items = RE_LI
            .captures_iter(raw)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
    }

    let lines: Vec<String> = items
        .into_iter()
        .map(normalize_fragment)
        .filter(|t| !t.is_empty())
        .take(MAX_HIGHLIGHTS)
        .map(|t| format!("- {t}"))
        .collect();
    if lines.is_empty() {
        return None;
    }

    let out = lines.join("\n");
    if out.chars().count() > MAX_HIGHLIGHT_CHARS {
        let cut: String = out.chars().take(MAX_HIGHLIGHT_CHARS).collect();
        return Some(format!("{cut}..."));
    }
    Some(out)
}
