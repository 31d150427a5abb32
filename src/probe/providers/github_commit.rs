// src/probe/providers/github_commit.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CheckError, CheckResult};
use crate::probe::{is_new, short_sha, ProbeResult};
use crate::transport::CommandRunner;

/// Tip of a branch, resolved with `git ls-remote`.
pub struct GithubCommit {
    pub exec: Arc<dyn CommandRunner>,
    pub repo: String,
    pub branch: String,
}

impl GithubCommit {
    pub async fn check(&self, previous: &str) -> CheckResult<ProbeResult> {
        let repo_url = format!("https://github.com/{}", self.repo);
        let remote = format!("{repo_url}.git");
        let reference = format!("refs/heads/{}", self.branch);

        let out = self
            .exec
            .run("git", &["ls-remote", &remote, &reference])
            .await?;
        let sha = out
            .split_whitespace()
            .next()
            .ok_or_else(|| CheckError::Missing("git ls-remote: empty output".into()))?
            .to_string();

        let mut links = BTreeMap::from([("repo".to_string(), repo_url.clone())]);
        let prev = previous.trim();
        let message = if is_new(prev, &sha) {
            links.insert(
                "compare".to_string(),
                format!("{repo_url}/compare/{prev}...{sha}"),
            );
            format!(
                "new commits on {} ({} -> {})",
                self.branch,
                short_sha(prev),
                short_sha(&sha)
            )
        } else {
            format!("latest commit on {} ({})", self.branch, short_sha(&sha))
        };

        Ok(ProbeResult {
            current: sha,
            message,
            links,
            highlights: None,
        })
    }
}
