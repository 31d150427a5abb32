// src/probe/providers/github_pr.rs
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{CheckError, CheckResult};
use crate::probe::ProbeResult;
use crate::transport::Fetcher;

const API: &str = "https://api.github.com/repos";

#[derive(Debug, Deserialize)]
struct PullResp {
    #[serde(default)]
    number: u64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    head: Head,
}

#[derive(Debug, Default, Deserialize)]
struct Head {
    #[serde(default)]
    sha: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckRunsResp {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub check_runs: Vec<CheckRun>,
}

#[derive(Debug, Deserialize)]
pub struct CheckRun {
    #[serde(default)]
    pub status: String,
    pub conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CombinedStatusResp {
    #[serde(default)]
    state: String,
}

/// Aggregate CI state of a pull request's head commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksSummary {
    Success,
    Failure,
    Pending,
    None,
    /// The checks could not be fetched at all.
    Unknown,
}

impl ChecksSummary {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecksSummary::Success => "success",
            ChecksSummary::Failure => "failure",
            ChecksSummary::Pending => "pending",
            ChecksSummary::None => "none",
            ChecksSummary::Unknown => "unknown",
        }
    }

    /// Fold check runs. Anything still running, or with a conclusion we do
    /// not recognize, keeps the whole set pending. `None` when there are no
    /// runs at all.
    pub fn from_check_runs(runs: &CheckRunsResp) -> Option<Self> {
        if runs.total_count == 0 || runs.check_runs.is_empty() {
            return None;
        }

        let (mut pending, mut failure, mut success) = (false, false, false);
        for run in &runs.check_runs {
            if !run.status.trim().eq_ignore_ascii_case("completed") {
                pending = true;
                continue;
            }
            let Some(conclusion) = run.conclusion.as_deref() else {
                pending = true;
                continue;
            };
            match conclusion.trim().to_ascii_lowercase().as_str() {
                "success" | "neutral" | "skipped" => success = true,
                "failure" | "cancelled" | "timed_out" | "action_required" | "startup_failure"
                | "stale" => failure = true,
                _ => pending = true,
            }
        }

        Some(if pending {
            ChecksSummary::Pending
        } else if failure {
            ChecksSummary::Failure
        } else if success {
            ChecksSummary::Success
        } else {
            ChecksSummary::None
        })
    }

    pub fn from_combined_status(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "success" => ChecksSummary::Success,
            "failure" | "error" => ChecksSummary::Failure,
            "pending" => ChecksSummary::Pending,
            _ => ChecksSummary::None,
        }
    }
}

impl fmt::Display for ChecksSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle and CI state of one pull request.
///
/// The observed value deliberately leaves out the head SHA: new pushes alone
/// are not an update, only state, draft or checks transitions are.
pub struct GithubPr {
    pub http: Arc<dyn Fetcher>,
    pub user_agent: String,
    pub repo: String,
    pub number: u64,
}

impl GithubPr {
    fn headers(&self) -> [(&str, &str); 2] {
        [
            ("User-Agent", self.user_agent.as_str()),
            ("Accept", "application/vnd.github+json"),
        ]
    }

    pub async fn check(&self) -> CheckResult<ProbeResult> {
        let pr_url = format!("{API}/{}/pulls/{}", self.repo, self.number);
        let body = self.http.get(&pr_url, &self.headers()).await?;
        let pr: PullResp = serde_json::from_slice(&body)
            .map_err(|e| CheckError::Parse(format!("parse pr json: {e}")))?;

        let head_sha = pr.head.sha.trim();
        if head_sha.is_empty() {
            return Err(CheckError::Missing("pr: missing head sha".into()));
        }
        let number = if pr.number == 0 { self.number } else { pr.number };

        let state = if pr.merged {
            "merged".to_string()
        } else {
            match pr.state.trim().to_ascii_lowercase() {
                s if s.is_empty() => "unknown".to_string(),
                s => s,
            }
        };

        let checks = self.checks_summary(head_sha).await;

        let repo_url = format!("https://github.com/{}", self.repo);
        let pr_link = match pr.html_url.trim() {
            "" => format!("{repo_url}/pull/{number}"),
            u => u.to_string(),
        };

        let message = if pr.draft {
            format!("PR #{number} {state} (draft), checks={checks}")
        } else {
            format!("PR #{number} {state}, checks={checks}")
        };

        Ok(ProbeResult {
            current: format!("{state}|draft={}|checks={checks}", pr.draft),
            message,
            links: BTreeMap::from([
                ("repo".to_string(), repo_url),
                ("pr".to_string(), pr_link),
            ]),
            highlights: None,
        })
    }

    /// Check runs first (GitHub Actions), combined commit status as fallback.
    /// Never fails: an unreachable checks API degrades to `unknown`.
    async fn checks_summary(&self, sha: &str) -> ChecksSummary {
        let runs_url = format!(
            "{API}/{}/commits/{sha}/check-runs?per_page=100",
            self.repo
        );
        match self.http.get(&runs_url, &self.headers()).await {
            Ok(body) => match serde_json::from_slice::<CheckRunsResp>(&body) {
                Ok(runs) => {
                    if let Some(summary) = ChecksSummary::from_check_runs(&runs) {
                        return summary;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "unparseable check-runs response"),
            },
            Err(e) => tracing::debug!(error = %e, "check-runs unavailable, trying status"),
        }

        let status_url = format!("{API}/{}/commits/{sha}/status", self.repo);
        let body = match self.http.get(&status_url, &self.headers()).await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "commit status unavailable");
                return ChecksSummary::Unknown;
            }
        };
        match serde_json::from_slice::<CombinedStatusResp>(&body) {
            Ok(st) => ChecksSummary::from_combined_status(&st.state),
            Err(_) => ChecksSummary::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(items: &[(&str, Option<&str>)]) -> CheckRunsResp {
        CheckRunsResp {
            total_count: items.len() as u64,
            check_runs: items
                .iter()
                .map(|(status, conclusion)| CheckRun {
                    status: status.to_string(),
                    conclusion: conclusion.map(str::to_string),
                })
                .collect(),
        }
    }

    #[test]
    fn pending_wins_over_failure() {
        let r = runs(&[("completed", Some("failure")), ("in_progress", None)]);
        assert_eq!(ChecksSummary::from_check_runs(&r), Some(ChecksSummary::Pending));
    }

    #[test]
    fn completed_without_conclusion_is_pending() {
        let r = runs(&[("completed", None), ("completed", Some("success"))]);
        assert_eq!(ChecksSummary::from_check_runs(&r), Some(ChecksSummary::Pending));
    }

    #[test]
    fn unknown_conclusion_never_reports_failure() {
        let r = runs(&[("completed", Some("brand_new_state"))]);
        assert_eq!(ChecksSummary::from_check_runs(&r), Some(ChecksSummary::Pending));
    }

    #[test]
    fn failure_like_conclusions() {
        for c in ["failure", "cancelled", "timed_out", "action_required", "startup_failure", "stale"] {
            let r = runs(&[("completed", Some("success")), ("completed", Some(c))]);
            assert_eq!(ChecksSummary::from_check_runs(&r), Some(ChecksSummary::Failure), "{c}");
        }
    }

    #[test]
    fn success_like_conclusions() {
        let r = runs(&[
            ("completed", Some("success")),
            ("completed", Some("neutral")),
            ("completed", Some("SKIPPED")),
        ]);
        assert_eq!(ChecksSummary::from_check_runs(&r), Some(ChecksSummary::Success));
    }

    #[test]
    fn no_runs_means_fallback() {
        assert_eq!(ChecksSummary::from_check_runs(&runs(&[])), None);
    }

    #[test]
    fn combined_status_mapping() {
        assert_eq!(ChecksSummary::from_combined_status("success"), ChecksSummary::Success);
        assert_eq!(ChecksSummary::from_combined_status("error"), ChecksSummary::Failure);
        assert_eq!(ChecksSummary::from_combined_status("failure"), ChecksSummary::Failure);
        assert_eq!(ChecksSummary::from_combined_status("pending"), ChecksSummary::Pending);
        assert_eq!(ChecksSummary::from_combined_status(""), ChecksSummary::None);
    }
}
