// src/probe/registry.rs
use std::sync::Arc;

use crate::config::{text, SourceConfig};
use crate::error::{CheckError, CheckResult};
use crate::probe::{BrewFormula, GithubCommit, GithubPr, GithubRelease, NpmPackage, Probe};
use crate::transport::{CommandRunner, Fetcher};

const DEFAULT_BRANCH: &str = "main";

/// Builds probes from source configs, sharing one fetcher, one command runner
/// and one user agent across all of them.
#[derive(Clone)]
pub struct Registry {
    pub http: Arc<dyn Fetcher>,
    pub exec: Arc<dyn CommandRunner>,
    pub user_agent: String,
}

impl Registry {
    pub fn new(http: Arc<dyn Fetcher>, exec: Arc<dyn CommandRunner>, user_agent: &str) -> Self {
        Self {
            http,
            exec,
            user_agent: user_agent.to_string(),
        }
    }

    /// Pure mapping from config shape to probe; performs no I/O.
    pub fn build(&self, source: &SourceConfig) -> CheckResult<Probe> {
        let repo = text(&source.repo).to_string();
        match source.kind.as_str() {
            "github" => match source.mode() {
                "commit" => Ok(Probe::GithubCommit(self.commit(repo, text(&source.branch)))),
                "release" => {
                    let branch = match text(&source.branch) {
                        "" => DEFAULT_BRANCH,
                        b => b,
                    };
                    Ok(Probe::GithubRelease(GithubRelease {
                        http: self.http.clone(),
                        user_agent: self.user_agent.clone(),
                        fallback: self.commit(repo.clone(), branch),
                        repo,
                    }))
                }
                "pr" => match source.pr {
                    Some(number) if number > 0 => Ok(Probe::GithubPr(GithubPr {
                        http: self.http.clone(),
                        user_agent: self.user_agent.clone(),
                        repo,
                        number,
                    })),
                    _ => Err(CheckError::Unsupported(format!(
                        "source {}: github pr needs a positive pr number",
                        source.name
                    ))),
                },
                _ => Err(CheckError::Unsupported(format!(
                    "source {}: github mode must be release|commit|pr",
                    source.name
                ))),
            },
            "brew" => Ok(Probe::Brew(BrewFormula {
                exec: self.exec.clone(),
                formula: text(&source.formula).to_string(),
            })),
            "npm" => Ok(Probe::Npm(NpmPackage {
                exec: self.exec.clone(),
                package: text(&source.package).to_string(),
            })),
            other => Err(CheckError::Unsupported(format!(
                "source {}: unknown type: {other}",
                source.name
            ))),
        }
    }

    fn commit(&self, repo: String, branch: &str) -> GithubCommit {
        GithubCommit {
            exec: self.exec.clone(),
            repo,
            branch: branch.to_string(),
        }
    }
}
