// src/probe/providers/brew.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{CheckError, CheckResult};
use crate::probe::{is_new, ProbeResult};
use crate::transport::CommandRunner;

#[derive(Debug, Deserialize)]
struct BrewInfoV2 {
    #[serde(default)]
    formulae: Vec<Formula>,
}

#[derive(Debug, Deserialize)]
struct Formula {
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    versions: Versions,
}

#[derive(Debug, Default, Deserialize)]
struct Versions {
    #[serde(default)]
    stable: Option<String>,
}

/// Stable version of a Homebrew formula.
pub struct BrewFormula {
    pub exec: Arc<dyn CommandRunner>,
    pub formula: String,
}

impl BrewFormula {
    pub async fn check(&self, previous: &str) -> CheckResult<ProbeResult> {
        let out = self
            .exec
            .run("brew", &["info", "--json=v2", &self.formula])
            .await?;
        let info: BrewInfoV2 = serde_json::from_str(&out)
            .map_err(|e| CheckError::Parse(format!("brew info json: {e}")))?;

        let formula = info
            .formulae
            .into_iter()
            .next()
            .ok_or_else(|| CheckError::Missing("brew info json: missing formulae".into()))?;
        let version = formula
            .versions
            .stable
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CheckError::Missing("brew info: missing stable version".into()))?
            .to_string();

        let mut links = BTreeMap::new();
        if let Some(home) = formula.homepage.filter(|h| !h.trim().is_empty()) {
            links.insert("homepage".to_string(), home);
        }

        let message = if is_new(previous, &version) {
            format!("new version {version}")
        } else {
            format!("latest stable {version}")
        };
        Ok(ProbeResult {
            current: version,
            message,
            links,
            highlights: None,
        })
    }
}
