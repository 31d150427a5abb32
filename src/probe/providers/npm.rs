// src/probe/providers/npm.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CheckError, CheckResult};
use crate::probe::{is_new, ProbeResult};
use crate::transport::CommandRunner;

/// Version published on the npm registry.
pub struct NpmPackage {
    pub exec: Arc<dyn CommandRunner>,
    pub package: String,
}

impl NpmPackage {
    pub async fn check(&self, previous: &str) -> CheckResult<ProbeResult> {
        let out = self
            .exec
            .run("npm", &["view", &self.package, "version"])
            .await?;
        let version = out.trim().to_string();
        if version.is_empty() {
            return Err(CheckError::Missing("npm view: empty version".into()));
        }

        let links = BTreeMap::from([(
            "npm".to_string(),
            format!("https://www.npmjs.com/package/{}", self.package),
        )]);
        let message = if is_new(previous, &version) {
            format!("new version {version}")
        } else {
            format!("latest {version}")
        };
        Ok(ProbeResult {
            current: version,
            message,
            links,
            highlights: None,
        })
    }
}
