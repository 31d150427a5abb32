// src/local.rs
//! Local side of a source: what is installed or checked out on this machine.

use std::path::PathBuf;

use regex::Regex;
use serde_json::Value;

use crate::config::{text, LocalCheck, SourceConfig};
use crate::error::{CheckError, CheckResult};
use crate::probe::VERSION_RE;
use crate::transport::CommandRunner;

/// Local value that could be read but carried no recognizable version.
pub const UNKNOWN: &str = "unknown";
/// Local npm value for a package that is not installed globally.
pub const NOT_INSTALLED: &str = "not-installed";

/// Observe the local value for `source`.
///
/// The caller bounds this with the per-call deadline; any error becomes the
/// item's `localError` and never the source's status.
pub async fn observe(
    exec: &dyn CommandRunner,
    shell: &str,
    source: &SourceConfig,
    local: &LocalCheck,
) -> CheckResult<String> {
    match local.kind.trim() {
        "command" => command(exec, shell, local).await,
        "git" => git(exec, local).await,
        "npm" => npm(exec, source, local).await,
        other => Err(CheckError::Unsupported(format!("unknown local.type: {other}"))),
    }
}

async fn command(exec: &dyn CommandRunner, shell: &str, local: &LocalCheck) -> CheckResult<String> {
    // Login shell so PATH additions from the user's profile apply.
    let out = exec.run(shell, &["-lc", text(&local.command)]).await?;
    let out = out.trim();
    if out.is_empty() {
        return Ok(UNKNOWN.to_string());
    }

    let found = match text(&local.regex) {
        "" => VERSION_RE.find(out).map(|m| m.as_str().to_string()),
        pattern => Regex::new(pattern)?.find(out).map(|m| m.as_str().to_string()),
    };
    Ok(found.unwrap_or_else(|| UNKNOWN.to_string()))
}

async fn git(exec: &dyn CommandRunner, local: &LocalCheck) -> CheckResult<String> {
    let path = expand_home(text(&local.path));
    let path = path.to_string_lossy();
    let out = exec.run("git", &["-C", &path, "rev-parse", "HEAD"]).await?;
    match out.trim() {
        "" => Ok(UNKNOWN.to_string()),
        sha => Ok(sha.to_string()),
    }
}

async fn npm(
    exec: &dyn CommandRunner,
    source: &SourceConfig,
    local: &LocalCheck,
) -> CheckResult<String> {
    let package = match text(&local.package) {
        "" => text(&source.package),
        p => p,
    };
    if package.is_empty() {
        return Err(CheckError::Missing("missing npm package".into()));
    }

    let result = exec
        .run("npm", &["list", package, "--depth=0", "-g", "--json"])
        .await;

    // npm exits non-zero for missing packages but still prints JSON.
    let stdout = match &result {
        Ok(out) => out.as_str(),
        Err(CheckError::Exec { stdout, .. }) => stdout.as_str(),
        Err(_) => "",
    };
    if let Some(v) = installed_version(stdout, package) {
        return Ok(v);
    }

    match result {
        Ok(_) => Ok(UNKNOWN.to_string()),
        Err(e) => {
            let msg = match &e {
                CheckError::Exec { detail, .. } => detail.to_lowercase(),
                other => other.to_string().to_lowercase(),
            };
            if ["missing", "not installed", "empty"]
                .iter()
                .any(|m| msg.contains(m))
            {
                Ok(NOT_INSTALLED.to_string())
            } else {
                Err(e)
            }
        }
    }
}

/// `dependencies.<package>.version` from `npm list --json` output.
fn installed_version(stdout: &str, package: &str) -> Option<String> {
    let v: Value = serde_json::from_str(stdout.trim()).ok()?;
    let version = v
        .get("dependencies")?
        .get(package)?
        .get("version")?
        .as_str()?
        .trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) if !home.is_empty() => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}
