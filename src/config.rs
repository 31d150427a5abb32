// src/config.rs
//! Tracker configuration: TOML file shape, defaults, path resolution and
//! validation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_CONFIG_PATH: &str = "UPD_CONFIG_PATH";
pub const ENV_STATE_PATH: &str = "UPD_STATE_PATH";

const APP_DIR: &str = "update-tracker";
const DEFAULT_USER_AGENT: &str = "update-tracker/0.1";

/// Whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub defaults: RunDefaults,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_version() -> u32 {
    1
}

/// Run-wide knobs. Built once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunDefaults {
    /// Per-attempt deadline for every probe call and local check.
    pub timeout_seconds: u64,
    /// Extra attempts after the first failed one.
    pub retries: u32,
    pub concurrency: usize,
    pub user_agent: String,
    /// Shell used for `local.type = "command"`; invoked as `<shell> -lc <cmd>`.
    pub shell: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            timeout_seconds: 20,
            retries: 1,
            concurrency: 6,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            shell: std::env::var("SHELL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "/bin/sh".to_string()),
        }
    }
}

impl RunDefaults {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// One tracked source.
///
/// `type` and `mode` stay raw strings: mapping them to a probe is the
/// registry's job, and an unknown value must surface as that source's error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,

    // presentation hints, passed through to the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    // github
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<u64>,

    // brew
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    // npm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalCheck>,
}

/// Optional local observation compared against the remote value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalCheck {
    /// `command` | `git` | `npm`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

/// Trimmed view of an optional field; absent reads as "".
pub fn text(v: &Option<String>) -> &str {
    v.as_deref().map(str::trim).unwrap_or_default()
}

impl SourceConfig {
    pub fn mode(&self) -> &str {
        text(&self.mode)
    }

    pub fn is_github(&self, mode: &str) -> bool {
        self.kind == "github" && self.mode() == mode
    }

    /// Local check descriptor, if one is configured with a non-empty type.
    pub fn local(&self) -> Option<&LocalCheck> {
        self.local.as_ref().filter(|l| !l.kind.trim().is_empty())
    }
}

/// `$HOME/.config/update-tracker`, or `.` when no home is known.
pub fn default_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".config").join(APP_DIR),
        _ => PathBuf::from("."),
    }
}

/// Flag, then `$UPD_CONFIG_PATH`, then `<default_dir>/config.toml`.
pub fn resolve_config_path(flag: Option<&Path>) -> PathBuf {
    resolve(flag, ENV_CONFIG_PATH, "config.toml")
}

/// Flag, then `$UPD_STATE_PATH`, then `<default_dir>/state.json`.
pub fn resolve_state_path(flag: Option<&Path>) -> PathBuf {
    resolve(flag, ENV_STATE_PATH, "state.json")
}

fn resolve(flag: Option<&Path>, env_key: &str, file: &str) -> PathBuf {
    if let Some(p) = flag {
        return p.to_path_buf();
    }
    if let Ok(p) = std::env::var(env_key) {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    default_dir().join(file)
}

/// Read and parse a TOML config. Unknown keys are rejected.
pub fn load(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    parse(&content).with_context(|| format!("parsing config {}", path.display()))
}

pub fn parse(content: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(content)?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            bail!("config: version must be 1");
        }
        if self.sources.is_empty() {
            bail!("config: sources must not be empty");
        }
        let d = &self.defaults;
        if d.timeout_seconds == 0 {
            bail!("config: defaults.timeout_seconds must be > 0");
        }
        if d.concurrency == 0 {
            bail!("config: defaults.concurrency must be > 0");
        }
        if d.user_agent.trim().is_empty() {
            bail!("config: defaults.user_agent must not be empty");
        }

        let mut seen = HashSet::new();
        for (i, s) in self.sources.iter().enumerate() {
            if s.name.trim().is_empty() {
                bail!("config: sources[{i}].name is required");
            }
            if !seen.insert(s.name.as_str()) {
                bail!("config: duplicate source name: {}", s.name);
            }
            if !matches!(text(&s.display), "" | "compare" | "clawdbot") {
                bail!("config: sources[{i}].display must be compare|clawdbot (or empty)");
            }
            validate_source(i, s)?;
            if let Some(local) = s.local() {
                validate_local(i, local)?;
            }
        }
        Ok(())
    }
}

fn validate_source(i: usize, s: &SourceConfig) -> Result<()> {
    let local = s.local().map(|l| l.kind.trim());
    match s.kind.as_str() {
        "github" => {
            if text(&s.repo).is_empty() {
                bail!("config: sources[{i}].repo is required (github)");
            }
            if !text(&s.formula).is_empty() || !text(&s.package).is_empty() {
                bail!("config: sources[{i}] has fields not allowed for github");
            }
            match s.mode() {
                "release" => {
                    if s.pr.is_some() {
                        bail!("config: sources[{i}].pr is only allowed for github pr");
                    }
                    if local.is_some_and(|t| t != "command") {
                        bail!("config: sources[{i}].local.type must be command (github release)");
                    }
                }
                "commit" => {
                    if text(&s.branch).is_empty() {
                        bail!("config: sources[{i}].branch is required (github commit)");
                    }
                    if s.pr.is_some() {
                        bail!("config: sources[{i}].pr is only allowed for github pr");
                    }
                    if local.is_some_and(|t| t != "git") {
                        bail!("config: sources[{i}].local.type must be git (github commit)");
                    }
                }
                "pr" => {
                    if !s.pr.is_some_and(|n| n > 0) {
                        bail!("config: sources[{i}].pr must be a positive number (github pr)");
                    }
                    if local.is_some() {
                        bail!("config: sources[{i}].local not supported for github pr");
                    }
                }
                _ => bail!("config: sources[{i}].mode must be release|commit|pr (github)"),
            }
        }
        "brew" => {
            if text(&s.formula).is_empty() {
                bail!("config: sources[{i}].formula is required (brew)");
            }
            if !s.mode().is_empty() {
                bail!("config: sources[{i}].mode not allowed for type brew");
            }
            if !text(&s.repo).is_empty()
                || !text(&s.branch).is_empty()
                || !text(&s.package).is_empty()
                || s.pr.is_some()
            {
                bail!("config: sources[{i}] has fields not allowed for brew");
            }
            if local.is_some() {
                bail!("config: sources[{i}].local not supported for brew");
            }
        }
        "npm" => {
            if text(&s.package).is_empty() {
                bail!("config: sources[{i}].package is required (npm)");
            }
            if !s.mode().is_empty() {
                bail!("config: sources[{i}].mode not allowed for type npm");
            }
            if !text(&s.repo).is_empty()
                || !text(&s.branch).is_empty()
                || !text(&s.formula).is_empty()
                || s.pr.is_some()
            {
                bail!("config: sources[{i}] has fields not allowed for npm");
            }
            if local.is_some_and(|t| t != "npm") {
                bail!("config: sources[{i}].local.type must be npm (npm)");
            }
        }
        _ => bail!("config: sources[{i}].type must be github|brew|npm"),
    }
    Ok(())
}

fn validate_local(i: usize, l: &LocalCheck) -> Result<()> {
    match l.kind.trim() {
        "command" => {
            if text(&l.command).is_empty() {
                bail!("config: sources[{i}].local.command is required (command)");
            }
            if !text(&l.path).is_empty() || !text(&l.package).is_empty() {
                bail!("config: sources[{i}].local has fields not allowed for command");
            }
        }
        "git" => {
            if text(&l.path).is_empty() {
                bail!("config: sources[{i}].local.path is required (git)");
            }
            if !text(&l.command).is_empty()
                || !text(&l.regex).is_empty()
                || !text(&l.package).is_empty()
            {
                bail!("config: sources[{i}].local has fields not allowed for git");
            }
        }
        "npm" => {
            if !text(&l.command).is_empty() || !text(&l.regex).is_empty() || !text(&l.path).is_empty()
            {
                bail!("config: sources[{i}].local has fields not allowed for npm");
            }
        }
        _ => bail!("config: sources[{i}].local.type must be command|git|npm"),
    }
    Ok(())
}

/// Printed by `upd sample-config`.
pub const SAMPLE_CONFIG: &str = r#"version = 1

[defaults]
timeout_seconds = 20
retries = 1
concurrency = 6
user_agent = "update-tracker/0.1"

# GitHub release feed, compared with the locally installed binary.
[[sources]]
name = "ripgrep"
type = "github"
mode = "release"
repo = "BurntSushi/ripgrep"
label = "ripgrep"
display = "compare"

[sources.local]
type = "command"
command = "rg --version"

# Branch tip, compared with a local clone.
[[sources]]
name = "neovim-master"
type = "github"
mode = "commit"
repo = "neovim/neovim"
branch = "master"

[sources.local]
type = "git"
path = "~/src/neovim"

# Pull request lifecycle + CI checks.
[[sources]]
name = "tokio-pr"
type = "github"
mode = "pr"
repo = "tokio-rs/tokio"
pr = 6000

[[sources]]
name = "jq"
type = "brew"
formula = "jq"

[[sources]]
name = "typescript"
type = "npm"
package = "typescript"
group = "node"

[sources.local]
type = "npm"
"#;
