// src/state.rs
//! Last observed value per source, persisted as JSON between runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::Status;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub items: BTreeMap<String, Observation>,
}

/// What the previous run saw for one source. The default value stands for
/// "never checked".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl State {
    /// Previous observation for `name`, or the empty one on first run.
    pub fn observation(&self, name: &str) -> Observation {
        self.items.get(name).cloned().unwrap_or_default()
    }
}

/// Missing or empty file reads as empty state; malformed JSON is an error.
pub fn load(path: &Path) -> Result<State> {
    let data = match fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(State::default()),
        Err(e) => return Err(e).with_context(|| format!("read state {}", path.display())),
    };
    if data.trim().is_empty() {
        return Ok(State::default());
    }
    serde_json::from_str(&data).with_context(|| format!("parse state {}", path.display()))
}

/// Replace the state file with `state`, creating parent directories.
pub fn save(path: &Path, state: &State) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create state dir {}", dir.display()))?;
    }
    let mut data = serde_json::to_string_pretty(state).context("encode state")?;
    data.push('\n');

    // Write next to the target, then rename, so a crash never leaves half a file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).with_context(|| format!("write state {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
