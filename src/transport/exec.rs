// src/transport/exec.rs
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use metrics::counter;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::error::{CheckError, CheckResult};

/// Key separator; cannot occur inside a real argv element.
const KEY_SEP: char = '\0';

/// Runs an external program and returns its trimmed stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> CheckResult<String>;
}

/// Human-readable form of an invocation, used in error messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut out = program.to_string();
    for a in args {
        out.push(' ');
        out.push_str(a);
    }
    out
}

/// Spawns real processes. The child is killed if the returned future is
/// dropped, so an expired deadline does not leave stragglers behind.
pub struct OsRunner;

#[async_trait]
impl CommandRunner for OsRunner {
    async fn run(&self, program: &str, args: &[&str]) -> CheckResult<String> {
        let command = display_command(program, args);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CheckError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let text = if stderr.is_empty() { &stdout } else { &stderr };
        let detail = if text.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {}", output.status, text)
        };
        tracing::debug!(%command, %detail, "command failed");
        Err(CheckError::Exec {
            command,
            detail,
            stdout,
        })
    }
}

/// Memoizes successful invocations by program + argv for one run.
pub struct CachedRunner {
    inner: Arc<dyn CommandRunner>,
    entries: Mutex<HashMap<String, Arc<OnceCell<String>>>>,
}

impl CachedRunner {
    pub fn new(inner: Arc<dyn CommandRunner>) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: String) -> Arc<OnceCell<String>> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key).or_default().clone()
    }
}

fn cache_key(program: &str, args: &[&str]) -> String {
    let mut key = program.to_string();
    for a in args {
        key.push(KEY_SEP);
        key.push_str(a);
    }
    key
}

#[async_trait]
impl CommandRunner for CachedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> CheckResult<String> {
        let slot = self.slot(cache_key(program, args));
        // waiters on an in-flight fill count as hits too
        let mut filled = false;
        let res = slot
            .get_or_try_init(|| {
                filled = true;
                self.inner.run(program, args)
            })
            .await
            .cloned();
        if res.is_ok() && !filled {
            tracing::trace!(program, "exec cache hit");
            counter!("cache_hits_total", "kind" => "exec").increment(1);
        }
        res
    }
}
