// src/transport/mock.rs
//! Scripted test doubles for [`Fetcher`] and [`CommandRunner`].
//!
//! Replies are keyed by URL (fetch) or by the space-joined command line
//! (exec). A key may hold a sequence of replies; the last one repeats.
//! Every call is recorded so tests can assert on outbound traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::exec::display_command;
use super::{CommandRunner, Fetcher};
use crate::error::{CheckError, CheckResult};

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    /// Non-2xx HTTP answer.
    Status(u16),
    /// Failed process (or, for fetches, an opaque transport failure).
    Fail { detail: String, stdout: String },
    /// Reports a deadline hit without waiting for one.
    Timeout,
    /// Sleeps before answering with `Ok`.
    Slow(Duration, String),
}

impl Reply {
    pub fn fail(detail: &str) -> Self {
        Reply::Fail {
            detail: detail.to_string(),
            stdout: String::new(),
        }
    }
}

#[derive(Default)]
struct Script {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
}

impl Script {
    fn push(&self, key: &str, replies: Vec<Reply>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), replies.into());
    }

    fn next(&self, key: &str) -> Option<Reply> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(key.to_string());
        let mut map = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = map.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn calls_to(&self, key: &str) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).iter().filter(|c| *c == key).count()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

async fn settle(key: &str, reply: Reply) -> CheckResult<String> {
    match reply {
        Reply::Ok(body) => Ok(body),
        Reply::Status(status) => Err(CheckError::HttpStatus {
            url: key.to_string(),
            status,
        }),
        Reply::Fail { detail, stdout } => Err(CheckError::Exec {
            command: key.to_string(),
            detail,
            stdout,
        }),
        Reply::Timeout => Err(CheckError::Timeout(Duration::from_secs(1))),
        Reply::Slow(delay, body) => {
            tokio::time::sleep(delay).await;
            Ok(body)
        }
    }
}

/// Fetcher answering from a URL → reply table. Unknown URLs get a 404.
#[derive(Default)]
pub struct MockFetcher {
    script: Script,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, url: &str, reply: Reply) -> Self {
        self.script.push(url, vec![reply]);
        self
    }

    pub fn replies(self, url: &str, replies: Vec<Reply>) -> Self {
        self.script.push(url, replies);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.script.calls_to(url)
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.calls()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get(&self, url: &str, _headers: &[(&str, &str)]) -> CheckResult<Vec<u8>> {
        let reply = self.script.next(url).unwrap_or(Reply::Status(404));
        settle(url, reply).await.map(String::into_bytes)
    }
}

/// Runner answering from a command-line → reply table.
#[derive(Default)]
pub struct MockRunner {
    script: Script,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// `command` is the program and its arguments joined by single spaces.
    pub fn reply(self, command: &str, reply: Reply) -> Self {
        self.script.push(command, vec![reply]);
        self
    }

    pub fn replies(self, command: &str, replies: Vec<Reply>) -> Self {
        self.script.push(command, replies);
        self
    }

    pub fn calls_to(&self, command: &str) -> usize {
        self.script.calls_to(command)
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.calls()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, program: &str, args: &[&str]) -> CheckResult<String> {
        let key = display_command(program, args);
        let reply = self
            .script
            .next(&key)
            .unwrap_or_else(|| Reply::fail("command not scripted"));
        settle(&key, reply).await
    }
}
