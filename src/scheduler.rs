// src/scheduler.rs
//! Runs every configured source through its probe on a bounded worker pool
//! and turns the raw results into report items plus the next state.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, watch, Mutex};

use crate::config::{Config, RunDefaults, SourceConfig};
use crate::error::{CheckError, CheckResult};
use crate::local::{self, NOT_INSTALLED, UNKNOWN};
use crate::probe::{CheckOptions, Probe, ProbeResult, Registry, FORCE_NOTES, VERSION_RE};
use crate::report::{Report, ReportItem, Status};
use crate::state::{Observation, State};
use crate::transport::{CachedFetcher, CachedRunner, HttpFetcher, OsRunner};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("probe_attempts_total", "Probe calls, retries included.");
        describe_counter!(
            "probe_outcomes_total",
            "Classified sources, labelled by status."
        );
        describe_counter!(
            "cache_hits_total",
            "Fetch/exec calls answered from the per-run cache."
        );
        describe_histogram!(
            "probe_duration_ms",
            "Wall time per source, local check included."
        );
    });
}

struct Job {
    idx: usize,
    source: SourceConfig,
    prev: Observation,
}

type Outcome = (usize, ReportItem, Observation);

#[derive(Clone)]
pub struct Scheduler {
    registry: Registry,
    timeout: Duration,
    retries: u32,
    concurrency: usize,
    shell: String,
    opts: CheckOptions,
    run_at: DateTime<Utc>,
    cancel: watch::Receiver<bool>,
}

impl Scheduler {
    /// `cancel` flips to `true` to abort in-flight work. A receiver whose
    /// sender is gone never cancels.
    pub fn new(
        registry: Registry,
        defaults: &RunDefaults,
        opts: CheckOptions,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            timeout: defaults.timeout(),
            retries: defaults.retries,
            concurrency: defaults.concurrency,
            shell: defaults.shell.clone(),
            opts,
            run_at: Utc::now(),
            cancel,
        }
    }

    /// Check all `sources` against `previous`.
    ///
    /// Report items keep the order of `sources`. The returned state starts
    /// from `previous`, so entries for sources no longer configured survive.
    /// Every call is stamped with its own start time (`Report::run_at`).
    pub async fn run(&self, sources: &[SourceConfig], previous: &State) -> (Report, State) {
        ensure_metrics_described();
        let started = Instant::now();
        let this = Scheduler {
            run_at: Utc::now(),
            ..self.clone()
        };
        let total = sources.len();

        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for (idx, source) in sources.iter().enumerate() {
            let job = Job {
                idx,
                source: source.clone(),
                prev: previous.observation(&source.name),
            };
            // receiver is alive until the workers below drop it
            let _ = job_tx.send(job);
        }
        drop(job_tx);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let (res_tx, mut res_rx) = mpsc::unbounded_channel::<Outcome>();
        let workers = self.concurrency.min(total).max(1);
        tracing::debug!(sources = total, workers, "starting run");

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let this = this.clone();
            let jobs = job_rx.clone();
            let results = res_tx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let next = jobs.lock().await.recv().await;
                    let Some(job) = next else { break };
                    let (item, obs) = this.check_source(&job.source, &job.prev).await;
                    if results.send((job.idx, item, obs)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(res_tx);

        let mut slots: Vec<Option<ReportItem>> = vec![None; total];
        let mut next = previous.clone();
        while let Some((idx, item, obs)) = res_rx.recv().await {
            next.items.insert(item.name.clone(), obs);
            slots[idx] = Some(item);
        }
        for h in handles {
            if let Err(e) = h.await {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        let items = slots
            .into_iter()
            .zip(sources)
            .map(|(slot, source)| {
                slot.unwrap_or_else(|| {
                    let prev = previous.observation(&source.name);
                    ReportItem::failed(source, &prev.last_seen, "check aborted".to_string())
                })
            })
            .collect();

        (Report::new(this.run_at, items, started.elapsed()), next)
    }

    async fn check_source(
        &self,
        source: &SourceConfig,
        prev: &Observation,
    ) -> (ReportItem, Observation) {
        let started = Instant::now();
        let (item, obs) = self.classify(source, prev).await;

        histogram!("probe_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        counter!("probe_outcomes_total", "status" => item.status.as_str()).increment(1);
        match &item.error {
            Some(e) => tracing::warn!(source = %source.name, error = %e, "check failed"),
            None => tracing::info!(
                source = %source.name,
                status = %item.status,
                current = %item.current,
                "checked"
            ),
        }
        (item, obs)
    }

    async fn classify(&self, source: &SourceConfig, prev: &Observation) -> (ReportItem, Observation) {
        let probe = match self.registry.build(source) {
            Ok(p) => p,
            Err(e) => return self.failed(source, prev, e),
        };
        tracing::debug!(source = %source.name, kind = probe.kind(), "checking");
        let res = match self.check_with_retry(&source.name, &probe, &prev.last_seen).await {
            Ok(r) => r,
            Err(e) => return self.failed(source, prev, e),
        };

        let prev_seen = prev.last_seen.trim();
        let current = res.current.trim().to_string();
        let latest = normalize_latest(source, &current);

        let (local, local_error) = match source.local() {
            None => (String::new(), None),
            Some(l) => {
                let observed = self
                    .bounded(local::observe(&*self.registry.exec, &self.shell, source, l))
                    .await;
                match observed {
                    Ok(v) => (v.trim().to_string(), None),
                    Err(e) => {
                        tracing::debug!(source = %source.name, error = %e, "local check failed");
                        (String::new(), Some(e.to_string()))
                    }
                }
            }
        };

        let remote_changed = !prev_seen.is_empty() && !current.is_empty() && prev_seen != current;
        let status = if remote_changed || local_changed(source, &local, &latest) {
            Status::Update
        } else {
            Status::Ok
        };

        let mut highlights = res.highlights.filter(|h| !h.trim().is_empty());
        if status == Status::Update
            && !remote_changed
            && source.is_github("release")
            && highlights.is_none()
            && self.opts.include_notes
        {
            highlights = self.backfill_highlights(&probe).await;
        }

        let item = ReportItem {
            prev: prev_seen.to_string(),
            current: current.clone(),
            latest,
            local,
            message: res.message,
            links: res.links,
            highlights,
            local_error,
            ..ReportItem::for_source(source, status)
        };
        let obs = Observation {
            last_checked_at: Some(self.run_at),
            last_seen: current,
            last_status: Some(status),
            last_error: None,
        };
        (item, obs)
    }

    /// Up to `retries + 1` bounded attempts; stops early on success or on a
    /// non-retryable error.
    async fn check_with_retry(
        &self,
        name: &str,
        probe: &Probe,
        previous: &str,
    ) -> CheckResult<ProbeResult> {
        let attempts = self.retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            counter!("probe_attempts_total").increment(1);
            match self.bounded(probe.check(previous, self.opts)).await {
                Ok(r) => return Ok(r),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    tracing::debug!(
                        source = name,
                        kind = probe.kind(),
                        attempt,
                        error = %e,
                        "retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The local side is behind while the remote value is already known, so
    /// pull the notes for the current release once.
    async fn backfill_highlights(&self, probe: &Probe) -> Option<String> {
        let opts = CheckOptions { include_notes: true };
        match self.bounded(probe.check(FORCE_NOTES, opts)).await {
            Ok(r) => r.highlights.filter(|h| !h.trim().is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "highlight backfill failed");
                None
            }
        }
    }

    /// Race `fut` against the per-call deadline and the cancel signal.
    async fn bounded<T, F>(&self, fut: F) -> CheckResult<T>
    where
        F: Future<Output = CheckResult<T>>,
    {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(r) => r,
                Err(_) => Err(CheckError::Timeout(self.timeout)),
            },
            _ = cancelled(&mut cancel) => Err(CheckError::Cancelled),
        }
    }

    fn failed(
        &self,
        source: &SourceConfig,
        prev: &Observation,
        err: CheckError,
    ) -> (ReportItem, Observation) {
        let msg = err.to_string();
        let obs = Observation {
            last_checked_at: Some(self.run_at),
            last_seen: prev.last_seen.clone(),
            last_status: Some(Status::Error),
            last_error: Some(msg.clone()),
        };
        (ReportItem::failed(source, prev.last_seen.trim(), msg), obs)
    }
}

/// Resolves once the signal reads `true`; never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Value compared against the local observation: the version token of a
/// release title, otherwise the remote value itself.
pub fn normalize_latest(source: &SourceConfig, current: &str) -> String {
    let current = current.trim();
    if source.is_github("release") {
        if let Some(m) = VERSION_RE.find(current) {
            return m.as_str().to_string();
        }
    }
    current.to_string()
}

/// Whether the local observation lags behind `latest`.
pub fn local_changed(source: &SourceConfig, local: &str, latest: &str) -> bool {
    let (local, latest) = (local.trim(), latest.trim());
    if source.local().is_none() || local.is_empty() || local == UNKNOWN || latest.is_empty() {
        return false;
    }
    match source.kind.as_str() {
        // a short SHA matches its full form
        "github" if source.mode() == "commit" => {
            !(latest.starts_with(local) || local.starts_with(latest))
        }
        "npm" if local == NOT_INSTALLED => true,
        _ => local != latest,
    }
}

/// Check every source in `config` once with the production transport.
///
/// Fetches and commands are memoized for the duration of this call only.
pub async fn run_once(
    config: &Config,
    state: &State,
    opts: CheckOptions,
    cancel: watch::Receiver<bool>,
) -> anyhow::Result<(Report, State)> {
    let defaults = &config.defaults;
    let http = HttpFetcher::new(defaults.timeout()).context("building http client")?;
    let registry = Registry::new(
        Arc::new(CachedFetcher::new(Arc::new(http))),
        Arc::new(CachedRunner::new(Arc::new(OsRunner))),
        &defaults.user_agent,
    );
    let scheduler = Scheduler::new(registry, defaults, opts, cancel);
    Ok(scheduler.run(&config.sources, state).await)
}
