// src/transport/http.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::OnceCell;

use crate::error::{CheckError, CheckResult};

/// Outbound HTTP GET.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns the response body of a 2xx answer; anything else is an error.
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<Vec<u8>>;
}

/// Production fetcher on top of a shared `reqwest::Client`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<Vec<u8>> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let network = |source| CheckError::Network {
            url: url.to_string(),
            source,
        };
        let resp = req.send().await.map_err(network)?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(network)?;

        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "non-success response");
            return Err(CheckError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(body.to_vec())
    }
}

/// Memoizes successful GETs by URL for the lifetime of one run.
///
/// Concurrent requests for the same URL share one underlying call. Failures
/// are not stored, so the next caller tries again.
pub struct CachedFetcher {
    inner: Arc<dyn Fetcher>,
    entries: Mutex<HashMap<String, Arc<OnceCell<Vec<u8>>>>>,
}

impl CachedFetcher {
    pub fn new(inner: Arc<dyn Fetcher>) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, url: &str) -> Arc<OnceCell<Vec<u8>>> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(url.to_string()).or_default().clone()
    }
}

#[async_trait]
impl Fetcher for CachedFetcher {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> CheckResult<Vec<u8>> {
        let slot = self.slot(url);
        // waiters on an in-flight fill count as hits too
        let mut filled = false;
        let res = slot
            .get_or_try_init(|| {
                filled = true;
                self.inner.get(url, headers)
            })
            .await
            .cloned();
        if res.is_ok() && !filled {
            tracing::trace!(%url, "fetch cache hit");
            counter!("cache_hits_total", "kind" => "fetch").increment(1);
        }
        res
    }
}
