// src/transport/mod.rs
//! Outbound HTTP and process execution, plus the per-run result caches.

pub mod exec;
pub mod http;
pub mod mock;

pub use exec::{CachedRunner, CommandRunner, OsRunner};
pub use http::{CachedFetcher, Fetcher, HttpFetcher};
