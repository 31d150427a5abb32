// src/report.rs
//! Per-run report: one classified item per configured source.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Update,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Update => "update",
            Status::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_empty(s: &str) -> bool {
    s.is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub prev: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub current: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub latest: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub local: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
    /// Remote probe failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Local check failure; advisory only, never changes `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_error: Option<String>,
}

impl ReportItem {
    /// Item carrying the source's identity and presentation hints, with
    /// every observed field empty.
    pub fn for_source(source: &SourceConfig, status: Status) -> Self {
        Self {
            name: source.name.clone(),
            kind: source.kind.clone(),
            mode: source.mode.clone(),
            label: source.label.clone(),
            group: source.group.clone(),
            display: source.display.clone(),
            status,
            prev: String::new(),
            current: String::new(),
            latest: String::new(),
            local: String::new(),
            message: String::new(),
            links: BTreeMap::new(),
            highlights: None,
            error: None,
            local_error: None,
        }
    }

    pub fn failed(source: &SourceConfig, prev: &str, error: String) -> Self {
        Self {
            prev: prev.to_string(),
            message: "ERROR".to_string(),
            error: Some(error),
            ..Self::for_source(source, Status::Error)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub ok: usize,
    pub update: usize,
    pub error: usize,
}

impl Summary {
    pub fn count(items: &[ReportItem]) -> Self {
        let mut s = Summary::default();
        for it in items {
            match it.status {
                Status::Ok => s.ok += 1,
                Status::Update => s.update += 1,
                Status::Error => s.error += 1,
            }
        }
        s
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub schema_version: u32,
    pub run_at: DateTime<Utc>,
    pub summary: Summary,
    pub items: Vec<ReportItem>,
    #[serde(skip)]
    pub duration: Duration,
}

impl Report {
    pub fn new(run_at: DateTime<Utc>, items: Vec<ReportItem>, duration: Duration) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_at,
            summary: Summary::count(&items),
            items,
            duration,
        }
    }

    /// Copy holding only update/error items, with the summary recounted.
    pub fn only_updates(&self) -> Self {
        let items: Vec<ReportItem> = self
            .items
            .iter()
            .filter(|it| it.status != Status::Ok)
            .cloned()
            .collect();
        Self {
            summary: Summary::count(&items),
            items,
            ..self.clone()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.summary.error > 0
    }
}
