// src/output.rs
//! Report renderers for the CLI.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::SecondsFormat;

use crate::report::{Report, ReportItem, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
    Markdown,
}

pub fn render(report: &Report, format: Format) -> Result<String> {
    match format {
        Format::Text => Ok(text(report)),
        Format::Json => json(report),
        Format::Markdown => Ok(markdown(report)),
    }
}

/// Error text for failed items, the probe message otherwise.
fn headline(it: &ReportItem) -> &str {
    match it.error.as_deref().map(str::trim) {
        Some(e) if it.status == Status::Error && !e.is_empty() => e,
        _ => &it.message,
    }
}

fn summary_line(report: &Report) -> String {
    let s = report.summary;
    format!("Summary: ok={} update={} error={}", s.ok, s.update, s.error)
}

/// One line per item followed by the summary.
pub fn text(report: &Report) -> String {
    let mut out = String::new();
    for it in &report.items {
        let _ = writeln!(
            out,
            "[{}] {} - {}",
            it.name,
            it.status.as_str().to_uppercase(),
            headline(it)
        );
    }
    let _ = writeln!(out, "{}", summary_line(report));
    out
}

pub fn json(report: &Report) -> Result<String> {
    let mut data = serde_json::to_string_pretty(report).context("encode report")?;
    data.push('\n');
    Ok(data)
}

/// Bulleted list with highlights nested under their item and links inline.
pub fn markdown(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Run: `{}`\n",
        report.run_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );

    for it in &report.items {
        let _ = write!(
            out,
            "- `{}` **{}** - {}",
            it.name,
            it.status.as_str().to_uppercase(),
            headline(it)
        );

        let highlights = it.highlights.as_deref().map(str::trim).unwrap_or_default();
        if !highlights.is_empty() {
            out.push_str("\n  - Highlights:\n");
            for line in highlights.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
                let _ = writeln!(out, "    {line}");
            }
        }

        if !it.links.is_empty() {
            out.push_str(if highlights.is_empty() { " - " } else { "  - " });
            let links: Vec<String> = it
                .links
                .iter()
                .map(|(k, v)| format!("[{k}]({v})"))
                .collect();
            out.push_str(&links.join(", "));
        }
        out.push('\n');
    }

    let _ = writeln!(out, "\n{}", summary_line(report));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn report() -> Report {
        let src = |name: &str| SourceConfig {
            name: name.into(),
            kind: "github".into(),
            mode: Some("release".into()),
            ..Default::default()
        };

        let mut up = ReportItem::for_source(&src("ripgrep"), Status::Update);
        up.message = "new release 14.1.0".into();
        up.highlights = Some("- Faster globbing\n- Fix crash".into());
        up.links.insert("repo".into(), "https://github.com/BurntSushi/ripgrep".into());

        let failed = ReportItem::failed(&src("fd"), "v9", "fetch x: http 500".into());

        let run_at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        Report::new(run_at, vec![up, failed], Duration::ZERO)
    }

    #[test]
    fn text_prefers_error_for_failed_items() {
        let out = text(&report());
        assert_eq!(
            out,
            "[ripgrep] UPDATE - new release 14.1.0\n\
             [fd] ERROR - fetch x: http 500\n\
             Summary: ok=0 update=1 error=1\n"
        );
    }

    #[test]
    fn markdown_nests_highlights_and_links() {
        let out = markdown(&report());
        assert!(out.starts_with("Run: `2025-01-02T03:04:05Z`\n\n"), "{out}");
        assert!(out.contains(
            "- `ripgrep` **UPDATE** - new release 14.1.0\n  - Highlights:\n    - Faster globbing\n    - Fix crash\n  - [repo](https://github.com/BurntSushi/ripgrep)\n"
        ));
        assert!(out.contains("- `fd` **ERROR** - fetch x: http 500\n"));
        assert!(out.ends_with("\nSummary: ok=0 update=1 error=1\n"));
    }

    #[test]
    fn json_is_camel_case_with_schema_version() {
        let out = json(&report()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["schemaVersion"], 1);
        assert_eq!(v["runAt"], "2025-01-02T03:04:05Z");
        assert_eq!(v["summary"]["update"], 1);
        assert_eq!(v["items"][1]["prev"], "v9");
        assert!(v.get("duration").is_none());
    }
}
