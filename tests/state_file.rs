// tests/state_file.rs
use std::sync::Arc;

use tokio::sync::watch;
use update_tracker::config::{RunDefaults, SourceConfig};
use update_tracker::transport::mock::{MockFetcher, MockRunner, Reply};
use update_tracker::{state, CheckOptions, Registry, Scheduler, Status};

#[tokio::test]
async fn run_save_load_run_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let exec = Arc::new(MockRunner::new().reply("npm view typescript version", Reply::Ok("5.4.5".into())));
    let (_tx, rx) = watch::channel(false);
    let registry = Registry::new(Arc::new(MockFetcher::new()), exec, "ua");
    let s = Scheduler::new(registry, &RunDefaults::default(), CheckOptions::default(), rx);
    let sources = [SourceConfig {
        name: "typescript".into(),
        kind: "npm".into(),
        package: Some("typescript".into()),
        ..Default::default()
    }];

    let first = state::load(&path).unwrap();
    let (_, next) = s.run(&sources, &first).await;
    state::save(&path, &next).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"lastSeen\": \"5.4.5\""), "{raw}");
    assert!(raw.ends_with('\n'));

    let loaded = state::load(&path).unwrap();
    assert_eq!(loaded, next);
    let (report, _) = s.run(&sources, &loaded).await;
    assert_eq!(report.items[0].status, Status::Ok);
}
