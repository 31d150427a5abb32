// tests/config_load.rs
use std::fs;

use update_tracker::config::{self, SAMPLE_CONFIG};

#[test]
fn sample_config_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, SAMPLE_CONFIG).unwrap();

    let cfg = config::load(&path).unwrap();
    cfg.validate().unwrap();
    let names: Vec<&str> = cfg.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["ripgrep", "neovim-master", "tokio-pr", "jq", "typescript"]);
    assert_eq!(cfg.sources[1].local().unwrap().kind, "git");
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    let err = config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("nope.toml"), "{err:#}");
}

#[test]
fn unknown_type_fails_validation_but_parses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
version = 1

[[sources]]
name = "crate"
type = "cargo"
"#,
    )
    .unwrap();

    let cfg = config::load(&path).unwrap();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("type must be github|brew|npm"));
}

#[test]
fn wrong_version_is_rejected() {
    let cfg = config::parse(
        r#"
version = 2

[[sources]]
name = "jq"
type = "brew"
formula = "jq"
"#,
    )
    .unwrap();
    assert!(cfg.validate().unwrap_err().to_string().contains("version must be 1"));
}

#[serial_test::serial]
#[test]
fn config_path_env_override() {
    std::env::set_var(config::ENV_CONFIG_PATH, "/tmp/upd-test/config.toml");
    assert_eq!(
        config::resolve_config_path(None),
        std::path::PathBuf::from("/tmp/upd-test/config.toml")
    );
    std::env::remove_var(config::ENV_CONFIG_PATH);
    assert!(config::resolve_config_path(None).ends_with("config.toml"));
}
