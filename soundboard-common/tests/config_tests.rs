//! Tests for configuration file resolution and graceful degradation
//!
//! Tests that manipulate SOUNDBOARD_CONFIG are marked with #[serial] so they
//! run sequentially, not in parallel.

use serial_test::serial;
use soundboard_common::config::{
    default_config_path, load_toml_config, resolve_config_path, ConfigOverrides, ServerConfig,
    CONFIG_PATH_ENV,
};
use soundboard_common::Error;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_cli_path_beats_environment() {
    env::set_var(CONFIG_PATH_ENV, "/from/env.toml");

    let resolved = resolve_config_path(Some(Path::new("/from/cli.toml")));
    assert_eq!(resolved, Some(PathBuf::from("/from/cli.toml")));

    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
#[serial]
fn test_environment_path_used_without_cli() {
    env::set_var(CONFIG_PATH_ENV, "/from/env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/from/env.toml")));

    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
#[serial]
fn test_falls_back_to_platform_default() {
    env::remove_var(CONFIG_PATH_ENV);

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, default_config_path());
}

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    let config = load_toml_config(&missing).expect("missing TOML must not be fatal");
    assert!(config.audio_dir.is_none());
    assert!(config.port.is_none());
}

#[test]
fn test_invalid_file_is_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let result = load_toml_config(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_unreadable_file_is_io_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    // Exists, but reading a directory as a file fails
    let path = temp_dir.path().join("config.toml");
    std::fs::create_dir(&path).unwrap();

    match load_toml_config(&path) {
        Err(Error::Io { path: failed, .. }) => assert_eq!(failed, path),
        other => panic!("Expected Io error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_file_values_flow_into_resolved_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
audio_dir = "/srv/pads"
max_file_size = 2048
port = 8080
"#,
    )
    .unwrap();

    let toml = load_toml_config(&path).unwrap();
    let config = ServerConfig::resolve(ConfigOverrides::default(), toml).unwrap();

    assert_eq!(config.audio_dir, PathBuf::from("/srv/pads"));
    assert_eq!(config.max_file_size, 2048);
    assert_eq!(config.port, 8080);
    assert!(config.watch);
}
