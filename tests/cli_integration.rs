//! CLI integration tests.
//!
//! These tests verify argument parsing, configuration loading and the
//! driver wiring built from a configuration.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use tempfile::{NamedTempFile, TempDir};

use session_hub::cli::{parse_args_from, Args, Command};
use session_hub::config::Config;
use session_hub::{LocalEngine, SessionDriver, SessionManager, StartOptions};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("session-hub")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.command.is_none());
    assert!(result.config.is_none());
    assert!(result.dir.is_none());
    assert!(result.default_driver.is_none());
    assert!(!result.help);
    assert!(!result.version);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-c",
        "/etc/session-hub.json",
        "-d",
        "/var/lib/sessions",
        "-m",
        "900",
        "-D",
        "cache",
        "-l",
        "debug",
        "gc",
    ]))
    .unwrap();

    assert_eq!(result.config, Some(PathBuf::from("/etc/session-hub.json")));
    assert_eq!(result.dir, Some(PathBuf::from("/var/lib/sessions")));
    assert_eq!(result.max_lifetime, Some(900));
    assert_eq!(result.default_driver, Some("cache".to_string()));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(result.command, Some(Command::Gc));
}

#[test]
fn test_cli_options_after_command() {
    let result = parse_args_from(args(&["destroy", "abc", "-d", "/tmp/s"])).unwrap();
    assert_eq!(result.command, Some(Command::Destroy("abc".parse().unwrap())));
    assert_eq!(result.dir, Some(PathBuf::from("/tmp/s")));
}

#[test]
fn test_cli_invalid_lifetime() {
    assert!(parse_args_from(args(&["-m", "-5"])).is_err());
    assert!(parse_args_from(args(&["-m", "later"])).is_err());
}

#[test]
fn test_cli_rejects_bad_session_id() {
    assert!(parse_args_from(args(&["read", "a/b"])).is_err());
    assert!(parse_args_from(args(&["read", "sess_index"])).is_err());
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let file = config_file(
        r#"{
        "session": {
            "name": "APP",
            "save_path": "/srv",
            "gc_max_lifetime": 1800,
            "unique_ids": true
        },
        "drivers": {
            "default": "cache",
            "file": { "enabled": false },
            "cache": { "enabled": true, "index_key": "app_index" }
        },
        "logging": {
            "level": "debug"
        }
    }"#,
    );

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.session.name.as_deref(), Some("APP"));
    assert_eq!(config.session.save_path, "/srv");
    assert_eq!(config.session.gc_max_lifetime, 1800);
    assert!(config.session.unique_ids);
    assert_eq!(config.drivers.default, "cache");
    assert!(!config.drivers.file.enabled);
    assert_eq!(config.drivers.cache.index_key, "app_index");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_config_priority_cli_over_file() {
    let file = config_file(
        r#"{
        "session": { "gc_max_lifetime": 100 },
        "drivers": { "file": { "dir": "/from/file" } }
    }"#,
    );

    let args = Args {
        config: Some(file.path().to_path_buf()),
        dir: Some(PathBuf::from("/from/cli")),
        max_lifetime: Some(200),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    // CLI values should win
    assert_eq!(config.drivers.file.dir, PathBuf::from("/from/cli"));
    assert_eq!(config.session.gc_max_lifetime, 200);
}

#[test]
fn test_config_missing_file_fails() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/session-hub.json")),
        ..Args::default()
    };
    assert!(Config::load(&args).is_err());
}

#[test]
fn test_config_partial_deserialization() {
    let config: Config = serde_json::from_str(r#"{"session": {"name": "X"}}"#).unwrap();

    assert_eq!(config.session.name.as_deref(), Some("X"));
    assert_eq!(config.session.gc_max_lifetime, 86_400); // Default
    assert_eq!(config.drivers.default, "file"); // Default
}

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.drivers.default, loaded.drivers.default);
    assert_eq!(original.drivers.file.dir, loaded.drivers.file.dir);
    assert_eq!(original.session.gc_max_lifetime, loaded.session.gc_max_lifetime);
}

// ============================================================================
// Wiring Tests
// ============================================================================

#[test]
fn test_configured_store_mirrors_writes() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.drivers.file.dir = dir.path().to_path_buf();
    config.drivers.cache.enabled = true;

    let registry = config.build_registry().unwrap();
    let mut manager =
        SessionManager::with_registry(registry, LocalEngine::new(), config.session_config());

    manager.start(Some("wired"), &StartOptions::new()).unwrap();
    manager.set("user", "ann").unwrap();
    let report = manager.save().unwrap();
    assert_eq!(report.succeeded, vec!["file", "cache"]);

    assert!(dir.path().join("sess_wired").exists());
    let cache = manager.drivers().get("cache").unwrap();
    assert!(!cache.read(&"wired".parse().unwrap()).unwrap().is_empty());
}

#[test]
fn test_configured_cache_only_store() {
    let mut config = Config::default();
    config.drivers.file.enabled = false;
    config.drivers.cache.enabled = true;
    config.drivers.default = "cache".to_string();

    let registry = config.build_registry().unwrap();
    assert_eq!(registry.names(), vec!["cache"]);
    assert_eq!(registry.default_name().unwrap(), "cache");
}
