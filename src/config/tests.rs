use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.host, "localhost");
    assert_eq!(settings.broker.port, 5443);
    assert!(settings.client.reconnect);
    assert_eq!(settings.client.reconnect_interval_ms, 5000);
    assert_eq!(settings.client.get_timeout_ms, 5000);
    assert_eq!(settings.client.newtopic_interval_ms, 1000);
    assert_eq!(settings.log.level, "info");
}

#[test]
fn test_broker_url() {
    let settings = Settings::default();
    assert_eq!(settings.broker.url(), "ws://localhost:5443");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    temp_env::with_vars_unset(["TOPICA_BROKER__HOST", "TOPICA_BROKER__PORT"], || {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.broker.port, 5443);
        assert_eq!(cfg.client.get_timeout_ms, 5000);
    });
}

#[test]
#[serial]
fn test_environment_overrides_defaults() {
    temp_env::with_vars(
        [
            ("TOPICA_BROKER__HOST", Some("robot.local")),
            ("TOPICA_BROKER__PORT", Some("7000")),
            ("TOPICA_CLIENT__RECONNECT", Some("false")),
            ("TOPICA_CLIENT__GET_TIMEOUT_MS", Some("250")),
        ],
        || {
            let cfg = load_config().expect("load_config failed");
            assert_eq!(cfg.broker.host, "robot.local");
            assert_eq!(cfg.broker.port, 7000);
            assert!(!cfg.client.reconnect);
            assert_eq!(cfg.client.get_timeout_ms, 250);
            // untouched keys keep their defaults
            assert_eq!(cfg.client.reconnect_interval_ms, 5000);
        },
    );
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    // load_config reads config/default.* relative to the working directory
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");

    fs::create_dir_all("config").expect("create config dir");
    let toml = r#"
        [broker]
        host = "10.0.0.7"
        port = 9000

        [client]
        reconnect_interval_ms = 250
        newtopic_interval_ms = 100

        [log]
        level = "debug"
    "#;
    fs::write("config/default.toml", toml).expect("write config file");

    let cfg = load_config();

    // restore cwd before asserting so a failure does not leak the tempdir cwd
    env::set_current_dir(orig).expect("restore cwd");

    let cfg = cfg.expect("load_config failed");
    assert_eq!(cfg.broker.host, "10.0.0.7");
    assert_eq!(cfg.broker.port, 9000);
    assert_eq!(cfg.client.reconnect_interval_ms, 250);
    assert_eq!(cfg.client.newtopic_interval_ms, 100);
    assert!(cfg.client.reconnect);
    assert_eq!(cfg.log.level, "debug");
}
