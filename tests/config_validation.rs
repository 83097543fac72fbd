//! Integration tests for configuration loading and validation

#![allow(clippy::expect_used)]

use package_protocol::config::{
    MissPolicy, ProtocolConfig, RoutingPolicy, DEFAULT_DISPATCH_QUEUE_LIMIT,
    DEFAULT_MAX_BODY_LENGTH,
};
use package_protocol::error::ProtocolError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ProtocolConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.framing.max_body_length, DEFAULT_MAX_BODY_LENGTH);
    assert_eq!(config.session.dispatch_queue_limit, DEFAULT_DISPATCH_QUEUE_LIMIT);
    assert_eq!(config.dispatch.routing, RoutingPolicy::IdAndType);
    assert_eq!(config.dispatch.miss_policy, MissPolicy::Report);
}

#[test]
fn test_zero_max_body_length() {
    let mut config = ProtocolConfig::default();
    config.framing.max_body_length = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max body length must be greater than 0")));
}

#[test]
fn test_max_body_length_at_wire_limit_is_valid() {
    let mut config = ProtocolConfig::default();
    config.framing.max_body_length = u16::MAX;
    assert!(config.validate().is_empty());
}

#[test]
fn test_invalid_server_address() {
    let mut config = ProtocolConfig::default();
    config.server.address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = ProtocolConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_zero_dispatch_queue_limit() {
    let mut config = ProtocolConfig::default();
    config.session.dispatch_queue_limit = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Dispatch queue limit must be greater than 0")));
}

#[test]
fn test_excessive_dispatch_queue_limit() {
    let mut config = ProtocolConfig::default();
    config.session.dispatch_queue_limit = 2_000_000;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Dispatch queue limit too large")));
}

#[test]
fn test_read_buffer_bounds() {
    let mut config = ProtocolConfig::default();
    config.session.read_buffer_size = 16;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Read buffer size too small")));

    config.session.read_buffer_size = 32 * 1024 * 1024;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Read buffer size too large")));
}

#[test]
fn test_shutdown_timeout_bounds() {
    let mut config = ProtocolConfig::default();
    config.session.shutdown_timeout = Duration::from_millis(1);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too short")));

    config.session.shutdown_timeout = Duration::from_secs(120);
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Shutdown timeout too long")));
}

#[test]
fn test_long_app_name() {
    let mut config = ProtocolConfig::default();
    config.logging.app_name = "x".repeat(100);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Application name too long")));
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = ProtocolConfig::default();
    config.server.address = "invalid".to_string();
    config.server.max_connections = 0;
    config.session.dispatch_queue_limit = 0;
    config.framing.max_body_length = 0;

    let errors = config.validate();
    assert!(
        errors.len() >= 4,
        "Should have at least 4 errors, got: {:?}",
        errors
    );
}

#[test]
fn test_validate_strict_reports_all_errors() {
    let mut config = ProtocolConfig::default();
    config.server.max_connections = 0;
    config.session.outbound_queue_limit = 0;

    match config.validate_strict() {
        Err(ProtocolError::ConfigError(msg)) => {
            assert!(msg.contains("Max connections must be greater than 0"));
            assert!(msg.contains("Outbound queue limit must be greater than 0"));
        }
        other => panic!("Expected ConfigError, got {other:?}"),
    }

    assert!(ProtocolConfig::default().validate_strict().is_ok());
}

#[test]
fn test_partial_toml_fills_defaults() {
    let config = ProtocolConfig::from_toml(
        r#"
        [framing]
        max_body_length = 1024

        [dispatch]
        routing = "type_only"
        miss_policy = "silent"

        [session]
        dispatch_queue_limit = 4
        shutdown_timeout = 250
        "#,
    )
    .expect("Partial config should parse");

    assert_eq!(config.framing.max_body_length, 1024);
    assert_eq!(config.dispatch.routing, RoutingPolicy::TypeOnly);
    assert_eq!(config.dispatch.miss_policy, MissPolicy::Silent);
    assert_eq!(config.session.dispatch_queue_limit, 4);
    assert_eq!(config.session.shutdown_timeout, Duration::from_millis(250));
    assert_eq!(config.session.outbound_queue_limit, 64);
    assert_eq!(config.server.address, "127.0.0.1:9000");
    assert_eq!(config.logging.log_level, Level::INFO);
}

#[test]
fn test_max_body_length_beyond_wire_limit_fails_to_parse() {
    let result = ProtocolConfig::from_toml("[framing]\nmax_body_length = 70000\n");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_unknown_routing_policy_fails_to_parse() {
    let result = ProtocolConfig::from_toml("[dispatch]\nrouting = \"by_magic\"\n");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_invalid_log_level_fails_to_parse() {
    let result = ProtocolConfig::from_toml("[logging]\nlog_level = \"loud\"\n");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_example_config_parses_back() {
    let example = ProtocolConfig::example_config();
    assert!(example.contains("max_body_length"));

    let parsed = ProtocolConfig::from_toml(&example).expect("Example config should parse");
    assert!(parsed.validate().is_empty());
    assert_eq!(parsed.framing.max_body_length, DEFAULT_MAX_BODY_LENGTH);
    assert_eq!(parsed.logging.log_level, Level::INFO);
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!(
        "package-protocol-config-{}.toml",
        std::process::id()
    ));

    let config = ProtocolConfig::default_with_overrides(|c| {
        c.framing.max_body_length = 512;
        c.logging.json_format = true;
    });
    config.save_to_file(&path).expect("Should save config");

    let loaded = ProtocolConfig::from_file(&path).expect("Should load config");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.framing.max_body_length, 512);
    assert!(loaded.logging.json_format);
}

#[test]
fn test_missing_file_is_config_error() {
    let result = ProtocolConfig::from_file("/nonexistent/package-protocol.toml");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}
