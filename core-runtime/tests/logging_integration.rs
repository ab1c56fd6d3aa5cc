//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.redact_pii);
    assert!(config.filter.is_none());
    assert!(config.logger_sink.is_none());
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("secret", "wJalrXUtnFEMI"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("keyId", "AKIAIOSFODNN7"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("aws_access_key", "AKIA"), "[REDACTED]");
}

#[test]
fn test_storage_fields_pass_through() {
    assert_eq!(redact_if_sensitive("bucket", "media-assets"), "media-assets");
    assert_eq!(redact_if_sensitive("session_id", "idx-42"), "idx-42");
    assert_eq!(redact_if_sensitive("offset", "7"), "7");
}

#[test]
fn test_cache_paths_are_stripped() {
    assert_eq!(strip_path("/var/cache/cms/sources/abc.jpg"), "abc.jpg");
    assert_eq!(strip_path("C:\\cms\\temp\\copy.png"), "copy.png");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_init_logging_only_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn);

    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}
