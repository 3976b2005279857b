//! Tests for configuration validation

use priority_scheduler::config::{LimiterConfig, SchedulerConfig};
use priority_scheduler::core::TaskPriority;
use std::time::Duration;

#[test]
fn test_default_config_is_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert!(cfg.core_pool_size >= 1);
    assert_eq!(cfg.max_pool_size, cfg.core_pool_size * 2);
    assert_eq!(cfg.default_priority, TaskPriority::High);
    assert_eq!(cfg.max_wait_for_low_priority(), Duration::from_millis(500));
}

#[test]
fn test_zero_core_pool_rejected() {
    let cfg = SchedulerConfig::new().with_pool_size(0, 4);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_max_below_core_rejected() {
    let cfg = SchedulerConfig::new().with_pool_size(4, 2);
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("max_pool_size (2)"));
}

#[test]
fn test_zero_stack_size_rejected() {
    let cfg = SchedulerConfig::new().with_thread_stack_size(0);
    assert!(cfg.validate().is_err());
}

#[test]
fn test_builder_methods() {
    let cfg = SchedulerConfig::new()
        .with_pool_size(2, 8)
        .with_keep_alive_ms(1_500)
        .with_default_priority(TaskPriority::Low)
        .with_max_wait_for_low_priority_ms(50)
        .with_thread_name_prefix("ingest")
        .with_thread_stack_size(512 * 1024);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.keep_alive(), Duration::from_millis(1_500));
    assert_eq!(cfg.thread_name_prefix, "ingest");
    assert_eq!(cfg.thread_stack_size, Some(512 * 1024));
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{"core_pool_size": 2, "max_pool_size": 3, "default_priority": "low"}"#,
    )
    .unwrap();
    assert_eq!(cfg.core_pool_size, 2);
    assert_eq!(cfg.max_pool_size, 3);
    assert_eq!(cfg.default_priority, TaskPriority::Low);
    assert_eq!(cfg.max_wait_for_low_priority_ms, 500);
}

#[test]
fn test_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str("{not json").unwrap_err().starts_with("parse error"));
    assert!(SchedulerConfig::from_json_str(r#"{"core_pool_size": 0}"#).is_err());
}

#[test]
fn test_limiter_config_validation() {
    assert!(LimiterConfig::new(1).validate().is_ok());
    assert!(LimiterConfig::new(0).validate().is_err());
    let parsed: LimiterConfig = serde_json::from_str(r#"{"max_concurrency": 4}"#).unwrap();
    assert_eq!(parsed, LimiterConfig::new(4));
}
