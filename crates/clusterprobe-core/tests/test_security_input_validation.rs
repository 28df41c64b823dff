//! Configuration validation tests: boundary values and fail-fast behavior.

use clusterprobe_core::{Error, ProbeConfig};

fn default_config() -> ProbeConfig {
    ProbeConfig::default()
}

/// A zero TCP dial timeout would make every probe instantly time out;
/// reject it rather than let it silently mark every host down.
#[test]
fn validate_rejects_zero_tcp_dial_timeout() {
    let mut config = default_config();
    config.tcp_dial_timeout_ms = 0;

    let result = config.validate();
    assert!(result.is_err());
    if let Err(Error::Config(msg)) = result {
        assert!(msg.contains("tcp_dial_timeout_ms"));
    } else {
        panic!("expected Error::Config, got {result:?}");
    }
}

/// A zero ICMP deadline would never allow a reply to arrive.
#[test]
fn validate_rejects_zero_icmp_timeout() {
    let mut config = default_config();
    config.icmp_timeout_ms = 0;

    let result = config.validate();
    assert!(result.is_err());
}

/// A per-dial timeout longer than the overall timeout can never fire before
/// the overall deadline does, so it is rejected as an inconsistent config.
#[test]
fn validate_rejects_dial_timeout_exceeding_overall() {
    let mut config = default_config();
    config.tcp_dial_timeout_ms = 10_000;
    config.tcp_overall_timeout_ms = 3_000;

    let result = config.validate();
    assert!(result.is_err());
}

/// Excessive retries would let one unreachable host's power-status command
/// stall the bounded runner indefinitely.
#[test]
fn validate_rejects_retries_over_ten() {
    let mut config = default_config();
    config.runner_retries = u32::MAX;

    let result = config.validate();
    assert!(result.is_err());
    if let Err(Error::Config(msg)) = result {
        assert!(msg.contains("runner_retries"));
    } else {
        panic!("expected Error::Config, got {result:?}");
    }
}

/// Zero concurrency would make the bounded runner's semaphore permanently
/// closed, deadlocking every probe cycle.
#[test]
fn validate_rejects_zero_runner_concurrency() {
    let mut config = default_config();
    config.runner_concurrency = 0;

    let result = config.validate();
    assert!(result.is_err());
}

/// Zero worker counts would leave the TCP/ICMP probes unable to spawn any
/// workers at all.
#[test]
fn validate_rejects_zero_worker_counts() {
    let mut config = default_config();
    config.tcp_max_workers = 0;
    assert!(config.validate().is_err());

    let mut config = default_config();
    config.icmp_max_workers = 0;
    assert!(config.validate().is_err());
}

/// A fast refresh period longer than the slow period would invert the
/// manager's adaptive cadence.
#[test]
fn validate_rejects_fast_refresh_exceeding_slow_refresh() {
    let mut config = default_config();
    config.fast_refresh_ms = 20_000;
    config.slow_refresh_ms = 10_000;

    let result = config.validate();
    assert!(result.is_err());
}

#[test]
fn validate_accepts_valid_boundaries() {
    let mut config = default_config();
    config.tcp_dial_timeout_ms = 1;
    config.tcp_overall_timeout_ms = 1;
    assert!(config.validate().is_ok());

    let mut config = default_config();
    config.runner_retries = 0;
    assert!(config.validate().is_ok());

    let mut config = default_config();
    config.runner_retries = 10;
    assert!(config.validate().is_ok());

    let mut config = default_config();
    config.fast_refresh_ms = 10_000;
    config.slow_refresh_ms = 10_000;
    assert!(config.validate().is_ok());
}

/// Validation should fail on the first invalid field it checks rather than
/// silently accepting a config with several inconsistent values.
#[test]
fn validate_fails_fast_on_first_error() {
    let mut config = default_config();
    config.tcp_dial_timeout_ms = 0; // first check to fail
    config.runner_retries = 100;
    config.runner_concurrency = 0;

    let result = config.validate();
    assert!(result.is_err());
    if let Err(Error::Config(msg)) = result {
        assert!(msg.contains("tcp_dial_timeout_ms"));
    } else {
        panic!("expected Error::Config, got {result:?}");
    }
}
