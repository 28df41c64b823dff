//! Retry logic integration tests.
//!
//! Complements the unit tests colocated in retry.rs with end-to-end timing
//! and error-selectivity scenarios exercised through the bounded runner's
//! retry policy.

use clusterprobe_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn max_retry_limit_exactly_3_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let config = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: false,
    };

    let result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("permanent failure")
            }
        },
        config,
        |_| true,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn max_retry_limit_custom_5_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: false,
    };

    let result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("always fails")
            }
        },
        config,
        |_| true,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn exponential_backoff_timing_1s_2s() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let attempts_clone = attempts.clone();
    let times_clone = attempt_times.clone();

    let config = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(10),
        multiplier: 2.0,
        jitter: false,
    };

    let start = Instant::now();
    let _result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            let times = times_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                times.lock().await.push(start.elapsed());
                Err::<(), _>("always fails")
            }
        },
        config,
        |_| true,
    )
    .await;

    let times = attempt_times.lock().await;
    assert_eq!(times.len(), 3);
    assert!(times[0] < Duration::from_millis(100));
    assert!(times[1] >= Duration::from_millis(900));
    assert!(times[1] <= Duration::from_millis(1200));
    assert!(times[2] >= Duration::from_millis(2900));
    assert!(times[2] <= Duration::from_millis(3300));
}

#[tokio::test]
async fn exponential_backoff_respects_max_delay() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(200),
        multiplier: 2.0,
        jitter: false,
    };

    let start = Instant::now();
    let _result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("always fails")
            }
        },
        config,
        |_| true,
    )
    .await;

    let elapsed = start.elapsed();
    // 100 + 200 + 200 + 200 = 700ms
    assert!(elapsed >= Duration::from_millis(650));
    assert!(elapsed <= Duration::from_millis(900));
}

#[tokio::test]
async fn retry_only_on_transient_errors() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: false,
    };

    let result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("timeout")
            }
        },
        config,
        |e| e.contains("timeout"),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn no_retry_on_permanent_errors() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: false,
    };

    let result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("connection refused")
            }
        },
        config,
        |e| e.contains("timeout"),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn eventual_success_after_retries() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let config = RetryConfig {
        max_attempts: 5,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: false,
    };

    let result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 3 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            }
        },
        config,
        |_| true,
    )
    .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn with_retries_builds_policy_matching_configured_count() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let result = retry_with_backoff(
        || {
            let attempts = attempts_clone.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("always fails")
            }
        },
        RetryConfig::with_retries(0),
        |_| true,
    )
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "0 retries means 1 total attempt");
}
