//! Retry logic with exponential backoff for the bounded runner

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Retry configuration with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Add up to ±25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Build a retry policy from the bounded runner's configured retry
    /// count (spec.md §4.3 — concurrency and retries are explicit config).
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries + 1,
            ..Self::default()
        }
    }
}

/// Retry a fallible async operation with exponential backoff.
///
/// Attempts `operation` up to `config.max_attempts` times, waiting with
/// exponential backoff between attempts while `is_retriable` keeps
/// returning true for the latest error.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    mut operation: F,
    config: RetryConfig,
    is_retriable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("operation succeeded after {} attempts", attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let should_retry = attempt < config.max_attempts && is_retriable(&e);

                if !should_retry {
                    if attempt >= config.max_attempts {
                        debug!("max retry attempts ({}) exceeded", config.max_attempts);
                    } else {
                        debug!("error not retriable, giving up after attempt {}", attempt);
                    }
                    return Err(e);
                }

                debug!(
                    "attempt {}/{} failed: {}. retrying in {:?}",
                    attempt, config.max_attempts, e, delay
                );

                if delay.as_millis() > 0 {
                    let actual_delay = if config.jitter { add_jitter(delay) } else { delay };
                    sleep(actual_delay).await;
                }

                delay = std::cmp::min(
                    Duration::from_secs_f64(delay.as_secs_f64() * config.multiplier),
                    config.max_delay,
                );
            }
        }
    }
}

/// Add random jitter to a delay (±25%), to avoid synchronized retries
/// across many hosts probed in the same cycle.
fn add_jitter(delay: Duration) -> Duration {
    use rand::Rng;
    let jitter_factor = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_secs_f64(delay.as_secs_f64() * jitter_factor)
}
