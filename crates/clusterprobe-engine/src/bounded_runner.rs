//! Bounded Runner: runs one async operation per item in a list, bounding
//! concurrency and retrying failures, the way the Power Probe runs a
//! command template against every host without overwhelming the system or
//! the target BMCs.

use clusterprobe_core::retry::{retry_with_backoff, RetryConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Run `op` once per item in `items`, bounding concurrency to `concurrency`
/// permits and retrying each item up to `retries` times on failure.
/// Returns one `(item, Result<T, E>)` pair per input item, collected
/// through whichever order the futures complete in -- callers key results
/// by item identity, not position.
pub async fn run_all<T, E, I, F, Fut>(
    items: Vec<I>,
    concurrency: usize,
    retries: u32,
    op: F,
) -> Vec<(I, Result<T, E>)>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<T, E>> + Send,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let op = Arc::new(op);
    let retry_config = RetryConfig::with_retries(retries);

    let mut tasks = FuturesUnordered::new();
    for item in items {
        let semaphore = semaphore.clone();
        let op = op.clone();
        let retry_config = retry_config.clone();
        tasks.push(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            let result = retry_with_backoff(
                || op(item.clone()),
                retry_config,
                |_| true,
            )
            .await;
            (item, result)
        });
    }

    let mut results = Vec::new();
    while let Some(pair) = tasks.next().await {
        results.push(pair);
    }
    results
}
