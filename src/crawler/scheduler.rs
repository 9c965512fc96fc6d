//! Bounded fan-out for independent work items
//!
//! Every stage of the harvest has the same shape: one task per item, at most
//! `limit` of them in flight, and a barrier once all of them have finished.
//! [`run_bounded`] is that shape. Concurrency is limited by a semaphore whose
//! permits are acquired before each task is spawned, so queued items never
//! occupy a runtime task until a slot frees up.

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `task` over every item with at most `limit` tasks in flight
///
/// Returns once every spawned task has finished. Results come back in
/// completion order. A task that panics is logged and contributes no
/// result; callers that need every item accounted for must reconcile the
/// results against their inputs.
///
/// # Arguments
///
/// * `items` - The work items
/// * `limit` - Maximum concurrent tasks (values below 1 are treated as 1)
/// * `task` - Async function applied to each item
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let task = Arc::new(task);
    let mut workers = JoinSet::new();

    for item in items {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!("Worker pool semaphore closed; remaining items dropped");
                break;
            }
        };

        let task = Arc::clone(&task);
        workers.spawn(async move {
            let _permit = permit;
            task(item).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!("Worker task failed: {}", e),
        }
    }

    results
}

/// Sleeps for a random duration in `0..=max_jitter`
///
/// Spreads the start of tasks that were released together so the origin
/// does not see one burst per freed pool slot.
pub async fn jitter(max_jitter: Duration) {
    if max_jitter.is_zero() {
        return;
    }

    let millis = rand::thread_rng().gen_range(0..=max_jitter.as_millis() as u64);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
