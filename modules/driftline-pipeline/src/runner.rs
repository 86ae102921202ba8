//! Bounded concurrency runner for per-item fan-out work. At most `limit`
//! tasks run at once; results come back in original task order; one task's
//! failure never aborts its siblings.

use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::warn;

/// Run `tasks` with at most `limit` in flight. Each slot in the returned
/// vector corresponds to the task at the same index; a failed task yields
/// `None`. An empty task list resolves immediately.
pub async fn run_bounded<T, F>(limit: usize, tasks: Vec<F>) -> Vec<Option<T>>
where
    F: Future<Output = anyhow::Result<T>>,
{
    if tasks.is_empty() {
        return Vec::new();
    }
    let limit = limit.max(1);
    let total = tasks.len();

    let mut indexed: Vec<(usize, Option<T>)> = stream::iter(
        tasks
            .into_iter()
            .enumerate()
            .map(|(i, task)| async move {
                match task.await {
                    Ok(value) => (i, Some(value)),
                    Err(e) => {
                        warn!(task = i, error = %e, "Bounded task failed");
                        (i, None)
                    }
                }
            }),
    )
    .buffer_unordered(limit)
    .collect()
    .await;

    indexed.sort_by_key(|(i, _)| *i);
    debug_assert_eq!(indexed.len(), total);
    indexed.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn empty_task_list_resolves_immediately() {
        let results: Vec<Option<u32>> = run_bounded(4, Vec::<futures::future::Ready<anyhow::Result<u32>>>::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn results_preserve_task_order() {
        // Later tasks finish first; output order must still match input order.
        let tasks: Vec<_> = (0..6u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(60 - i * 10)).await;
                Ok(i)
            })
            .collect();
        let results = run_bounded(6, tasks).await;
        let values: Vec<u64> = results.into_iter().flatten().collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn failure_yields_none_without_aborting_siblings() {
        let tasks: Vec<_> = (0..4u32)
            .map(|i| async move {
                if i == 2 {
                    anyhow::bail!("boom");
                }
                Ok(i)
            })
            .collect();
        let results = run_bounded(2, tasks).await;
        assert_eq!(results, vec![Some(0), Some(1), None, Some(3)]);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .collect();

        run_bounded(3, tasks).await;
        assert!(peak.load(Ordering::SeqCst) <= 3, "peak {} > limit", peak.load(Ordering::SeqCst));
    }
}
