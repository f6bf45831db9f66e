//! Concurrent, failure-tolerant fan-out over mirror candidates.

use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;

/// Run `f` on every item concurrently and concatenate the successful results
/// in input order. Failed items are logged and contribute nothing.
pub async fn parallel_catching_flat_map<I, T, E, F, Fut>(items: Vec<I>, f: F) -> Vec<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
    E: Display,
{
    let results = join_all(items.into_iter().map(f)).await;

    results
        .into_iter()
        .flat_map(|result| match result {
            Ok(values) => values,
            Err(e) => {
                log::warn!("Mirror resolution failed: {}", e);
                Vec::new()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_union_of_successes_in_input_order() {
        let out = parallel_catching_flat_map(vec![1u64, 2, 3, 4], |n| async move {
            // Later items finish first.
            tokio::time::sleep(Duration::from_millis(40 - n * 10)).await;
            if n == 3 {
                Err(format!("mirror {} failed", n))
            } else {
                Ok(vec![n * 10, n * 10 + 1])
            }
        })
        .await;

        assert_eq!(out, vec![10, 11, 20, 21, 40, 41]);
    }

    #[tokio::test]
    async fn test_all_failures_yield_empty() {
        let out: Vec<u8> =
            parallel_catching_flat_map(vec!["a", "b"], |s| async move { Err(s.to_string()) })
                .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_runs_concurrently() {
        let start = tokio::time::Instant::now();
        let out = parallel_catching_flat_map(vec![1, 2, 3, 4, 5], |n| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, String>(vec![n])
        })
        .await;

        assert_eq!(out.len(), 5);
        assert!(start.elapsed() < Duration::from_millis(450));
    }
}
