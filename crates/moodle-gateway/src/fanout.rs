//! Bounded, order-preserving fan-out of independent calls.

use std::future::Future;

use futures::stream::{self, StreamExt};

use crate::error::GatewayError;

/// Result for one input item, kept next to the item it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome<T, R> {
    pub item: T,
    pub result: Result<R, GatewayError>,
}

impl<T, R> ItemOutcome<T, R> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run `f` over `items` with at most `concurrency` calls in flight.
///
/// Outcomes come back in input order, one per item; a failing item never
/// affects the others. Dropping the returned future drops every in-flight
/// call with it.
pub async fn fan_out<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    f: F,
) -> Vec<ItemOutcome<T, R>>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, GatewayError>>,
{
    let f = &f;
    stream::iter(items)
        .map(move |item| async move {
            let result = f(item.clone()).await;
            ItemOutcome { item, result }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_preserved_and_failures_isolated() {
        let outcomes = fan_out(vec![3u64, 1, 2, 4], 4, |n| async move {
            tokio::time::sleep(Duration::from_millis(n * 5)).await;
            if n == 2 {
                Err(GatewayError::network("unreachable"))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        let items: Vec<u64> = outcomes.iter().map(|o| o.item).collect();
        assert_eq!(items, vec![3, 1, 2, 4]);
        assert_eq!(outcomes[0].result, Ok(30));
        assert!(!outcomes[2].is_success());
        assert_eq!(outcomes[3].result, Ok(40));
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let (active, peak) = (AtomicUsize::new(0), AtomicUsize::new(0));
        let (active, peak) = (&active, &peak);
        let outcomes = fan_out((0..12).collect::<Vec<u32>>(), 3, move |_| async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, GatewayError>(())
        })
        .await;

        assert_eq!(outcomes.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcomes = fan_out(Vec::<u32>::new(), 4, |n| async move { Ok::<_, GatewayError>(n) }).await;
        assert!(outcomes.is_empty());
    }
}
