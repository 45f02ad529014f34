use std::future::Future;

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Runs `task` once per item with at most `bound` invocations in flight.
/// Admission is a counting semaphore (FIFO, so no starvation); results come
/// back in item order regardless of completion order, exactly one per item.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, bound: usize, task: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let gate = Semaphore::new(bound.max(1));
    let gate = &gate;
    let task = &task;

    let units = items.into_iter().enumerate().map(|(idx, item)| async move {
        let _permit = gate.acquire().await.expect("admission gate never closed");
        task(idx, item).await
    });

    join_all(units).await
}
