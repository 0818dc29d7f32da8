//! Sinks that drain the end of a pipeline.

use std::future::Future;

use crate::core::{Result, Stream};
use crate::pipeline::Pipeline;

/// Drain `stream` into a vector.
///
/// Returns the stream's outcome: `Err` if the producer failed, even though
/// some values may have arrived before the fault.
pub async fn collect<T>(mut stream: Stream<T>) -> Result<Vec<T>> {
    let mut items = Vec::new();
    while let Some(item) = stream.recv().await {
        items.push(item);
    }
    stream.outcome().map(|()| items)
}

/// Call `f` for every value until the stream closes or the signal fires.
///
/// Returns the stream's outcome. A drain cancelled from outside returns
/// `Ok(())`; one cancelled by a fail-fast fault returns that fault.
pub async fn for_each<T, F, Fut>(pipeline: &Pipeline, mut stream: Stream<T>, mut f: F) -> Result<()>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = ()>,
{
    let signal = pipeline.signal();
    while let Some(item) = stream.recv_or_done(signal).await {
        f(item).await;
    }
    stream.outcome()?;
    if signal.is_fired() {
        tracing::debug!("sink drain cancelled");
        if let Some(error) = pipeline.cancelling_fault() {
            return Err(error);
        }
    }
    Ok(())
}

/// Count the values of `stream`
pub async fn count<T>(mut stream: Stream<T>) -> Result<usize> {
    let mut n = 0;
    while stream.recv().await.is_some() {
        n += 1;
    }
    stream.outcome().map(|()| n)
}
