//! Source workers that feed values into a pipeline.
//!
//! Sources are the entry points of a pipeline graph. Every source sends
//! with cancellation, so an abandoned or cancelled pipeline never leaves a
//! source parked on a full stream.

use futures_core::Stream as FuturesStream;
use tokio_stream::StreamExt;

use crate::core::Stream;
use crate::pipeline::Pipeline;

/// A source that emits each item of an iterator, then closes.
///
/// Infinite iterators are fine: the source stops when the signal fires or
/// the consumer drops the stream.
pub fn from_iter<I>(pipeline: &Pipeline, iter: I) -> Stream<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    let (tx, output) = pipeline.stream();
    let worker = pipeline.clone();
    let iter = iter.into_iter();

    pipeline.spawn("from_iter", async move {
        let signal = worker.signal();
        for item in iter {
            if !tx.send(item, signal).await.is_sent() {
                tracing::debug!(cancelled = signal.is_fired(), "source stopped early");
                break;
            }
        }
        worker.close(tx);
    });

    output
}

/// A source that forwards the items of any async stream, then closes.
pub fn from_stream<S>(pipeline: &Pipeline, stream: S) -> Stream<S::Item>
where
    S: FuturesStream + Send + Unpin + 'static,
    S::Item: Send + 'static,
{
    let (tx, output) = pipeline.stream();
    let worker = pipeline.clone();

    pipeline.spawn("from_stream", async move {
        let signal = worker.signal();
        let mut stream = stream;
        while let Ok(Some(item)) = signal.or_cancel(stream.next()).await {
            if !tx.send(item, signal).await.is_sent() {
                break;
            }
        }
        worker.close(tx);
    });

    output
}
