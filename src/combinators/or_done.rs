//! Cancellation-aware read wrapper.

use crate::combinators::close_after;
use crate::core::Stream;
use crate::pipeline::Pipeline;

/// Forward `input` into a new stream that also closes when the signal fires.
///
/// Downstream code can then treat "input exhausted" and "pipeline
/// cancelled" as the same event: the returned stream closing. Values the
/// worker reads after the signal fired are dropped, never delivered.
pub fn or_done<T: Send + 'static>(pipeline: &Pipeline, mut input: Stream<T>) -> Stream<T> {
    let (tx, output) = pipeline.stream();
    let worker = pipeline.clone();

    pipeline.spawn("or_done", async move {
        let signal = worker.signal();
        while let Some(value) = input.recv_or_done(signal).await {
            if !tx.send(value, signal).await.is_sent() {
                break;
            }
        }
        close_after(&worker, &input, tx);
    });

    output
}
