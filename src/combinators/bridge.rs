//! Flatten a stream of streams.

use crate::combinators::close_after;
use crate::core::Stream;
use crate::pipeline::Pipeline;

/// Concatenate the inner streams of `streams` into one stream.
///
/// Inner streams are taken in the order they arrive and each is drained
/// completely before the next is taken, so values of two inner streams
/// never interleave. The output closes once the outer stream and the last
/// inner stream are exhausted, or as soon as the signal fires.
///
/// A failed inner stream fails the output and ends the bridge.
pub fn bridge<T: Send + 'static>(pipeline: &Pipeline, mut streams: Stream<Stream<T>>) -> Stream<T> {
    let (tx, output) = pipeline.stream();
    let worker = pipeline.clone();

    pipeline.spawn("bridge", async move {
        let signal = worker.signal();
        let mut index = 0usize;
        while let Some(mut inner) = streams.recv_or_done(signal).await {
            while let Some(value) = inner.recv_or_done(signal).await {
                if !tx.send(value, signal).await.is_sent() {
                    worker.close(tx);
                    return;
                }
            }
            if let Err(error) = inner.outcome() {
                tracing::debug!(index, error = %error, "inner stream failed");
                tx.fail(error);
                return;
            }
            if signal.is_fired() {
                worker.close(tx);
                return;
            }
            tracing::trace!(index, "inner stream drained");
            index += 1;
        }
        close_after(&worker, &streams, tx);
    });

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Error, Signal};
    use crate::sinks::collect;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concatenates_in_arrival_order() {
        let pipeline = Pipeline::new();
        let a = pipeline.from_iter(vec![1, 2]);
        let b = pipeline.from_iter(vec![3, 4]);
        let streams = pipeline.from_iter(vec![a, b]);

        let values = collect(bridge(&pipeline, streams)).await.unwrap();
        assert_eq!(values, vec![1, 2, 3, 4]);
        pipeline.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_no_interleaving_with_slow_first_stream() {
        let pipeline = Pipeline::new().buffer_size(4);
        let signal = Signal::new();
        let (slow_tx, slow) = pipeline.stream();
        // The second stream is complete before the first has produced anything
        let fast = pipeline.from_iter(vec![3, 4]);
        let streams = pipeline.from_iter(vec![slow, fast]);
        let output = bridge(&pipeline, streams);

        tokio::spawn(async move {
            for v in [1, 2] {
                tokio::time::sleep(Duration::from_millis(10)).await;
                slow_tx.send(v, &signal).await;
            }
        });

        assert_eq!(collect(output).await.unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_outer_stream() {
        let pipeline = Pipeline::new();
        let streams = pipeline.from_iter(Vec::<Stream<u8>>::new());
        assert!(collect(bridge(&pipeline, streams)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_drain() {
        let pipeline = Pipeline::new();
        let endless = pipeline.from_iter(0u64..);
        let never_reached = pipeline.from_iter(vec![u64::MAX]);
        let streams = pipeline.from_iter(vec![endless, never_reached]);
        let mut output = bridge(&pipeline, streams);

        assert_eq!(output.recv().await, Some(0));
        pipeline.cancel();

        let rest = tokio::time::timeout(Duration::from_secs(1), async {
            let mut rest = Vec::new();
            while let Some(v) = output.recv().await {
                rest.push(v);
            }
            rest
        })
        .await
        .unwrap();
        assert!(!rest.contains(&u64::MAX));
        pipeline.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_inner_stream() {
        let pipeline = Pipeline::new();
        let signal = Signal::new();
        let (bad_tx, bad) = pipeline.stream();
        bad_tx.send(1, &signal).await;
        bad_tx.fail(Error::custom("inner"));
        let after = pipeline.from_iter(vec![2]);
        let streams = pipeline.from_iter(vec![bad, after]);

        let mut output = bridge(&pipeline, streams);
        assert_eq!(output.recv().await, Some(1));
        assert_eq!(output.recv().await, None);
        assert!(output.is_failed());
    }
}
