//! Fan-in: many streams into one.

use std::future::Future;

use tokio::task::JoinSet;

use crate::core::{Emitter, Error, Result, Stream};
use crate::pipeline::Pipeline;

/// Merge every value of every input into one stream.
///
/// One forwarding worker runs per input. A supervisor waits for all of
/// them on a completion barrier and only then closes the output, so the
/// output is never closed while a forwarder could still send. Values from
/// different inputs may interleave in any order.
///
/// With no inputs the returned stream is already closed. If any input
/// failed, the output is marked failed once every forwarder is done.
pub fn merge<T: Send + 'static>(pipeline: &Pipeline, inputs: Vec<Stream<T>>) -> Stream<T> {
    let (tx, output) = pipeline.stream();
    if inputs.is_empty() {
        return output;
    }

    let count = inputs.len();
    let mut barrier = JoinSet::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let forwarder = forward(pipeline, input, tx.fork());
        barrier.spawn(pipeline.track("merge", forwarder));
        tracing::trace!(index, count, "merge forwarder spawned");
    }

    pipeline.spawn("merge-supervisor", supervise(pipeline.clone(), barrier, tx));
    output
}

/// Copy one input into the shared output until it closes or the signal fires.
fn forward<T: Send + 'static>(
    pipeline: &Pipeline,
    mut input: Stream<T>,
    tx: Emitter<T>,
) -> impl Future<Output = Result<()>> + Send + 'static {
    let signal = pipeline.signal().clone();
    async move {
        while let Some(value) = input.recv_or_done(&signal).await {
            if !tx.send(value, &signal).await.is_sent() {
                return Ok(());
            }
        }
        input.outcome()
    }
}

/// Wait for every forwarder, then close the output exactly once.
async fn supervise<T>(pipeline: Pipeline, mut barrier: JoinSet<Result<()>>, tx: Emitter<T>) {
    let mut faults = Vec::new();
    while let Some(joined) = barrier.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => faults.push(error),
            Err(join_error) if join_error.is_panic() => {
                faults.push(Error::panicked("merge", join_error.into_panic()));
            }
            Err(join_error) => faults.push(Error::custom(join_error.to_string())),
        }
    }

    match Error::from_many(faults) {
        Some(error) => tx.fail(error),
        None => pipeline.close(tx),
    }
    tracing::debug!("merge output closed");
}
