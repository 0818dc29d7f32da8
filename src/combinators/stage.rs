//! Stage runner: one worker applying a [`Transform`] to every value.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;

use crate::combinators::close_after;
use crate::core::{Emitter, Error, Signal, Stream, Transform};
use crate::pipeline::Pipeline;

/// Run `transform` over `input` in its own worker.
///
/// The worker reads with cancellation, applies the transform and sends the
/// result with cancellation. It closes the returned stream exactly once,
/// when `input` is exhausted or the signal fires.
///
/// If the transform returns an error or panics, the worker stops, reports
/// the fault to the pipeline and marks the returned stream failed, so
/// consumers can tell it apart from a normal close.
pub fn stage<R: Transform>(
    pipeline: &Pipeline,
    input: Stream<R::Input>,
    transform: R,
) -> Stream<R::Output> {
    let (tx, output) = pipeline.stream();
    let name = transform.name().to_string();
    let worker = pipeline.clone();

    pipeline.spawn(&name, async move {
        run(&worker, Input::Owned(input), transform, tx).await;
    });

    output
}

/// Where a stage worker reads from: its own stream, or one shared with
/// sibling workers of a parallel stage.
pub(crate) enum Input<T> {
    Owned(Stream<T>),
    Shared(Arc<Mutex<Stream<T>>>),
}

impl<T> Input<T> {
    async fn next(&mut self, signal: &Signal) -> Option<T> {
        match self {
            Input::Owned(stream) => stream.recv_or_done(signal).await,
            Input::Shared(stream) => {
                tokio::select! {
                    biased;
                    _ = signal.fired() => None,
                    value = async { stream.lock().await.recv().await } => value,
                }
            }
        }
    }

    async fn close_output<U>(&self, pipeline: &Pipeline, output: Emitter<U>) {
        match self {
            Input::Owned(stream) => close_after(pipeline, stream, output),
            Input::Shared(stream) => close_after(pipeline, &*stream.lock().await, output),
        }
    }
}

/// The stage worker loop.
pub(crate) async fn run<R: Transform>(
    pipeline: &Pipeline,
    mut input: Input<R::Input>,
    mut transform: R,
    tx: Emitter<R::Output>,
) {
    let signal = pipeline.signal();
    let name = transform.name().to_string();

    while let Some(item) = input.next(signal).await {
        let applied = AssertUnwindSafe(transform.apply(item)).catch_unwind().await;
        let value = match applied {
            Ok(Ok(value)) => value,
            Ok(Err(error)) => {
                let error = Error::stage(name.as_str(), error);
                tx.fail(error.clone());
                pipeline.report_fault(error);
                return;
            }
            Err(payload) => {
                let error = Error::panicked(name.as_str(), payload);
                tx.fail(error.clone());
                pipeline.report_fault(error);
                return;
            }
        };

        if !tx.send(value, signal).await.is_sent() {
            pipeline.close(tx);
            return;
        }
        #[cfg(feature = "metrics")]
        crate::metrics::record_forwarded(&name);
    }

    input.close_output(pipeline, tx).await;
}
