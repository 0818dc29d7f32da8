//! Fan-out: one stream into two.

use crate::combinators::close_after;
use crate::core::{Emitter, Signal, Stream};
use crate::pipeline::Pipeline;

/// Split `input` into two streams that each receive every value.
///
/// A value is delivered to both outputs before the next one is read, so
/// the slower consumer paces the tee. Neither output blocks the other:
/// whichever is ready first is served first, and the other is then
/// awaited alone. If the signal fires mid-delivery, the value may reach
/// only one output. Both outputs close together.
///
/// An output whose consumer has been dropped counts as delivered; the tee
/// keeps serving the other one.
pub fn tee<T: Clone + Send + 'static>(
    pipeline: &Pipeline,
    mut input: Stream<T>,
) -> (Stream<T>, Stream<T>) {
    let (left_tx, left) = pipeline.stream();
    let (right_tx, right) = pipeline.stream();
    let worker = pipeline.clone();

    pipeline.spawn("tee", async move {
        let signal = worker.signal();
        while let Some(value) = input.recv_or_done(signal).await {
            if !deliver_both(value, &left_tx, &right_tx, signal).await {
                tracing::debug!("tee cancelled mid-delivery");
                worker.close(left_tx);
                worker.close(right_tx);
                return;
            }
            if left_tx.is_abandoned() && right_tx.is_abandoned() {
                return;
            }
        }

        close_after(&worker, &input, left_tx);
        close_after(&worker, &input, right_tx);
    });

    (left, right)
}

/// Hand `value` to both outputs. Returns `false` if the signal fired first.
async fn deliver_both<T: Clone>(
    value: T,
    left: &Emitter<T>,
    right: &Emitter<T>,
    signal: &Signal,
) -> bool {
    let mut left_pending = true;
    let mut right_pending = true;

    while left_pending || right_pending {
        tokio::select! {
            biased;
            _ = signal.fired() => return false,
            permit = left.reserve(), if left_pending => {
                if let Some(permit) = permit {
                    permit.send(value.clone());
                }
                left_pending = false;
            }
            permit = right.reserve(), if right_pending => {
                if let Some(permit) = permit {
                    permit.send(value.clone());
                }
                right_pending = false;
            }
        }
    }
    true
}
