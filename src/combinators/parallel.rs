//! Several copies of one stage sharing an input.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::combinators::merge;
use crate::combinators::stage::{run, Input};
use crate::core::{Stream, Transform};
use crate::pipeline::Pipeline;

/// Run `workers` stage workers over one shared input and merge their
/// outputs.
///
/// Each worker gets its own transform from `make` and pulls the next value
/// from `input` whenever it is free. Output order across workers is not
/// preserved. `workers == 0` uses the pipeline's `max_concurrency`.
pub fn parallel<R, M>(
    pipeline: &Pipeline,
    input: Stream<R::Input>,
    workers: usize,
    mut make: M,
) -> Stream<R::Output>
where
    R: Transform,
    M: FnMut() -> R,
{
    let workers = if workers == 0 {
        pipeline.config().max_concurrency.max(1)
    } else {
        workers
    };
    let shared = Arc::new(Mutex::new(input));

    let outputs = (0..workers)
        .map(|_| {
            let transform = make();
            let name = transform.name().to_string();
            let (tx, output) = pipeline.stream();
            let input = Input::Shared(shared.clone());
            let worker = pipeline.clone();
            pipeline.spawn(&name, async move {
                run(&worker, input, transform, tx).await;
            });
            output
        })
        .collect();

    merge(pipeline, outputs)
}
