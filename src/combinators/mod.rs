//! The stage combinators.
//!
//! Every combinator takes its input streams plus the [`Pipeline`] they run
//! in and returns fresh output streams. The combinator owns the producing
//! side of each output it returns and closes it exactly once, either when
//! its inputs are exhausted or when the pipeline's signal fires.
//!
//! [`Pipeline`]: crate::pipeline::Pipeline

pub mod bridge;
pub mod merge;
pub mod or_done;
pub mod parallel;
pub mod stage;
pub mod tee;

pub use bridge::bridge;
pub use merge::merge;
pub use or_done::or_done;
pub use parallel::parallel;
pub use stage::stage;
pub use tee::tee;

use crate::core::{Emitter, Stream};
use crate::pipeline::Pipeline;

/// Close `output`, carrying over a fault recorded on `input` or the fault
/// that cancelled the pipeline.
pub(crate) fn close_after<T, U>(pipeline: &Pipeline, input: &Stream<T>, output: Emitter<U>) {
    match input.outcome() {
        Ok(()) => pipeline.close(output),
        Err(error) => {
            tracing::debug!(error = %error, "propagating upstream fault");
            output.fail(error);
        }
    }
}
