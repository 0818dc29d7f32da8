//! # Cancelable concurrent stream pipelines
//!
//! This crate provides a small set of composable combinators for building
//! pipelines out of independently running stages, with one uniform
//! cancellation mechanism that unwinds an arbitrarily deep or branching
//! graph of stages without leaking workers.
//!
//! ## Core Concepts
//!
//! - **Signal**: broadcast, fire-once cancellation shared by a pipeline
//! - **Stream**: a channel of values, closed exactly once by its producer
//! - **or_done**: a stream that also closes when the signal fires
//! - **stage**: runs a transform over a stream in its own worker
//! - **merge**: fans many streams into one
//! - **tee**: duplicates one stream into two
//! - **bridge**: flattens a stream of streams
//!
//! ## Example
//!
//! ```rust
//! use pipeweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pipeline = Pipeline::new();
//!
//!     let words = pipeline.from_iter(vec!["FOO", "BAR", "BAX"]);
//!     let lower = pipeline.map("lower", words, |s: &'static str| s.to_lowercase());
//!     let (left, right) = pipeline.tee(lower);
//!     let both = pipeline.merge(vec![left, right]);
//!
//!     assert_eq!(collect(both).await?.len(), 6);
//!     pipeline.wait().await
//! }
//! ```

pub mod combinators;
pub mod core;
pub mod pipeline;
pub mod sinks;
pub mod sources;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{
        Delivery, Emitter, Error, IntoError, MapFn, Observer, Result, Signal, Stream, ThenFn,
        Transform, TryMapFn,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig};
    pub use crate::sinks::{collect, count, for_each};
    pub use crate::sources::{from_iter, from_stream};
}

// Re-export main error type
pub use crate::core::{Error, Result};

// Feature flags for optional dependencies
#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
