//! Core types for the pipeweld library.
//!
//! This module contains the fundamental building blocks every combinator is
//! made of: the cancellation [`Signal`], the [`Stream`]/[`Emitter`] pair,
//! the [`Transform`] trait and the error types.

pub mod error;
pub mod signal;
pub mod stream;
pub mod traits;

// Re-export core items
pub use error::{Error, IntoError, Result};
pub use signal::{Observer, Signal};
pub use stream::{channel, Delivery, Emitter, Stream};
pub use traits::{MapFn, ThenFn, Transform, TryMapFn};
