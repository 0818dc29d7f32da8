//! Broadcast cancellation signal shared by every worker in a pipeline.
//!
//! A [`Signal`] starts armed and fires at most once. Firing is idempotent,
//! never blocks the caller and is observed by any number of concurrent
//! [`Observer`]s.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::core::error::{Error, Result};

/// A single-fire broadcast shutdown notification.
///
/// Cloning a `Signal` yields another handle to the same state; any handle
/// may fire it.
///
/// # Examples
///
/// ```rust
/// use pipeweld::core::Signal;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let signal = Signal::new();
/// let observer = signal.observe();
///
/// signal.fire();
/// signal.fire(); // no further effect
///
/// observer.fired().await;
/// assert!(observer.is_fired());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct Signal {
    token: CancellationToken,
}

impl Signal {
    /// Create a new armed signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that fires by itself once `deadline` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_deadline(deadline: Duration) -> Self {
        let signal = Self::new();
        signal.fire_after(deadline);
        signal
    }

    /// Arm a timer that fires this signal after `deadline`.
    ///
    /// The timer task exits early if the signal fires for another reason.
    pub fn fire_after(&self, deadline: Duration) {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    tracing::debug!(deadline_ms = millis(deadline), "deadline reached, firing signal");
                    token.cancel();
                }
            }
        });
    }

    /// Fire the signal. Calling this more than once has no additional effect.
    pub fn fire(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("signal fired");
        }
        self.token.cancel();
    }

    /// Whether the signal has fired
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires
    pub async fn fired(&self) {
        self.token.cancelled().await
    }

    /// Run `future` unless the signal fires first.
    ///
    /// Returns [`Error::Cancelled`] if the signal has fired, in which case
    /// `future` is dropped without completing.
    pub async fn or_cancel<F: Future>(&self, future: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled),
            output = future => Ok(output),
        }
    }

    /// Get a read-only observation handle
    pub fn observe(&self) -> Observer {
        Observer {
            token: self.token.clone(),
        }
    }

    /// Create a signal that fires when this one fires, but can also be
    /// fired on its own without affecting this one.
    pub fn child(&self) -> Signal {
        Signal {
            token: self.token.child_token(),
        }
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A read-only handle on a [`Signal`]. It can wait for the signal but never
/// fire it.
#[derive(Debug, Clone)]
pub struct Observer {
    token: CancellationToken,
}

impl Observer {
    /// Whether the observed signal has fired
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that completes once the signal has fired. It stays ready
    /// permanently afterwards, so it is safe to use in a `select!` loop.
    pub fn fired(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }
}
