//! Streams: the unit of data flow between stages.
//!
//! A stream is created as an ([`Emitter`], [`Stream`]) pair. The emitter is
//! the producing side and is owned by exactly one worker; dropping it closes
//! the stream, so every exit path closes exactly once. [`Emitter::fail`]
//! records a fault before closing, which lets consumers tell a crashed
//! producer apart from an exhausted one.

use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::core::error::{Error, Result};
use crate::core::signal::Signal;

/// Shared terminal state of a stream
#[derive(Debug, Default)]
struct Status {
    fault: OnceLock<Error>,
}

/// Result of a cancellation-aware send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The value was handed to the stream
    Sent,
    /// The signal fired before the value could be handed off
    Cancelled,
    /// The consumer dropped its end of the stream
    Abandoned,
}

impl Delivery {
    /// Whether the producer may keep sending
    pub fn is_sent(self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Create a new stream with room for `capacity` in-flight values.
///
/// A capacity of zero is treated as one.
pub fn channel<T>(capacity: usize) -> (Emitter<T>, Stream<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let status = Arc::new(Status::default());
    (
        Emitter {
            tx,
            status: status.clone(),
        },
        Stream { rx, status },
    )
}

/// The producing side of a stream.
#[derive(Debug)]
pub struct Emitter<T> {
    tx: mpsc::Sender<T>,
    status: Arc<Status>,
}

impl<T> Emitter<T> {
    /// Send a value, racing the hand-off against `signal`.
    ///
    /// If the signal has already fired the value is dropped without being
    /// sent.
    pub async fn send(&self, value: T, signal: &Signal) -> Delivery {
        tokio::select! {
            biased;
            _ = signal.fired() => Delivery::Cancelled,
            result = self.tx.send(value) => match result {
                Ok(()) => Delivery::Sent,
                Err(_) => Delivery::Abandoned,
            },
        }
    }

    /// Wait for buffer space. Returns `None` if the consumer is gone.
    ///
    /// Dropping the returned future gives up the reservation, so this is
    /// safe to race in a `select!`.
    pub(crate) async fn reserve(&self) -> Option<mpsc::Permit<'_, T>> {
        self.tx.reserve().await.ok()
    }

    /// Whether the consumer has dropped its end
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    /// Mark the stream failed, then close it.
    ///
    /// Only the first fault recorded on a stream is kept.
    pub fn fail(self, error: Error) {
        let _ = self.status.fault.set(error);
    }

    /// Another producing handle for the same stream. The stream closes once
    /// every handle is gone.
    pub(crate) fn fork(&self) -> Emitter<T> {
        Emitter {
            tx: self.tx.clone(),
            status: self.status.clone(),
        }
    }
}

/// The consuming side of a stream.
///
/// `Stream` also implements [`futures_core::Stream`], so the usual
/// `StreamExt` adapters work on it.
#[derive(Debug)]
pub struct Stream<T> {
    rx: mpsc::Receiver<T>,
    status: Arc<Status>,
}

impl<T> Stream<T> {
    /// Receive the next value, or `None` once the stream is closed
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Receive the next value unless `signal` fires first.
    ///
    /// Once the signal has fired this returns `None` even if values are
    /// still buffered, so cancellation and exhaustion look the same to the
    /// caller.
    pub async fn recv_or_done(&mut self, signal: &Signal) -> Option<T> {
        tokio::select! {
            biased;
            _ = signal.fired() => None,
            value = self.rx.recv() => value,
        }
    }

    /// How the producer ended the stream.
    ///
    /// `Ok(())` means it closed normally (or has not failed yet); `Err`
    /// carries the fault that terminated the producer.
    pub fn outcome(&self) -> Result<()> {
        match self.status.fault.get() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Whether the producer recorded a fault
    pub fn is_failed(&self) -> bool {
        self.status.fault.get().is_some()
    }

    /// Stop accepting new values. Values already buffered can still be
    /// received.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Build a stream that is already closed
    pub fn empty() -> Self {
        let (_, stream) = channel(1);
        stream
    }
}

impl<T> futures_core::Stream for Stream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}
