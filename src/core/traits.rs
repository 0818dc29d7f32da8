//! Core traits for stage transforms.
//!
//! A [`Transform`] is the per-value work a stage worker performs. The
//! concurrency (reading, cancellation, sending, closing) is handled by the
//! stage runner; a transform only maps one input to one output.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::core::error::Result;

/// A one-input, one-output transformation run by a stage worker.
///
/// Returning `Err` is a fault: the stage stops and its output stream is
/// marked failed.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipeweld::core::{Result, Transform};
///
/// struct Double;
///
/// #[async_trait]
/// impl Transform for Double {
///     type Input = i32;
///     type Output = i32;
///
///     async fn apply(&mut self, item: i32) -> Result<i32> {
///         Ok(item * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait Transform: Send + 'static {
    /// The type of items this transform accepts
    type Input: Send + 'static;
    /// The type of items this transform produces
    type Output: Send + 'static;

    /// Transform a single item
    async fn apply(&mut self, item: Self::Input) -> Result<Self::Output>;

    /// Name used in logs and fault reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// A transform built from an infallible closure
pub struct MapFn<F, T, U> {
    name: String,
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<F, T, U> MapFn<F, T, U>
where
    F: FnMut(T) -> U + Send + 'static,
{
    /// Create a new map transform
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> Transform for MapFn<F, T, U>
where
    F: FnMut(T) -> U + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn apply(&mut self, item: T) -> Result<U> {
        Ok((self.f)(item))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A transform built from a fallible closure
pub struct TryMapFn<F, T, U> {
    name: String,
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<F, T, U> TryMapFn<F, T, U>
where
    F: FnMut(T) -> Result<U> + Send + 'static,
{
    /// Create a new fallible map transform
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> Transform for TryMapFn<F, T, U>
where
    F: FnMut(T) -> Result<U> + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn apply(&mut self, item: T) -> Result<U> {
        (self.f)(item)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A transform built from an async closure
pub struct ThenFn<F, Fut, T, U> {
    name: String,
    f: F,
    _phantom: PhantomData<fn(T) -> (Fut, U)>,
}

impl<F, Fut, T, U> ThenFn<F, Fut, T, U>
where
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<U>> + Send + 'static,
{
    /// Create a new async transform
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T, U> Transform for ThenFn<F, Fut, T, U>
where
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<U>> + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn apply(&mut self, item: T) -> Result<U> {
        (self.f)(item).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
