//! Pipeline context and configuration.
//!
//! A [`Pipeline`] is the handle every combinator is built from. It bundles
//! the shared cancellation [`Signal`], the [`PipelineConfig`], a tracker
//! for every worker spawned on behalf of the pipeline, and the fault report
//! that supervising callers inspect once the pipeline has unwound.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::combinators;
use crate::core::signal::millis;
use crate::core::{channel, Emitter, Error, Observer, Result, Signal, Stream, Transform};
use crate::core::{MapFn, TryMapFn};

/// Configuration for pipeline execution
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Number of values a stream buffers before a send has to wait
    pub buffer_size: usize,
    /// Default number of workers for [`Pipeline::parallel`]
    pub max_concurrency: usize,
    /// Whether the first transform fault fires the signal
    pub fail_fast: bool,
    /// Fire the signal automatically after this long
    pub deadline: Option<Duration>,
    /// Maximum time [`Pipeline::wait`] waits for workers to exit
    pub shutdown_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1,
            max_concurrency: 4,
            fail_fast: true,
            deadline: None,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// A pipeline instance: one signal, one worker tracker, one fault report.
///
/// Cloning is cheap and every clone refers to the same pipeline.
///
/// # Examples
///
/// ```rust
/// use pipeweld::prelude::*;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pipeline = Pipeline::new().buffer_size(4);
///
/// let source = pipeline.from_iter(1..=3);
/// let doubled = pipeline.map("double", source, |x: i32| x * 2);
/// let values = collect(doubled).await.unwrap();
///
/// assert_eq!(values, vec![2, 4, 6]);
/// pipeline.wait().await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct Pipeline {
    signal: Signal,
    config: PipelineConfig,
    tracker: TaskTracker,
    faults: Arc<Mutex<Vec<Error>>>,
    waiters: Arc<Mutex<usize>>,
}

impl Pipeline {
    /// Create a pipeline with the default configuration
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a pipeline from an explicit configuration.
    ///
    /// If the configuration carries a deadline this must be called from
    /// within a tokio runtime.
    pub fn with_config(mut config: PipelineConfig) -> Self {
        config.buffer_size = config.buffer_size.max(1);
        config.max_concurrency = config.max_concurrency.max(1);
        let signal = Signal::new();
        if let Some(deadline) = config.deadline {
            signal.fire_after(deadline);
        }
        Self {
            signal,
            config,
            tracker: TaskTracker::new(),
            faults: Arc::new(Mutex::new(Vec::new())),
            waiters: Arc::new(Mutex::new(0)),
        }
    }

    /// Set the buffer size of streams created from now on
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size.max(1);
        self
    }

    /// Set the default worker count for parallel stages
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.config.max_concurrency = max.max(1);
        self
    }

    /// Set whether the first fault cancels the whole pipeline
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    /// Fire the signal after `deadline`. Must be called within a tokio runtime.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.config.deadline = Some(deadline);
        self.signal.fire_after(deadline);
        self
    }

    /// Set how long [`wait`](Self::wait) waits for workers
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The pipeline's signal
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// A read-only handle on the pipeline's signal
    pub fn observe(&self) -> Observer {
        self.signal.observe()
    }

    /// Fire the signal, asking every worker to stop
    pub fn cancel(&self) {
        self.signal.fire();
    }

    /// Whether the signal has fired
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_fired()
    }

    /// Number of workers that have not exited yet
    pub fn live_workers(&self) -> usize {
        self.tracker.len()
    }

    /// Snapshot of every fault reported so far
    pub fn faults(&self) -> Vec<Error> {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Wait until every worker has exited, then return the fault report.
    ///
    /// Fails with [`Error::Timeout`] if workers are still running after the
    /// configured shutdown timeout.
    ///
    /// Any number of clones may wait at once. The tracker accepts new
    /// workers again once the last waiter returns.
    pub async fn wait(&self) -> Result<()> {
        let timeout = self.config.shutdown_timeout;
        let idle = {
            let _waiting = WaitGuard::enter(self);
            tokio::time::timeout(timeout, self.tracker.wait()).await
        };

        if idle.is_err() {
            let timeout_ms = millis(timeout);
            tracing::warn!(
                live_workers = self.tracker.len(),
                timeout_ms,
                "workers did not exit in time"
            );
            return Err(Error::timeout(timeout_ms));
        }

        match Error::from_many(self.faults()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Fire the signal and wait for every worker to exit
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel();
        self.wait().await
    }

    /// The fault that cancelled the pipeline, if the signal fired because
    /// a fault was reported with `fail_fast` set
    pub fn cancelling_fault(&self) -> Option<Error> {
        if !self.config.fail_fast || !self.signal.is_fired() {
            return None;
        }
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .cloned()
    }

    /// Close `output` for a worker that stopped without an upstream fault.
    ///
    /// If a fault cancelled the pipeline the output is failed with it, so
    /// downstream never mistakes a crash for a normal end.
    pub(crate) fn close<U>(&self, output: Emitter<U>) {
        match self.cancelling_fault() {
            Some(error) => {
                tracing::debug!(error = %error, "closing output with cancelling fault");
                output.fail(error);
            }
            None => drop(output),
        }
    }

    /// Create a new stream using the configured buffer size
    pub fn stream<T>(&self) -> (Emitter<T>, Stream<T>) {
        channel(self.config.buffer_size)
    }

    /// Record a fault in the report, firing the signal if `fail_fast` is set.
    ///
    /// The fault is in the report before the signal fires.
    pub fn report_fault(&self, error: Error) {
        tracing::error!(error = %error, "stage fault");
        #[cfg(feature = "metrics")]
        crate::metrics::record_fault();

        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);

        if self.config.fail_fast {
            self.signal.fire();
        }
    }

    /// Wrap a worker future so it is counted as live until it completes
    pub(crate) fn track<F>(&self, stage: &str, future: F) -> impl Future<Output = F::Output> + Send + 'static
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = WorkerGuard::new(stage);
        let span = tracing::debug_span!("worker", stage = %stage);
        self.tracker.track_future(
            async move {
                let _guard = guard;
                future.await
            }
            .instrument(span),
        )
    }

    /// Spawn a worker owned by this pipeline
    pub fn spawn<F>(&self, stage: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.track(stage, future))
    }

    /// Wrap `input` so it also closes when the signal fires
    pub fn or_done<T: Send + 'static>(&self, input: Stream<T>) -> Stream<T> {
        combinators::or_done(self, input)
    }

    /// Run `transform` as a stage worker over `input`
    pub fn stage<R: Transform>(&self, input: Stream<R::Input>, transform: R) -> Stream<R::Output> {
        combinators::stage(self, input, transform)
    }

    /// Run an infallible closure as a stage worker
    pub fn map<F, T, U>(&self, name: &str, input: Stream<T>, f: F) -> Stream<U>
    where
        F: FnMut(T) -> U + Send + 'static,
        T: Send + 'static,
        U: Send + 'static,
    {
        combinators::stage(self, input, MapFn::new(name, f))
    }

    /// Run a fallible closure as a stage worker
    pub fn try_map<F, T, U>(&self, name: &str, input: Stream<T>, f: F) -> Stream<U>
    where
        F: FnMut(T) -> Result<U> + Send + 'static,
        T: Send + 'static,
        U: Send + 'static,
    {
        combinators::stage(self, input, TryMapFn::new(name, f))
    }

    /// Fan several streams into one
    pub fn merge<T: Send + 'static>(&self, inputs: Vec<Stream<T>>) -> Stream<T> {
        combinators::merge(self, inputs)
    }

    /// Split one stream into two that each receive every value
    pub fn tee<T: Clone + Send + 'static>(&self, input: Stream<T>) -> (Stream<T>, Stream<T>) {
        combinators::tee(self, input)
    }

    /// Flatten a stream of streams, one inner stream at a time
    pub fn bridge<T: Send + 'static>(&self, streams: Stream<Stream<T>>) -> Stream<T> {
        combinators::bridge(self, streams)
    }

    /// Run `workers` copies of a transform over one shared input and merge
    /// their outputs. Zero workers means `max_concurrency`.
    pub fn parallel<R, M>(&self, input: Stream<R::Input>, workers: usize, make: M) -> Stream<R::Output>
    where
        R: Transform,
        M: FnMut() -> R,
    {
        combinators::parallel(self, input, workers, make)
    }

    /// Emit every item of `iter` into a new stream
    pub fn from_iter<I>(&self, iter: I) -> Stream<I::Item>
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Send + 'static,
    {
        crate::sources::from_iter(self, iter)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("cancelled", &self.signal.is_fired())
            .field("live_workers", &self.tracker.len())
            .finish()
    }
}

/// Holds the tracker closed while at least one caller is in
/// [`Pipeline::wait`]. Reopens it when the last waiter leaves, including a
/// waiter whose future was dropped.
struct WaitGuard<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> WaitGuard<'a> {
    fn enter(pipeline: &'a Pipeline) -> Self {
        let mut waiters = pipeline.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        if *waiters == 0 {
            pipeline.tracker.close();
        }
        *waiters += 1;
        Self { pipeline }
    }
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut waiters = self
            .pipeline
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *waiters -= 1;
        if *waiters == 0 {
            self.pipeline.tracker.reopen();
        }
    }
}

/// Logs worker start and exit. Exit is logged from `Drop`, so it also
/// covers panics and aborts.
struct WorkerGuard {
    stage: String,
}

impl WorkerGuard {
    fn new(stage: &str) -> Self {
        tracing::debug!(stage, "worker started");
        #[cfg(feature = "metrics")]
        crate::metrics::worker_started(stage);
        Self {
            stage: stage.to_string(),
        }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        tracing::debug!(stage = %self.stage, "worker exited");
        #[cfg(feature = "metrics")]
        crate::metrics::worker_stopped(&self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_size, 1);
        assert!(config.fail_fast);
        assert!(config.deadline.is_none());
    }

    #[tokio::test]
    async fn test_builder_clamps_sizes() {
        let pipeline = Pipeline::new().buffer_size(0).max_concurrency(0);
        assert_eq!(pipeline.config().buffer_size, 1);
        assert_eq!(pipeline.config().max_concurrency, 1);
    }

    #[tokio::test]
    async fn test_with_config_clamps_sizes() {
        let config = PipelineConfig {
            buffer_size: 0,
            max_concurrency: 0,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::with_config(config);
        assert_eq!(pipeline.config().buffer_size, 1);
        assert_eq!(pipeline.config().max_concurrency, 1);
    }

    #[tokio::test]
    async fn test_clones_share_signal() {
        let pipeline = Pipeline::new();
        let other = pipeline.clone();
        other.cancel();
        assert!(pipeline.is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_tracks_workers() {
        let pipeline = Pipeline::new();
        let signal = pipeline.signal().clone();
        pipeline.spawn("sleeper", async move { signal.fired().await });
        assert_eq!(pipeline.live_workers(), 1);

        pipeline.shutdown().await.unwrap();
        assert_eq!(pipeline.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let pipeline = Pipeline::new().shutdown_timeout(Duration::from_millis(20));
        let signal = pipeline.signal().clone();
        // Ignores everything but the signal, which nobody fires
        pipeline.spawn("stuck", async move { signal.fired().await });

        let result = pipeline.wait().await;
        assert!(matches!(result, Err(Error::Timeout { duration_ms: 20 })));

        pipeline.cancel();
        pipeline.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_waiters() {
        let pipeline = Pipeline::new().shutdown_timeout(Duration::from_secs(2));
        pipeline.spawn("sleeper", async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        });

        let patient = pipeline.clone();
        let long_wait = tokio::spawn(async move { patient.wait().await });
        tokio::time::sleep(Duration::from_millis(5)).await;

        // A clone with a short timeout gives up while the other waiter is
        // still inside wait
        let hasty = pipeline.clone().shutdown_timeout(Duration::from_millis(10));
        assert!(matches!(hasty.wait().await, Err(Error::Timeout { .. })));

        let waited = tokio::time::timeout(Duration::from_secs(1), long_wait)
            .await
            .expect("long waiter did not see the worker exit")
            .unwrap();
        assert!(waited.is_ok());

        // The tracker accepts and waits for new workers afterwards
        pipeline.spawn("later", async {});
        pipeline.wait().await.unwrap();
        assert_eq!(pipeline.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_cancelling_fault() {
        let pipeline = Pipeline::new();
        assert!(pipeline.cancelling_fault().is_none());
        pipeline.report_fault(Error::custom("first"));
        pipeline.report_fault(Error::custom("second"));
        assert!(matches!(pipeline.cancelling_fault(), Some(Error::Custom(ref m)) if m == "first"));

        let lenient = Pipeline::new().fail_fast(false);
        lenient.report_fault(Error::custom("ignored"));
        lenient.cancel();
        assert!(lenient.cancelling_fault().is_none());
    }

    #[tokio::test]
    async fn test_user_cancel_has_no_cancelling_fault() {
        let pipeline = Pipeline::new();
        pipeline.cancel();
        assert!(pipeline.cancelling_fault().is_none());
    }

    #[tokio::test]
    async fn test_fault_report() {
        let pipeline = Pipeline::new().fail_fast(false);
        pipeline.report_fault(Error::custom("one"));
        assert!(!pipeline.is_cancelled());
        assert!(matches!(pipeline.wait().await, Err(Error::Custom(_))));

        pipeline.report_fault(Error::custom("two"));
        assert!(matches!(pipeline.wait().await, Err(Error::Multiple(ref e)) if e.len() == 2));
    }

    #[tokio::test]
    async fn test_fail_fast_cancels() {
        let pipeline = Pipeline::new();
        pipeline.report_fault(Error::custom("boom"));
        assert!(pipeline.is_cancelled());
    }

    #[tokio::test]
    async fn test_config_deadline() {
        let config = PipelineConfig {
            deadline: Some(Duration::from_millis(10)),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::with_config(config);
        tokio::time::timeout(Duration::from_secs(2), pipeline.signal().fired())
            .await
            .unwrap();
    }
}
