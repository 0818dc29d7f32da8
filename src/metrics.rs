//! Metrics emitted through the `metrics` facade.
//!
//! Enabled with the `metrics` feature. Install any `metrics` recorder to
//! collect them.

/// A worker started running
pub fn worker_started(stage: &str) {
    metrics::counter!("pipeweld_workers_started_total", "stage" => stage.to_string()).increment(1);
    metrics::gauge!("pipeweld_workers_live").increment(1.0);
}

/// A worker exited, normally or not
pub fn worker_stopped(stage: &str) {
    metrics::counter!("pipeweld_workers_stopped_total", "stage" => stage.to_string()).increment(1);
    metrics::gauge!("pipeweld_workers_live").decrement(1.0);
}

/// A stage forwarded one value downstream
pub fn record_forwarded(stage: &str) {
    metrics::counter!("pipeweld_values_forwarded_total", "stage" => stage.to_string()).increment(1);
}

/// A stage fault was reported
pub fn record_fault() {
    metrics::counter!("pipeweld_faults_total").increment(1);
}
