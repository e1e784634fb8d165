use crate::collectors::{error::GatherError, row::Metric};
use std::sync::{Mutex, MutexGuard};

/// Receives metrics and errors as a gather cycle produces them.
pub trait MetricSink: Send + Sync {
    fn add_metric(&self, metric: Metric);

    fn add_error(&self, error: GatherError);
}

/// Sink that keeps everything for one gather cycle.
#[derive(Debug, Default)]
pub struct MetricBuffer {
    metrics: Mutex<Vec<Metric>>,
    errors: Mutex<Vec<GatherError>>,
}

impl MetricBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the buffered metrics, leaving the buffer empty.
    #[must_use]
    pub fn take_metrics(&self) -> Vec<Metric> {
        std::mem::take(&mut *lock(&self.metrics))
    }

    #[must_use]
    pub fn take_errors(&self) -> Vec<GatherError> {
        std::mem::take(&mut *lock(&self.errors))
    }

    #[must_use]
    pub fn metric_count(&self) -> usize {
        lock(&self.metrics).len()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        lock(&self.errors).len()
    }
}

impl MetricSink for MetricBuffer {
    fn add_metric(&self, metric: Metric) {
        lock(&self.metrics).push(metric);
    }

    fn add_error(&self, error: GatherError) {
        lock(&self.errors).push(error);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("MetricBuffer lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
