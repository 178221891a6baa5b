// Metrics Sink Port
// Samples are fire-and-forget; recording never fails and never blocks the caller.

use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Rows inserted per second by one persist call
    InsertRate,
    /// Jobs claimed per second by one claim round trip
    ClaimRate,
    /// Average seconds between due time and claim time
    DueDelay,
    /// Jobs waiting in INITIALIZED state
    JobsInQueue,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::InsertRate => "insert_rate",
            Metric::ClaimRate => "claim_rate",
            Metric::DueDelay => "due_delay_seconds",
            Metric::JobsInQueue => "jobs_in_queue",
        }
    }
}

pub trait MetricsSink: Send + Sync {
    fn record(&self, metric: Metric, value: f64);
}

/// Events per second over `elapsed`; a zero duration reports the raw count
pub fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        count as f64
    }
}

/// Emits each sample as a structured tracing event
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record(&self, metric: Metric, value: f64) {
        info!(target: "cadence::metrics", metric = metric.name(), value, "metric");
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingMetricsSink {
        samples: Mutex<Vec<(Metric, f64)>>,
    }

    impl RecordingMetricsSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn samples(&self) -> Vec<(Metric, f64)> {
            self.samples.lock().unwrap().clone()
        }

        pub fn values(&self, metric: Metric) -> Vec<f64> {
            self.samples()
                .into_iter()
                .filter(|(m, _)| *m == metric)
                .map(|(_, v)| v)
                .collect()
        }
    }

    impl MetricsSink for RecordingMetricsSink {
        fn record(&self, metric: Metric, value: f64) {
            self.samples.lock().unwrap().push((metric, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_second() {
        assert_eq!(per_second(10, Duration::from_secs(2)), 5.0);
        assert_eq!(per_second(3, Duration::ZERO), 3.0);
    }
}
