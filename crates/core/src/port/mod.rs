// Port Layer - Interfaces for external dependencies

pub mod dispatcher;
pub mod job_store;
pub mod metrics;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use dispatcher::{DispatchError, JobDispatcher};
pub use job_store::JobStore;
pub use metrics::{per_second, Metric, MetricsSink, TracingMetricsSink};
pub use time_provider::{SystemTimeProvider, TimeProvider};
