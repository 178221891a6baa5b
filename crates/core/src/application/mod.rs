// Application Layer - Use Cases and Business Logic

pub mod claimer;
pub mod expander;
pub mod inserter;
pub mod reconciler;
pub mod resolver;
pub mod stats;
pub mod submission;
pub mod worker;

// Re-exports
pub use claimer::{ClaimerConfig, DueJobClaimer};
pub use expander::{expand, nearest_weekday};
pub use inserter::BatchInserter;
pub use reconciler::{ReconcileReport, StuckJobReconciler};
pub use resolver::{DispatchResolver, ResolveOutcome};
pub use stats::{QueueStats, StatsService};
pub use submission::{SequenceService, SubmitOutcome, SubmitRequest};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken};
