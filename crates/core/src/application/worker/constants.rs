// Worker constants (No magic values)
use std::time::Duration;

/// Sleep duration when a claim returned no jobs (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after a failed claim before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Jobs claimed per round trip
pub const DEFAULT_CLAIM_BATCH_SIZE: i64 = 1000;

/// Advisory lock key shared by every claimer of one jobs table
pub const DEFAULT_CLAIM_LOCK_KEY: i64 = 1;

/// How long a job may stay IN_PROGRESS before the reconciler requeues it.
/// Also the reconciler tick period.
pub const DEFAULT_MAX_PROCESSING_TIME: Duration = Duration::from_secs(15);

/// PostgreSQL bind parameter ceiling for one statement
pub const DEFAULT_MAX_BIND_PARAMS: usize = 65_535;

/// Dispatches in flight per claimed batch
pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 16;
