// Job Dispatcher Port
// Hands a claimed job to whatever executes it downstream

use crate::domain::JobId;
use async_trait::async_trait;
use thiserror::Error;

/// Dispatch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Dispatch timed out after {0}ms")]
    Timeout(u64),

    #[error("Job {job_id} rejected: {reason}")]
    Rejected { job_id: JobId, reason: String },

    #[error("Downstream unavailable: {0}")]
    Unavailable(String),
}

/// Job Dispatcher trait
///
/// Implementations:
/// - LogDispatcher: acknowledges every job
/// - SubprocessDispatcher: runs a configured command per job
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Deliver one job. `Ok(())` means the job completed downstream.
    async fn dispatch(&self, job_id: JobId) -> Result<(), DispatchError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Dispatcher that fails a fixed set of ids and succeeds for the rest
    pub struct ScriptedDispatcher {
        failing: HashSet<JobId>,
        calls: Mutex<Vec<JobId>>,
    }

    impl ScriptedDispatcher {
        pub fn new_success() -> Self {
            Self::failing([])
        }

        pub fn failing(ids: impl IntoIterator<Item = JobId>) -> Self {
            Self {
                failing: ids.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<JobId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobDispatcher for ScriptedDispatcher {
        async fn dispatch(&self, job_id: JobId) -> Result<(), DispatchError> {
            self.calls.lock().unwrap().push(job_id);
            if self.failing.contains(&job_id) {
                return Err(DispatchError::Rejected {
                    job_id,
                    reason: "scripted failure".to_string(),
                });
            }
            Ok(())
        }
    }
}
