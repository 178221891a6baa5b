//! RPC Request/Response Types

use cadence_core::application::{QueueStats, SubmitOutcome, SubmitRequest};
use serde::{Deserialize, Serialize};

/// sequence.submit.v1 - Schedule a sequence for a number of subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSequenceRequest {
    pub steps: Vec<serde_json::Value>,
    pub subscribers: i64,
}

impl From<SubmitSequenceRequest> for SubmitRequest {
    fn from(req: SubmitSequenceRequest) -> Self {
        SubmitRequest {
            steps: req.steps,
            subscribers: req.subscribers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSequenceResponse {
    pub jobs_scheduled: u64,
}

impl From<SubmitOutcome> for SubmitSequenceResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        Self {
            jobs_scheduled: outcome.jobs_scheduled,
        }
    }
}

/// admin.stats.v1 - Queue depth per status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub initialized_jobs: i64,
    pub in_progress_jobs: i64,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub uptime_seconds: u64,
}

impl StatsResponse {
    pub fn new(stats: QueueStats, uptime_seconds: u64) -> Self {
        Self {
            initialized_jobs: stats.initialized,
            in_progress_jobs: stats.in_progress,
            completed_jobs: stats.completed,
            failed_jobs: stats.failed,
            uptime_seconds,
        }
    }
}
