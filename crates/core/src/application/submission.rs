// Sequence Submission Use Case

use crate::application::expander::expand;
use crate::application::inserter::BatchInserter;
use crate::domain::{JobDefaults, Sequence};
use crate::error::Result;
use crate::port::TimeProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Submission request as received over the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub steps: Vec<serde_json::Value>,
    pub subscribers: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub jobs_scheduled: u64,
}

/// Parses, expands and persists submitted sequences
pub struct SequenceService {
    inserter: Arc<BatchInserter>,
    time_provider: Arc<dyn TimeProvider>,
    defaults: JobDefaults,
}

impl SequenceService {
    pub fn new(
        inserter: Arc<BatchInserter>,
        time_provider: Arc<dyn TimeProvider>,
        defaults: JobDefaults,
    ) -> Self {
        Self {
            inserter,
            time_provider,
            defaults,
        }
    }

    /// Execute a submission. Malformed input is rejected before the store is touched.
    pub async fn submit(&self, req: SubmitRequest) -> Result<SubmitOutcome> {
        let sequence = Sequence::from_request(&req.steps, req.subscribers)?;
        let templates = expand(&sequence.steps, self.time_provider.now(), &self.defaults)?;

        let jobs_scheduled = self
            .inserter
            .persist(&templates, sequence.subscriber_count)
            .await?;

        info!(
            steps = sequence.steps.len(),
            templates = templates.len(),
            subscribers = sequence.subscriber_count,
            jobs_scheduled,
            "Sequence submitted"
        );

        Ok(SubmitOutcome { jobs_scheduled })
    }
}
