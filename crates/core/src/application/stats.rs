// Queue Statistics Use Case

use crate::domain::JobStatus;
use crate::error::Result;
use crate::port::JobStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Row counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub initialized: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub failed: i64,
}

pub struct StatsService {
    store: Arc<dyn JobStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn snapshot(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            initialized: self.store.count_by_status(JobStatus::Initialized).await?,
            in_progress: self.store.count_by_status(JobStatus::InProgress).await?,
            completed: self.store.count_by_status(JobStatus::Completed).await?,
            failed: self.store.count_by_status(JobStatus::Failed).await?,
        })
    }
}
