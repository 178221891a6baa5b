// Dispatch & Status Resolver
//
// Dispatches claimed jobs and records the outcome with one bulk update per
// outcome. Rows that stay IN_PROGRESS because an update failed are picked up
// by the reconciler.

use crate::domain::{JobId, JobStatus};
use crate::error::Result;
use crate::port::{JobDispatcher, JobStore};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOutcome {
    pub completed: usize,
    pub failed: usize,
}

pub struct DispatchResolver {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    concurrency: usize,
}

impl DispatchResolver {
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Dispatch every id, then mark successes COMPLETED and failures FAILED.
    ///
    /// Both updates are attempted even if the first one fails; the first
    /// update error is returned.
    pub async fn resolve(&self, ids: &[JobId]) -> Result<ResolveOutcome> {
        if ids.is_empty() {
            return Ok(ResolveOutcome::default());
        }

        let results: Vec<_> = stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.dispatcher.dispatch(id).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut completed = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => completed.push(id),
                Err(e) => {
                    warn!(job_id = id, error = %e, "Dispatch failed");
                    failed.push(id);
                }
            }
        }

        let completed_update = self.update(&completed, JobStatus::Completed).await;
        let failed_update = self.update(&failed, JobStatus::Failed).await;
        completed_update.and(failed_update)?;

        info!(
            completed = completed.len(),
            failed = failed.len(),
            "Batch resolved"
        );

        Ok(ResolveOutcome {
            completed: completed.len(),
            failed: failed.len(),
        })
    }

    async fn update(&self, ids: &[JobId], status: JobStatus) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        match self.store.mark_status(ids, status).await {
            Ok(touched) => {
                if touched < ids.len() as u64 {
                    warn!(
                        %status,
                        requested = ids.len(),
                        touched,
                        "Some jobs were no longer IN_PROGRESS"
                    );
                }
                Ok(())
            }
            Err(e) => {
                error!(%status, jobs = ids.len(), error = %e, "Status update failed");
                Err(e)
            }
        }
    }
}
