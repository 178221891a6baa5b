// Log dispatcher: acknowledges every job without running anything

use async_trait::async_trait;
use cadence_core::domain::JobId;
use cadence_core::port::{DispatchError, JobDispatcher};
use tracing::info;

#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl JobDispatcher for LogDispatcher {
    async fn dispatch(&self, job_id: JobId) -> Result<(), DispatchError> {
        info!(job_id, "Job dispatched");
        Ok(())
    }
}
