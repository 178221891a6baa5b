//! RPC Method Handlers

use crate::error::{throttled, to_rpc_error};
use crate::rate_limiter::RateLimiter;
use crate::types::{StatsResponse, SubmitSequenceRequest, SubmitSequenceResponse};
use cadence_core::application::{SequenceService, StatsService};
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    sequences: Arc<SequenceService>,
    stats: Arc<StatsService>,
    rate_limiter: RateLimiter,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        sequences: Arc<SequenceService>,
        stats: Arc<StatsService>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            sequences,
            stats,
            rate_limiter,
            start_time: Instant::now(),
        }
    }

    /// sequence.submit.v1
    pub async fn submit(
        &self,
        params: SubmitSequenceRequest,
    ) -> Result<SubmitSequenceResponse, ErrorObjectOwned> {
        if !self.rate_limiter.try_acquire() {
            return Err(throttled());
        }

        match self.sequences.submit(params.into()).await {
            Ok(outcome) => Ok(outcome.into()),
            Err(e) => {
                if !e.is_client_error() {
                    warn!(error = %e, "Submission failed");
                }
                Err(to_rpc_error(e))
            }
        }
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let stats = self.stats.snapshot().await.map_err(to_rpc_error)?;
        Ok(StatsResponse::new(
            stats,
            self.start_time.elapsed().as_secs(),
        ))
    }
}
