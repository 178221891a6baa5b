// Stuck-Job Reconciler
//
// Periodically deletes COMPLETED rows and puts FAILED and stalled IN_PROGRESS
// rows back in the queue. Every step runs even if an earlier one failed.

use crate::application::worker::ShutdownToken;
use crate::domain::JobStatus;
use crate::error::{AppError, Result};
use crate::port::{JobStore, Metric, MetricsSink, TimeProvider};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub deleted: u64,
    pub requeued: u64,
    pub queued: Option<i64>,
    pub errors: usize,
}

pub struct StuckJobReconciler {
    store: Arc<dyn JobStore>,
    metrics: Arc<dyn MetricsSink>,
    time_provider: Arc<dyn TimeProvider>,
    max_processing_time: Duration,
}

impl StuckJobReconciler {
    /// # Arguments
    /// * `max_processing_time` - How long a job may stay IN_PROGRESS; also the tick period
    ///
    /// # Errors
    /// - `AppError::Config` if `max_processing_time` is zero
    pub fn new(
        store: Arc<dyn JobStore>,
        metrics: Arc<dyn MetricsSink>,
        time_provider: Arc<dyn TimeProvider>,
        max_processing_time: Duration,
    ) -> Result<Self> {
        if max_processing_time.is_zero() {
            return Err(AppError::Config(
                "max processing time must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            store,
            metrics,
            time_provider,
            max_processing_time,
        })
    }

    /// Run reconciliation every `max_processing_time` until shutdown.
    /// The first pass runs immediately.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            max_processing_secs = self.max_processing_time.as_secs(),
            "Reconciler started"
        );

        let mut tick = interval(self.max_processing_time);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    self.tick().await;
                }
                _ = shutdown.wait() => {
                    info!("Reconciler interrupted while waiting");
                    break;
                }
            }
        }

        info!("Reconciler stopped");
        Ok(())
    }

    /// One reconciliation pass
    pub async fn tick(&self) -> ReconcileReport {
        let now = self.time_provider.now();
        let mut report = ReconcileReport::default();

        match self.store.delete_completed().await {
            Ok(n) => report.deleted = n,
            Err(e) => {
                error!(error = %e, "Failed to delete completed jobs");
                report.errors += 1;
            }
        }

        match self.stall_cutoff(now) {
            Ok(cutoff) => match self.store.requeue_stalled(now, cutoff).await {
                Ok(n) => report.requeued = n,
                Err(e) => {
                    error!(error = %e, "Failed to requeue stalled jobs");
                    report.errors += 1;
                }
            },
            Err(e) => {
                error!(error = %e, "Failed to compute stall cutoff");
                report.errors += 1;
            }
        }

        match self.store.count_by_status(JobStatus::Initialized).await {
            Ok(n) => {
                self.metrics.record(Metric::JobsInQueue, n as f64);
                report.queued = Some(n);
            }
            Err(e) => {
                error!(error = %e, "Failed to count queued jobs");
                report.errors += 1;
            }
        }

        info!(
            deleted = report.deleted,
            requeued = report.requeued,
            queued = ?report.queued,
            errors = report.errors,
            "Reconciliation pass complete"
        );
        report
    }

    fn stall_cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        TimeDelta::from_std(self.max_processing_time)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "max processing time {:?} is out of range",
                    self.max_processing_time
                ))
            })
    }
}
