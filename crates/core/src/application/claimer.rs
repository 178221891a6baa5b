// Due-Job Claimer - claim loop
//
// Claims are serialized by a store-side lock and skip rows other
// transactions hold, so any number of claimers may run against one table.

use crate::application::resolver::DispatchResolver;
use crate::application::worker::constants::{
    DEFAULT_CLAIM_BATCH_SIZE, DEFAULT_CLAIM_LOCK_KEY, ERROR_RECOVERY_SLEEP_DURATION,
    IDLE_SLEEP_DURATION,
};
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::{per_second, JobStore, Metric, MetricsSink, TimeProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct ClaimerConfig {
    pub batch_size: i64,
    pub lock_key: i64,
    pub idle_sleep: Duration,
    pub error_sleep: Duration,
}

impl Default for ClaimerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_CLAIM_BATCH_SIZE,
            lock_key: DEFAULT_CLAIM_LOCK_KEY,
            idle_sleep: IDLE_SLEEP_DURATION,
            error_sleep: ERROR_RECOVERY_SLEEP_DURATION,
        }
    }
}

pub struct DueJobClaimer {
    name: String,
    store: Arc<dyn JobStore>,
    resolver: Arc<DispatchResolver>,
    metrics: Arc<dyn MetricsSink>,
    time_provider: Arc<dyn TimeProvider>,
    config: ClaimerConfig,
}

impl DueJobClaimer {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn JobStore>,
        resolver: Arc<DispatchResolver>,
        metrics: Arc<dyn MetricsSink>,
        time_provider: Arc<dyn TimeProvider>,
        config: ClaimerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            resolver,
            metrics,
            time_provider,
            config,
        }
    }

    /// Run claim loop with graceful shutdown support
    ///
    /// A claim already sent to the store is always awaited; shutdown only
    /// interrupts the sleeps between claims.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(
            claimer = %self.name,
            batch_size = self.config.batch_size,
            lock_key = self.config.lock_key,
            "Claimer started"
        );
        loop {
            if shutdown.is_shutdown() {
                info!(claimer = %self.name, "Claimer shutting down");
                break;
            }
            match self.claim_once().await {
                Ok(0) => {
                    tokio::select! {
                        _ = sleep(self.config.idle_sleep) => {},
                        _ = shutdown.wait() => {
                            info!(claimer = %self.name, "Claimer interrupted during idle");
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!(claimer = %self.name, error = %e, "Claim failed");
                    tokio::select! {
                        _ = sleep(self.config.error_sleep) => {},
                        _ = shutdown.wait() => {
                            info!(claimer = %self.name, "Claimer interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(claimer = %self.name, "Claimer stopped");
        Ok(())
    }

    /// One claim round trip followed by dispatch. Returns the number of jobs claimed.
    ///
    /// Only the claim itself can fail; resolver errors are logged and the
    /// affected rows are left for the reconciler.
    pub async fn claim_once(&self) -> Result<usize> {
        let started = Instant::now();
        let now = self.time_provider.now();

        let mut claimed = self
            .store
            .claim_due(now, self.config.batch_size, self.config.lock_key)
            .await?;

        self.metrics.record(
            Metric::ClaimRate,
            per_second(claimed.len() as u64, started.elapsed()),
        );

        if claimed.is_empty() {
            debug!(claimer = %self.name, "No due jobs");
            return Ok(0);
        }

        claimed.sort_by_key(|job| (job.priority, job.due_at, job.id));

        let total_delay_ms: i64 = claimed
            .iter()
            .map(|job| (now - job.due_at).num_milliseconds())
            .sum();
        let avg_delay_secs = total_delay_ms as f64 / 1000.0 / claimed.len() as f64;
        self.metrics.record(Metric::DueDelay, avg_delay_secs);

        let ids: Vec<_> = claimed.iter().map(|job| job.id).collect();
        match self.resolver.resolve(&ids).await {
            Ok(outcome) => info!(
                claimer = %self.name,
                claimed = ids.len(),
                completed = outcome.completed,
                failed = outcome.failed,
                avg_delay_secs,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Processed batch"
            ),
            Err(e) => warn!(
                claimer = %self.name,
                claimed = ids.len(),
                error = %e,
                "Batch dispatched but status update failed, leaving rows for reconciliation"
            ),
        }

        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::shutdown_channel;
    use crate::domain::{Job, JobDefaults, JobStatus, JobTemplate};
    use crate::error::AppError;
    use crate::port::dispatcher::mocks::ScriptedDispatcher;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::metrics::mocks::RecordingMetricsSink;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use crate::port::JobDispatcher;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    struct Harness {
        store: Arc<InMemoryJobStore>,
        dispatcher: Arc<ScriptedDispatcher>,
        metrics: Arc<RecordingMetricsSink>,
        claimer: DueJobClaimer,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
    }

    fn harness(batch_size: i64, dispatcher: ScriptedDispatcher) -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let dispatcher = Arc::new(dispatcher);
        let metrics = Arc::new(RecordingMetricsSink::new());
        let resolver = Arc::new(DispatchResolver::new(
            store.clone(),
            dispatcher.clone() as Arc<dyn JobDispatcher>,
            4,
        ));
        let claimer = DueJobClaimer::new(
            "test",
            store.clone(),
            resolver,
            metrics.clone(),
            Arc::new(FixedTimeProvider::new(now())),
            ClaimerConfig {
                batch_size,
                idle_sleep: Duration::from_millis(5),
                error_sleep: Duration::from_millis(5),
                ..ClaimerConfig::default()
            },
        );
        Harness {
            store,
            dispatcher,
            metrics,
            claimer,
        }
    }

    fn seed(store: &InMemoryJobStore, due_at: DateTime<Utc>, priority: i32) -> i64 {
        let defaults = JobDefaults::new(priority, 1).unwrap();
        store.seed(Job::from_template(0, &JobTemplate::new(due_at, "", &defaults)))
    }

    #[tokio::test]
    async fn test_claims_only_due_jobs_in_priority_order() {
        let h = harness(10, ScriptedDispatcher::new_success());
        let late = seed(&h.store, now() - TimeDelta::minutes(5), 2);
        let urgent = seed(&h.store, now() - TimeDelta::minutes(1), 0);
        let future = seed(&h.store, now() + TimeDelta::minutes(1), 0);

        let claimed = h.claimer.claim_once().await.unwrap();
        assert_eq!(claimed, 2);
        assert_eq!(h.dispatcher.calls(), vec![urgent, late]);

        let job = h.store.find_by_id(future).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Initialized);
        let job = h.store.find_by_id(late).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_batch_size_limits_claim() {
        let h = harness(2, ScriptedDispatcher::new_success());
        for _ in 0..5 {
            seed(&h.store, now(), 0);
        }

        assert_eq!(h.claimer.claim_once().await.unwrap(), 2);
        assert_eq!(h.claimer.claim_once().await.unwrap(), 2);
        assert_eq!(h.claimer.claim_once().await.unwrap(), 1);
        assert_eq!(h.claimer.claim_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_claim_rate_and_due_delay() {
        let h = harness(10, ScriptedDispatcher::new_success());
        seed(&h.store, now() - TimeDelta::seconds(10), 0);
        seed(&h.store, now() - TimeDelta::seconds(20), 0);

        h.claimer.claim_once().await.unwrap();

        assert_eq!(h.metrics.values(Metric::ClaimRate).len(), 1);
        assert_eq!(h.metrics.values(Metric::DueDelay), vec![15.0]);
    }

    #[tokio::test]
    async fn test_empty_claim_reports_rate_only() {
        let h = harness(10, ScriptedDispatcher::new_success());

        assert_eq!(h.claimer.claim_once().await.unwrap(), 0);
        assert_eq!(h.metrics.values(Metric::ClaimRate), vec![0.0]);
        assert!(h.metrics.values(Metric::DueDelay).is_empty());
    }

    #[tokio::test]
    async fn test_lock_failure_is_returned() {
        let h = harness(10, ScriptedDispatcher::new_success());
        h.store.fail_next_claims(1);

        let err = h.claimer.claim_once().await.unwrap_err();
        assert!(matches!(err, AppError::LockAcquisition(_)));
    }

    #[tokio::test]
    async fn test_run_survives_errors_and_stops_on_shutdown() {
        let h = harness(10, ScriptedDispatcher::new_success());
        h.store.fail_next_claims(2);
        let id = seed(&h.store, now(), 0);

        let (sender, token) = shutdown_channel();
        let claimer = Arc::new(h.claimer);
        let handle = {
            let claimer = Arc::clone(&claimer);
            tokio::spawn(async move { claimer.run(token).await })
        };

        // Two failed claims then a successful one
        for _ in 0..100 {
            if h.dispatcher.calls().contains(&id) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.dispatcher.calls(), vec![id]);

        sender.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_returns_immediately_when_already_shut_down() {
        let h = harness(10, ScriptedDispatcher::new_success());
        seed(&h.store, now(), 0);

        let (sender, token) = shutdown_channel();
        sender.shutdown();
        h.claimer.run(token).await.unwrap();

        assert!(h.dispatcher.calls().is_empty());
    }
}
