// Job Store Port (Interface)

use crate::domain::{ClaimedJob, Job, JobId, JobStatus, JobTemplate};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Store interface for job rows
///
/// Every method is one round trip; there is no transaction spanning calls.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert rows in a single multi-row statement. Returns rows written.
    async fn insert_batch(&self, rows: &[JobTemplate]) -> Result<u64>;

    /// Claim up to `limit` due INITIALIZED jobs and move them to IN_PROGRESS.
    ///
    /// Claims are serialized across processes by `lock_key` and never return
    /// a job another concurrent claim returned.
    ///
    /// # Errors
    /// - `AppError::LockAcquisition` if the coordination lock cannot be taken
    /// - `AppError::Persistence` for any other store failure
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lock_key: i64,
    ) -> Result<Vec<ClaimedJob>>;

    /// Set `status` on the given ids that are still IN_PROGRESS. Returns rows touched.
    async fn mark_status(&self, ids: &[JobId], status: JobStatus) -> Result<u64>;

    /// Delete every COMPLETED row
    async fn delete_completed(&self) -> Result<u64>;

    /// Reset FAILED rows and IN_PROGRESS rows claimed before `stalled_before`
    /// to INITIALIZED with `due_at = now` and no claim time. A row with no
    /// claim time is judged by its `due_at`.
    async fn requeue_stalled(
        &self,
        now: DateTime<Utc>,
        stalled_before: DateTime<Utc>,
    ) -> Result<u64>;

    /// Count rows in a given status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Find job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inner {
        jobs: BTreeMap<JobId, Job>,
        next_id: JobId,
        insert_calls: usize,
        chunk_sizes: Vec<usize>,
        fail_insert_on_call: Option<usize>,
        claim_failures_left: usize,
        fail_mark_for: Option<JobStatus>,
        mark_calls: Vec<(Vec<JobId>, JobStatus)>,
        fail_delete: bool,
    }

    /// In-memory store with the same row semantics as the SQL adapter
    #[derive(Default)]
    pub struct InMemoryJobStore {
        inner: Mutex<Inner>,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the n-th `insert_batch` call (1-based) fail
        pub fn fail_insert_on_call(&self, call: usize) {
            self.inner.lock().unwrap().fail_insert_on_call = Some(call);
        }

        /// Make the next `count` claims fail with a lock error
        pub fn fail_next_claims(&self, count: usize) {
            self.inner.lock().unwrap().claim_failures_left = count;
        }

        /// Make `mark_status` fail for one target status
        pub fn fail_mark_status(&self, status: JobStatus) {
            self.inner.lock().unwrap().fail_mark_for = Some(status);
        }

        pub fn fail_delete_completed(&self) {
            self.inner.lock().unwrap().fail_delete = true;
        }

        /// Insert a fully formed row (bypasses chunk accounting)
        pub fn seed(&self, mut job: Job) -> JobId {
            let mut inner = self.inner.lock().unwrap();
            inner.next_id += 1;
            job.id = inner.next_id;
            let id = job.id;
            inner.jobs.insert(id, job);
            id
        }

        pub fn jobs(&self) -> Vec<Job> {
            self.inner.lock().unwrap().jobs.values().cloned().collect()
        }

        pub fn chunk_sizes(&self) -> Vec<usize> {
            self.inner.lock().unwrap().chunk_sizes.clone()
        }

        pub fn mark_calls(&self) -> Vec<(Vec<JobId>, JobStatus)> {
            self.inner.lock().unwrap().mark_calls.clone()
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn insert_batch(&self, rows: &[JobTemplate]) -> Result<u64> {
            let mut inner = self.inner.lock().unwrap();
            inner.insert_calls += 1;
            if inner.fail_insert_on_call == Some(inner.insert_calls) {
                return Err(AppError::Persistence(format!(
                    "injected failure on insert call {}",
                    inner.insert_calls
                )));
            }
            inner.chunk_sizes.push(rows.len());
            for row in rows {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.jobs.insert(id, Job::from_template(id, row));
            }
            Ok(rows.len() as u64)
        }

        async fn claim_due(
            &self,
            now: DateTime<Utc>,
            limit: i64,
            _lock_key: i64,
        ) -> Result<Vec<ClaimedJob>> {
            let mut inner = self.inner.lock().unwrap();
            if inner.claim_failures_left > 0 {
                inner.claim_failures_left -= 1;
                return Err(AppError::LockAcquisition("injected lock failure".to_string()));
            }

            let mut due: Vec<&mut Job> = inner
                .jobs
                .values_mut()
                .filter(|j| j.status == JobStatus::Initialized && j.due_at <= now)
                .collect();
            due.sort_by_key(|j| (j.priority, j.id));

            let limit = usize::try_from(limit).unwrap_or(0);
            Ok(due
                .into_iter()
                .take(limit)
                .map(|job| {
                    job.status = JobStatus::InProgress;
                    job.claimed_at = Some(now);
                    ClaimedJob {
                        id: job.id,
                        due_at: job.due_at,
                        priority: job.priority,
                    }
                })
                .collect())
        }

        async fn mark_status(&self, ids: &[JobId], status: JobStatus) -> Result<u64> {
            let mut inner = self.inner.lock().unwrap();
            inner.mark_calls.push((ids.to_vec(), status));
            if inner.fail_mark_for == Some(status) {
                return Err(AppError::Persistence(format!(
                    "injected failure marking {status}"
                )));
            }
            let mut touched = 0;
            for id in ids {
                if let Some(job) = inner.jobs.get_mut(id) {
                    if job.status == JobStatus::InProgress {
                        job.status = status;
                        touched += 1;
                    }
                }
            }
            Ok(touched)
        }

        async fn delete_completed(&self) -> Result<u64> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_delete {
                return Err(AppError::Persistence("injected delete failure".to_string()));
            }
            let before = inner.jobs.len();
            inner.jobs.retain(|_, j| j.status != JobStatus::Completed);
            Ok((before - inner.jobs.len()) as u64)
        }

        async fn requeue_stalled(
            &self,
            now: DateTime<Utc>,
            stalled_before: DateTime<Utc>,
        ) -> Result<u64> {
            let mut inner = self.inner.lock().unwrap();
            let mut touched = 0;
            for job in inner.jobs.values_mut() {
                let stalled = job.status == JobStatus::InProgress
                    && job.claimed_at.unwrap_or(job.due_at) < stalled_before;
                if stalled || job.status == JobStatus::Failed {
                    job.status = JobStatus::Initialized;
                    job.due_at = now;
                    job.claimed_at = None;
                    touched += 1;
                }
            }
            Ok(touched)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            let inner = self.inner.lock().unwrap();
            Ok(inner.jobs.values().filter(|j| j.status == status).count() as i64)
        }

        async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
            Ok(self.inner.lock().unwrap().jobs.get(&id).cloned())
        }
    }
}
