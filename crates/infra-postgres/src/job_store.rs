// PostgreSQL JobStore Implementation

use async_trait::async_trait;
use cadence_core::domain::{ClaimedJob, Job, JobId, JobStatus, JobTemplate, PARAMS_PER_ROW};
use cadence_core::error::{AppError, Result};
use cadence_core::port::JobStore;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

/// Bind parameters PostgreSQL accepts in one statement
pub const PG_MAX_BIND_PARAMS: usize = 65_535;

const CLAIM_DUE_SQL: &str = "
    UPDATE jobs
    SET status = $1, claimed_at = $2
    WHERE id IN (
        SELECT id FROM jobs
        WHERE due_at <= $2 AND status = $3
        ORDER BY priority, id
        LIMIT $4
        FOR UPDATE SKIP LOCKED
    )
    RETURNING id, due_at, priority";

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // PostgreSQL SQLSTATE codes: https://www.postgresql.org/docs/current/errcodes-appendix.html
            match db_err.code().as_deref() {
                Some("55P03") | Some("40P01") | Some("40001") => AppError::LockAcquisition(
                    format!("{} ({})", db_err.message(), db_err.code().unwrap_or_default()),
                ),
                Some("22001") => AppError::Validation(format!(
                    "Value too long for column: {}",
                    db_err.message()
                )),
                Some("22021") => AppError::Validation(format!(
                    "Invalid text value: {}",
                    db_err.message()
                )),
                Some(code) if code.starts_with("23") => AppError::Persistence(format!(
                    "Constraint violation: {} ({})",
                    db_err.message(),
                    code
                )),
                Some(code) => AppError::Persistence(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Persistence(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Persistence("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Persistence(format!("Column not found: {}", col))
        }
        sqlx::Error::PoolTimedOut => {
            AppError::Persistence("Timed out waiting for a pooled connection".to_string())
        }
        _ => {
            // Connection, pool, protocol errors
            AppError::Persistence(err.to_string())
        }
    }
}

#[derive(FromRow)]
struct JobRow {
    id: i64,
    due_at: DateTime<Utc>,
    priority: i32,
    tenant_id: i32,
    status: i32,
    metadata: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = JobStatus::from_code(self.status).ok_or_else(|| {
            AppError::Persistence(format!(
                "job {} has unknown status code {}",
                self.id, self.status
            ))
        })?;
        Ok(Job {
            id: self.id,
            due_at: self.due_at,
            status,
            priority: self.priority,
            tenant_id: self.tenant_id,
            metadata: self.metadata.unwrap_or_default(),
            claimed_at: self.claimed_at,
        })
    }
}

#[derive(FromRow)]
struct ClaimedRow {
    id: i64,
    due_at: DateTime<Utc>,
    priority: i32,
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert_batch(&self, rows: &[JobTemplate]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let binds = rows.len() * PARAMS_PER_ROW;
        if binds > PG_MAX_BIND_PARAMS {
            return Err(AppError::Validation(format!(
                "chunk of {} rows needs {} bind parameters, limit is {}",
                rows.len(),
                binds,
                PG_MAX_BIND_PARAMS
            )));
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO jobs (due_at, status, priority, tenant_id, metadata) ");
        builder.push_values(rows, |mut row, job| {
            row.push_bind(job.due_at)
                .push_bind(job.status.code())
                .push_bind(job.priority)
                .push_bind(job.tenant_id)
                .push_bind(job.metadata.as_str());
        });

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(rows = result.rows_affected(), "Inserted job chunk");
        Ok(result.rows_affected())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        lock_key: i64,
    ) -> Result<Vec<ClaimedJob>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Held until commit/rollback; serializes claimers sharing the key
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::LockAcquisition(format!("advisory lock {lock_key}: {e}")))?;

        let rows: Vec<ClaimedRow> = sqlx::query_as(CLAIM_DUE_SQL)
            .bind(JobStatus::InProgress.code())
            .bind(now)
            .bind(JobStatus::Initialized.code())
            .bind(limit)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| ClaimedJob {
                id: row.id,
                due_at: row.due_at,
                priority: row.priority,
            })
            .collect())
    }

    async fn mark_status(&self, ids: &[JobId], status: JobStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("UPDATE jobs SET status = $1 WHERE id = ANY($2) AND status = $3")
            .bind(status.code())
            .bind(ids)
            .bind(JobStatus::InProgress.code())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_completed(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM jobs WHERE status = $1")
            .bind(JobStatus::Completed.code())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn requeue_stalled(
        &self,
        now: DateTime<Utc>,
        stalled_before: DateTime<Utc>,
    ) -> Result<u64> {
        // Rows claimed before claimed_at existed fall back to due_at
        let result = sqlx::query(
            "UPDATE jobs
             SET status = $1, due_at = $2, claimed_at = NULL
             WHERE status = $3
                OR (status = $4 AND COALESCE(claimed_at, due_at) < $5)",
        )
        .bind(JobStatus::Initialized.code())
        .bind(now)
        .bind(JobStatus::Failed.code())
        .bind(JobStatus::InProgress.code())
        .bind(stalled_before)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(status.code())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as(
            "SELECT id, due_at, priority, tenant_id, status, metadata, claimed_at
             FROM jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }
}
