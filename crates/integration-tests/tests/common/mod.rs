//! Shared PostgreSQL fixtures
//!
//! Every test gets its own schema so tests can run in parallel against one
//! database.

#![allow(dead_code)]

use cadence_core::domain::{Job, JobDefaults, JobStatus, JobTemplate};
use cadence_core::port::JobStore;
use cadence_infra_postgres::{create_pool_in_schema, run_migrations, PgJobStore};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DATABASE_URL_ENV: &str = "CADENCE_TEST_POSTGRES_URL";

static SCHEMA_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub struct TestDb {
    pub pool: PgPool,
    pub store: PgJobStore,
    pub schema: String,
}

/// Migrated store in a fresh schema, or `None` when no database is configured
pub async fn setup() -> Option<TestDb> {
    let Ok(url) = std::env::var(DATABASE_URL_ENV) else {
        eprintln!("{DATABASE_URL_ENV} not set, skipping");
        return None;
    };

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let schema = format!(
        "cadence_test_{}_{}_{}",
        std::process::id(),
        SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst),
        nanos
    );

    let pool = create_pool_in_schema(&url, 8, &schema).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = PgJobStore::new(pool.clone());
    Some(TestDb {
        pool,
        store,
        schema,
    })
}

impl TestDb {
    pub async fn teardown(self) {
        sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", self.schema))
            .execute(&self.pool)
            .await
            .unwrap();
        self.pool.close().await;
    }

    /// Insert one INITIALIZED row and return its id
    pub async fn insert(&self, due_at: DateTime<Utc>, priority: i32) -> i64 {
        let defaults = JobDefaults::new(priority, 1).unwrap();
        self.store
            .insert_batch(&[JobTemplate::new(due_at, "", &defaults)])
            .await
            .unwrap();
        sqlx::query_scalar("SELECT MAX(id) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Force a row into a status, bypassing the store's transition rules
    pub async fn force_status(&self, id: i64, status: JobStatus, claimed_at: Option<DateTime<Utc>>) {
        sqlx::query("UPDATE jobs SET status = $1, claimed_at = $2 WHERE id = $3")
            .bind(status.code())
            .bind(claimed_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn job(&self, id: i64) -> Job {
        self.store.find_by_id(id).await.unwrap().unwrap()
    }
}
