// Migration Runner

use cadence_core::error::{AppError, Result};
use sqlx::PgPool;
use tracing::info;

/// Latest schema version this build knows about
pub const SCHEMA_VERSION: i32 = 2;

/// Serializes concurrent daemons migrating the same database
const MIGRATION_LOCK_KEY: i64 = 0x6361_6465_6e63_65;

const MIGRATIONS: &[(i32, &str, &str)] = &[
    (
        1,
        "Create jobs table",
        include_str!("../migrations/001_create_jobs.sql"),
    ),
    (
        2,
        "Add claimed_at",
        include_str!("../migrations/002_add_claimed_at.sql"),
    ),
];

/// Run database migrations
///
/// All pending migrations are applied in one transaction holding an
/// advisory lock, so either every migration lands or none does.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let mut tx = pool.begin().await.map_err(migration_error)?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::LockAcquisition(format!("migration lock: {e}")))?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(&mut *tx)
    .await
    .map_err(migration_error)?;

    let current_version: i32 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&mut *tx)
            .await
            .map_err(migration_error)?;

    info!("Current schema version: {}", current_version);

    if current_version > SCHEMA_VERSION {
        return Err(AppError::Config(format!(
            "database schema version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    for (version, name, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }
        info!("Applying migration {:03}: {}", version, name);

        for statement in split_statements(sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(migration_error)?;
        }

        sqlx::query("INSERT INTO schema_version (version, name) VALUES ($1, $2)")
            .bind(*version)
            .bind(*name)
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;
    }

    tx.commit().await.map_err(migration_error)?;
    info!("All migrations applied successfully");
    Ok(())
}

/// Split a migration file on `;`, dropping comment lines and empty statements
fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|statement| {
            statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|statement| !statement.is_empty())
        .collect()
}

fn migration_error(err: sqlx::Error) -> AppError {
    AppError::Persistence(format!("migration: {err}"))
}
