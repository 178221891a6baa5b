// PostgreSQL Connection Pool Setup

use cadence_core::error::{AppError, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Create PostgreSQL connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("invalid database url: {e}")))?;
    connect(options, max_connections).await
}

/// Create a pool whose connections resolve unqualified table names in `schema`.
/// The schema is created if missing.
pub async fn create_pool_in_schema(
    database_url: &str,
    max_connections: u32,
    schema: &str,
) -> Result<PgPool> {
    if !is_valid_schema_ident(schema) {
        return Err(AppError::Config(format!("invalid schema name: {schema}")));
    }

    let options = PgConnectOptions::from_str(database_url)
        .map_err(|e| AppError::Config(format!("invalid database url: {e}")))?
        .options([("search_path", schema)]);
    let pool = connect(options, max_connections).await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS \"{schema}\""))
        .execute(&pool)
        .await
        .map_err(|e| AppError::Persistence(format!("create schema {schema}: {e}")))?;

    Ok(pool)
}

/// Schema names are interpolated into SQL, so only plain identifiers are accepted
pub fn is_valid_schema_ident(schema: &str) -> bool {
    let mut chars = schema.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && schema.len() <= 63
}

async fn connect(options: PgConnectOptions, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| AppError::Persistence(format!("connect: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_schema_ident_validation() {
        assert!(is_valid_schema_ident("cadence_test_1"));
        assert!(is_valid_schema_ident("_private"));
        assert!(!is_valid_schema_ident(""));
        assert!(!is_valid_schema_ident("1abc"));
        assert!(!is_valid_schema_ident("bad\"; DROP TABLE jobs; --"));
        assert!(!is_valid_schema_ident(&"a".repeat(64)));
    }

    #[tokio::test]
    async fn test_rejects_bad_url_and_schema() {
        let err = assert_err!(create_pool("not a url", 1).await);
        assert!(matches!(err, AppError::Config(_)));

        let err = assert_err!(create_pool_in_schema("postgres://localhost/db", 1, "x-y").await);
        assert!(matches!(err, AppError::Config(_)));
    }
}
