// Cadence Infrastructure - PostgreSQL Adapter
// Implements: JobStore

mod connection;
mod job_store;
mod migration;

pub use connection::{create_pool, create_pool_in_schema, is_valid_schema_ident};
pub use job_store::{PgJobStore, PG_MAX_BIND_PARAMS};
pub use migration::{run_migrations, SCHEMA_VERSION};

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
