// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed input: {0}")]
    MalformedInput(#[from] crate::domain::StepError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Lock acquisition failed: {0}")]
    LockAcquisition(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Client-side errors: the request itself is wrong and retrying will not help
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::MalformedInput(_) | AppError::Validation(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in the infra-postgres crate
// by converting to AppError::Persistence / AppError::LockAcquisition
