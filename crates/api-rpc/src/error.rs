//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use cadence_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use thiserror::Error;

/// RPC Error Codes
pub mod code {
    pub const INVALID_INPUT: i32 = 4000;
    pub const THROTTLED: i32 = 4003;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Errors starting the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register method: {0}")]
    Register(#[from] jsonrpsee::core::RegisterMethodError),
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::MalformedInput(_) | AppError::Validation(_) => code::INVALID_INPUT,
        AppError::Persistence(_) | AppError::LockAcquisition(_) => code::DB_ERROR,
        AppError::Config(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

pub fn throttled() -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        "Rate limit exceeded. Please slow down.",
        None::<()>,
    )
}
