// Domain Error Types

use thiserror::Error;

/// Errors raised while decoding or interpreting sequence steps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Unsupported step kind: {0}")]
    UnsupportedStepKind(String),

    #[error("Malformed {kind} step: {reason}")]
    MalformedStepPayload { kind: String, reason: String },

    #[error("Failed to parse date {value}: {reason}")]
    DateParse { value: String, reason: String },

    #[error("Running clock overflowed while applying {kind} step")]
    ClockOverflow { kind: String },
}

pub type Result<T> = std::result::Result<T, StepError>;
