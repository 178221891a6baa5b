// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod sequence;
pub mod step;

// Re-exports
pub use error::StepError;
pub use job::{
    ClaimedJob, Job, JobDefaults, JobId, JobStatus, JobTemplate, Priority, TenantId,
    PARAMS_PER_ROW,
};
pub use sequence::Sequence;
pub use step::{DayOfWeek, DelayUnit, Step, StepKind, MAX_METADATA_LEN};
