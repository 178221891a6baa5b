// Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned job identifier
pub type JobId = i64;

/// Priority (lower number = claimed first)
pub type Priority = i32;

pub type TenantId = i32;

/// Bind parameters one job row consumes in a multi-row insert
/// (due_at, status, priority, tenant_id, metadata)
pub const PARAMS_PER_ROW: usize = 5;

/// Job Status, persisted as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum JobStatus {
    Initialized = 0,
    InProgress = 1,
    Completed = 2,
    Failed = 3,
}

impl JobStatus {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(JobStatus::Initialized),
            1 => Some(JobStatus::InProgress),
            2 => Some(JobStatus::Completed),
            3 => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Initialized => write!(f, "INITIALIZED"),
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Priority and tenant stamped on every emitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefaults {
    pub priority: Priority,
    pub tenant_id: TenantId,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            priority: 0,
            tenant_id: 1,
        }
    }
}

impl JobDefaults {
    pub fn new(priority: Priority, tenant_id: TenantId) -> crate::error::Result<Self> {
        if priority < 0 || tenant_id < 0 {
            return Err(crate::error::AppError::Config(format!(
                "job defaults must be non-negative (priority={priority}, tenant_id={tenant_id})"
            )));
        }
        Ok(Self {
            priority,
            tenant_id,
        })
    }
}

/// A job to be inserted; produced by expansion, not yet persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub due_at: DateTime<Utc>,
    pub status: JobStatus,
    pub priority: Priority,
    pub tenant_id: TenantId,
    pub metadata: String,
}

impl JobTemplate {
    pub fn new(due_at: DateTime<Utc>, metadata: impl Into<String>, defaults: &JobDefaults) -> Self {
        Self {
            due_at,
            status: JobStatus::Initialized,
            priority: defaults.priority,
            tenant_id: defaults.tenant_id,
            metadata: metadata.into(),
        }
    }
}

/// Persisted job row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub due_at: DateTime<Utc>,
    pub status: JobStatus,
    pub priority: Priority,
    pub tenant_id: TenantId,
    pub metadata: String,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn from_template(id: JobId, template: &JobTemplate) -> Self {
        Self {
            id,
            due_at: template.due_at,
            status: template.status,
            priority: template.priority,
            tenant_id: template.tenant_id,
            metadata: template.metadata.clone(),
            claimed_at: None,
        }
    }
}

/// Subset of a job returned by a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedJob {
    pub id: JobId,
    pub due_at: DateTime<Utc>,
    pub priority: Priority,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for status in [
            JobStatus::Initialized,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(JobStatus::from_code(9), None);
        assert_eq!(JobStatus::InProgress.to_string(), "IN_PROGRESS");
    }

    #[test]
    fn test_defaults_validation() {
        assert_eq!(JobDefaults::default(), JobDefaults::new(0, 1).unwrap());
        assert!(JobDefaults::new(-1, 1).is_err());
        assert!(JobDefaults::new(0, -5).is_err());
    }

    #[test]
    fn test_template_uses_defaults() {
        let defaults = JobDefaults::new(4, 9).unwrap();
        let template = JobTemplate::new(Utc::now(), "meta", &defaults);
        assert_eq!(template.status, JobStatus::Initialized);
        assert_eq!(template.priority, 4);
        assert_eq!(template.tenant_id, 9);
    }
}
