// Sequence Domain Model

use super::step::Step;
use crate::error::{AppError, Result};
use serde_json::Value;

/// Parsed sequence: the ordered steps plus how many subscribers to fan out to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub steps: Vec<Step>,
    pub subscriber_count: u32,
}

impl Sequence {
    pub fn new(steps: Vec<Step>, subscriber_count: u32) -> Self {
        Self {
            steps,
            subscriber_count,
        }
    }

    /// Parse a submitted sequence. Steps are decoded in order and the first
    /// failure is returned.
    pub fn from_request(steps: &[Value], subscribers: i64) -> Result<Self> {
        if subscribers < 0 {
            return Err(AppError::Validation(format!(
                "subscribers must be non-negative, got {subscribers}"
            )));
        }
        let subscriber_count = u32::try_from(subscribers).map_err(|_| {
            AppError::Validation(format!("subscribers out of range: {subscribers}"))
        })?;

        let steps = steps
            .iter()
            .map(Step::from_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::new(steps, subscriber_count))
    }
}
