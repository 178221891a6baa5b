// Step Domain Model
//
// A sequence is an ordered list of steps. Wait steps move a running clock,
// the job step emits a job due at the current clock value.

use super::error::{Result, StepError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum metadata length accepted for an emitted job (matches the column width)
pub const MAX_METADATA_LEN: usize = 100;

/// Step kind tag as it appears in the `type` field of a submitted step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    WaitCertainPeriod,
    WaitWeekday,
    WaitSpecificDate,
    Job,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::WaitCertainPeriod => "wait_certain_period",
            StepKind::WaitWeekday => "wait_weekday",
            StepKind::WaitSpecificDate => "wait_specific_date",
            StepKind::Job => "job",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "wait_certain_period" => Some(StepKind::WaitCertainPeriod),
            "wait_weekday" => Some(StepKind::WaitWeekday),
            "wait_specific_date" => Some(StepKind::WaitSpecificDate),
            "job" => Some(StepKind::Job),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of a fixed wait period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Minute,
    Hour,
    Day,
}

impl DelayUnit {
    /// Length of one unit in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            DelayUnit::Minute => 60,
            DelayUnit::Hour => 3_600,
            DelayUnit::Day => 86_400,
        }
    }
}

/// Day of week, indexed from Sunday (0) to Saturday (6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub fn days_from_sunday(&self) -> u32 {
        match self {
            DayOfWeek::Sunday => 0,
            DayOfWeek::Monday => 1,
            DayOfWeek::Tuesday => 2,
            DayOfWeek::Wednesday => 3,
            DayOfWeek::Thursday => 4,
            DayOfWeek::Friday => 5,
            DayOfWeek::Saturday => 6,
        }
    }
}

/// One instruction of a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Advance the clock by `amount * unit`
    WaitCertainPeriod { amount: i64, unit: DelayUnit },
    /// Advance the clock to the nearest listed weekday (today included)
    WaitWeekday { days: Vec<DayOfWeek> },
    /// Reset the clock to an absolute RFC 3339 instant
    WaitSpecificDate { timestamp: String },
    /// Emit one job due at the current clock
    EmitJob { metadata: String },
}

#[derive(Deserialize)]
struct WaitCertainPeriodPayload {
    delay_period: i64,
    delay_unit: DelayUnit,
}

#[derive(Deserialize)]
struct WaitWeekdayPayload {
    weekdays: Vec<DayOfWeek>,
}

#[derive(Deserialize)]
struct WaitSpecificDatePayload {
    date: String,
}

#[derive(Deserialize)]
struct EmitJobPayload {
    #[serde(default)]
    metadata: String,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::WaitCertainPeriod { .. } => StepKind::WaitCertainPeriod,
            Step::WaitWeekday { .. } => StepKind::WaitWeekday,
            Step::WaitSpecificDate { .. } => StepKind::WaitSpecificDate,
            Step::EmitJob { .. } => StepKind::Job,
        }
    }

    /// Decode a step from an untyped JSON object
    ///
    /// # Errors
    /// - `StepError::UnsupportedStepKind` if `type` is missing, not a string or unknown
    /// - `StepError::MalformedStepPayload` if the kind-specific fields do not decode
    pub fn from_value(value: &Value) -> Result<Step> {
        let tag = value.get("type").and_then(Value::as_str).ok_or_else(|| {
            StepError::UnsupportedStepKind("missing or non-string `type` field".to_string())
        })?;

        let kind =
            StepKind::parse(tag).ok_or_else(|| StepError::UnsupportedStepKind(tag.to_string()))?;

        match kind {
            StepKind::WaitCertainPeriod => {
                let payload: WaitCertainPeriodPayload = decode(kind, value)?;
                Ok(Step::WaitCertainPeriod {
                    amount: payload.delay_period,
                    unit: payload.delay_unit,
                })
            }
            StepKind::WaitWeekday => {
                let payload: WaitWeekdayPayload = decode(kind, value)?;
                Ok(Step::WaitWeekday {
                    days: payload.weekdays,
                })
            }
            StepKind::WaitSpecificDate => {
                let payload: WaitSpecificDatePayload = decode(kind, value)?;
                parse_rfc3339(&payload.date).map_err(|e| malformed(kind, e.to_string()))?;
                Ok(Step::WaitSpecificDate {
                    timestamp: payload.date,
                })
            }
            StepKind::Job => {
                let payload: EmitJobPayload = decode(kind, value)?;
                let len = payload.metadata.chars().count();
                if len > MAX_METADATA_LEN {
                    return Err(malformed(
                        kind,
                        format!("metadata is {len} characters, limit is {MAX_METADATA_LEN}"),
                    ));
                }
                // Text columns cannot hold NUL
                if payload.metadata.contains('\0') {
                    return Err(malformed(kind, "metadata contains a NUL character".to_string()));
                }
                Ok(Step::EmitJob {
                    metadata: payload.metadata,
                })
            }
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StepError::DateParse {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn decode<T: DeserializeOwned>(kind: StepKind, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| malformed(kind, e.to_string()))
}

fn malformed(kind: StepKind, reason: String) -> StepError {
    StepError::MalformedStepPayload {
        kind: kind.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_wait_certain_period() {
        let step = Step::from_value(&json!({
            "type": "wait_certain_period",
            "delay_period": 3,
            "delay_unit": "hour"
        }))
        .unwrap();

        assert_eq!(
            step,
            Step::WaitCertainPeriod {
                amount: 3,
                unit: DelayUnit::Hour
            }
        );
        assert_eq!(step.kind(), StepKind::WaitCertainPeriod);
    }

    #[test]
    fn test_decode_weekday_and_job() {
        let step = Step::from_value(&json!({
            "type": "wait_weekday",
            "weekdays": ["monday", "friday"]
        }))
        .unwrap();
        assert_eq!(
            step,
            Step::WaitWeekday {
                days: vec![DayOfWeek::Monday, DayOfWeek::Friday]
            }
        );

        let job = Step::from_value(&json!({"type": "job"})).unwrap();
        assert_eq!(
            job,
            Step::EmitJob {
                metadata: String::new()
            }
        );
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = Step::from_value(&json!({"type": "bogus"})).unwrap_err();
        assert_eq!(err, StepError::UnsupportedStepKind("bogus".to_string()));
    }

    #[test]
    fn test_missing_or_non_string_type_rejected() {
        let missing = Step::from_value(&json!({"metadata": "x"})).unwrap_err();
        assert!(matches!(missing, StepError::UnsupportedStepKind(_)));

        let numeric = Step::from_value(&json!({"type": 7})).unwrap_err();
        assert!(matches!(numeric, StepError::UnsupportedStepKind(_)));

        let not_object = Step::from_value(&json!("job")).unwrap_err();
        assert!(matches!(not_object, StepError::UnsupportedStepKind(_)));
    }

    #[test]
    fn test_non_integer_delay_is_malformed() {
        let err = Step::from_value(&json!({
            "type": "wait_certain_period",
            "delay_period": "five",
            "delay_unit": "minute"
        }))
        .unwrap_err();

        match err {
            StepError::MalformedStepPayload { kind, .. } => {
                assert_eq!(kind, "wait_certain_period")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_unit_and_weekday_are_malformed() {
        let unit = Step::from_value(&json!({
            "type": "wait_certain_period",
            "delay_period": 1,
            "delay_unit": "fortnight"
        }));
        assert!(matches!(
            unit,
            Err(StepError::MalformedStepPayload { .. })
        ));

        let weekday = Step::from_value(&json!({
            "type": "wait_weekday",
            "weekdays": ["someday"]
        }));
        assert!(matches!(
            weekday,
            Err(StepError::MalformedStepPayload { .. })
        ));
    }

    #[test]
    fn test_unparseable_date_is_malformed() {
        let err = Step::from_value(&json!({
            "type": "wait_specific_date",
            "date": "not-a-date"
        }))
        .unwrap_err();

        match err {
            StepError::MalformedStepPayload { kind, reason } => {
                assert_eq!(kind, "wait_specific_date");
                assert!(reason.contains("not-a-date"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_metadata_over_limit_is_malformed() {
        let err = Step::from_value(&json!({
            "type": "job",
            "metadata": "x".repeat(MAX_METADATA_LEN + 1)
        }))
        .unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_metadata_with_nul_is_malformed() {
        let err = Step::from_value(&json!({"type": "job", "metadata": "bad\0"})).unwrap_err();
        match err {
            StepError::MalformedStepPayload { kind, reason } => {
                assert_eq!(kind, "job");
                assert!(reason.contains("NUL"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rfc3339_normalises_offset() {
        let parsed = parse_rfc3339("2023-12-29T20:48:34.200+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2023-12-29T18:48:34.200+00:00");
    }
}
