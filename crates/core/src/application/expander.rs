// Sequence Expander
//
// Walks the steps with a running clock. Expansion is all-or-nothing: any
// error discards every template produced so far.

use crate::domain::error::{Result, StepError};
use crate::domain::step::parse_rfc3339;
use crate::domain::{DayOfWeek, JobDefaults, JobTemplate, Step, StepKind};
use chrono::{DateTime, Datelike, Days, TimeDelta, Utc};

/// Expand steps into job templates, starting the clock at `start`
pub fn expand(
    steps: &[Step],
    start: DateTime<Utc>,
    defaults: &JobDefaults,
) -> Result<Vec<JobTemplate>> {
    let mut clock = start;
    let mut templates = Vec::new();

    for step in steps {
        match step {
            Step::WaitCertainPeriod { amount, unit } => {
                let delta = amount
                    .checked_mul(unit.seconds())
                    .and_then(TimeDelta::try_seconds)
                    .ok_or_else(|| overflow(step.kind()))?;
                clock = clock
                    .checked_add_signed(delta)
                    .ok_or_else(|| overflow(step.kind()))?;
            }
            Step::WaitWeekday { days } => {
                clock = nearest_weekday(days, clock)?;
            }
            Step::WaitSpecificDate { timestamp } => {
                clock = parse_rfc3339(timestamp)?;
            }
            Step::EmitJob { metadata } => {
                templates.push(JobTemplate::new(clock, metadata.as_str(), defaults));
            }
        }
    }

    Ok(templates)
}

/// Nearest instant, at or after `now`, that falls on one of `days`.
///
/// Today counts (zero advance). Otherwise the date moves forward by the
/// smallest positive day distance with time of day preserved. An empty set
/// advances a full week.
pub fn nearest_weekday(days: &[DayOfWeek], now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let today = now.weekday().num_days_from_sunday();

    let mut min_delta = 7;
    for day in days {
        let delta = (day.days_from_sunday() + 7 - today) % 7;
        if delta == 0 {
            return Ok(now);
        }
        min_delta = min_delta.min(delta);
    }

    now.checked_add_days(Days::new(u64::from(min_delta)))
        .ok_or_else(|| overflow(StepKind::WaitWeekday))
}

fn overflow(kind: StepKind) -> StepError {
    StepError::ClockOverflow {
        kind: kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DelayUnit;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn emit(metadata: &str) -> Step {
        Step::EmitJob {
            metadata: metadata.to_string(),
        }
    }

    #[test]
    fn test_nearest_weekday_from_sunday() {
        // 2023-12-31 is a Sunday
        let sunday = at(2023, 12, 31, 9, 30);

        let cases = [
            (vec![DayOfWeek::Monday], at(2024, 1, 1, 9, 30)),
            (vec![DayOfWeek::Friday], at(2024, 1, 5, 9, 30)),
            (vec![DayOfWeek::Sunday], sunday),
            (vec![DayOfWeek::Wednesday], at(2024, 1, 3, 9, 30)),
            (
                vec![DayOfWeek::Wednesday, DayOfWeek::Friday, DayOfWeek::Monday],
                at(2024, 1, 1, 9, 30),
            ),
            (vec![DayOfWeek::Tuesday], at(2024, 1, 2, 9, 30)),
        ];

        for (days, expected) in cases {
            assert_eq!(nearest_weekday(&days, sunday).unwrap(), expected, "{days:?}");
        }
    }

    #[test]
    fn test_today_wins_regardless_of_order() {
        let sunday = at(2023, 12, 31, 23, 59);
        let days = [DayOfWeek::Monday, DayOfWeek::Saturday, DayOfWeek::Sunday];
        assert_eq!(nearest_weekday(&days, sunday).unwrap(), sunday);
    }

    #[test]
    fn test_empty_weekday_set_advances_a_week() {
        let sunday = at(2023, 12, 31, 8, 0);
        assert_eq!(nearest_weekday(&[], sunday).unwrap(), at(2024, 1, 7, 8, 0));
    }

    #[test]
    fn test_expand_empty_is_empty() {
        let templates = expand(&[], Utc::now(), &JobDefaults::default()).unwrap();
        assert!(templates.is_empty());
    }

    #[test]
    fn test_expand_mixed_sequence() {
        // 2023-12-28 is a Thursday
        let start = at(2023, 12, 28, 12, 0);
        let steps = vec![
            Step::WaitCertainPeriod {
                amount: 1,
                unit: DelayUnit::Minute,
            },
            emit("a"),
            Step::WaitWeekday {
                days: vec![
                    DayOfWeek::Monday,
                    DayOfWeek::Tuesday,
                    DayOfWeek::Wednesday,
                    DayOfWeek::Friday,
                ],
            },
            emit("b"),
            Step::WaitSpecificDate {
                timestamp: "2023-12-29T18:48:34.200Z".to_string(),
            },
            emit("c"),
        ];

        let templates = expand(&steps, start, &JobDefaults::default()).unwrap();
        assert_eq!(templates.len(), 3);

        assert_eq!(templates[0].metadata, "a");
        assert_eq!(templates[0].due_at, at(2023, 12, 28, 12, 1));

        assert_eq!(templates[1].metadata, "b");
        assert_eq!(templates[1].due_at, at(2023, 12, 29, 12, 1));

        assert_eq!(templates[2].metadata, "c");
        assert_eq!(
            templates[2].due_at,
            parse_rfc3339("2023-12-29T18:48:34.200Z").unwrap()
        );

        for t in &templates {
            assert_eq!(t.priority, 0);
            assert_eq!(t.tenant_id, 1);
        }
    }

    #[test]
    fn test_periods_accumulate_across_units() {
        let start = at(2024, 3, 1, 0, 0);
        let steps = vec![
            Step::WaitCertainPeriod {
                amount: 2,
                unit: DelayUnit::Day,
            },
            Step::WaitCertainPeriod {
                amount: 3,
                unit: DelayUnit::Hour,
            },
            emit("x"),
        ];

        let templates = expand(&steps, start, &JobDefaults::default()).unwrap();
        assert_eq!(templates[0].due_at, at(2024, 3, 3, 3, 0));
    }

    #[test]
    fn test_bad_date_discards_everything() {
        let steps = vec![
            emit("first"),
            Step::WaitSpecificDate {
                timestamp: "not-a-date".to_string(),
            },
            emit("second"),
        ];

        let err = expand(&steps, Utc::now(), &JobDefaults::default()).unwrap_err();
        assert!(matches!(err, StepError::DateParse { .. }));
    }

    #[test]
    fn test_overflowing_period_is_an_error() {
        let steps = vec![Step::WaitCertainPeriod {
            amount: i64::MAX,
            unit: DelayUnit::Day,
        }];

        let err = expand(&steps, Utc::now(), &JobDefaults::default()).unwrap_err();
        assert_eq!(
            err,
            StepError::ClockOverflow {
                kind: "wait_certain_period".to_string()
            }
        );
    }

    #[test]
    fn test_defaults_are_stamped() {
        let defaults = JobDefaults::new(7, 42).unwrap();
        let templates = expand(&[emit("p")], Utc::now(), &defaults).unwrap();
        assert_eq!(templates[0].priority, 7);
        assert_eq!(templates[0].tenant_id, 42);
    }
}
