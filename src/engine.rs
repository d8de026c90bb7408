//! The scheduling pipeline: normalize, build the model, solve, validate.
//!
//! Every entry point is a pure function of its arguments. Nothing is
//! cached between calls, so independent runs may execute concurrently.

use log::info;

use crate::config::SchedulerConfig;
use crate::data::{RawStudentRecord, ScheduleResult, SchedulingInput, SlotUniverse, StudentRequest};
use crate::error::{RosterErrors, SchedulerError};
use crate::model::build_model;
use crate::normalize::{check_requests, normalize_record, normalize_roster};
use crate::solver;
use crate::validate::validate_and_report;

/// Schedules already-typed requests. When `universe` is `None` it is
/// derived from the union of all preferences.
pub fn schedule(
    requests: &[StudentRequest],
    universe: Option<&SlotUniverse>,
    config: &SchedulerConfig,
) -> Result<ScheduleResult, SchedulerError> {
    config.validate()?;
    let universe = check_requests(requests, universe, &config.grid)?;
    run(requests, &universe, config)
}

/// Parses raw roster rows and schedules them.
pub fn schedule_raw(
    records: &[RawStudentRecord],
    config: &SchedulerConfig,
) -> Result<ScheduleResult, SchedulerError> {
    config.validate()?;
    let roster = normalize_roster(records, &config.grid)?;
    schedule(&roster.requests, Some(&roster.universe), config)
}

/// Runs a complete [`SchedulingInput`]: raw records are normalized and
/// joined with the typed students before scheduling. Errors from both
/// sources are reported together.
pub fn schedule_input(input: &SchedulingInput) -> Result<ScheduleResult, SchedulerError> {
    let config = &input.config;
    config.validate()?;

    let mut requests = input.students.clone();
    let mut errors = Vec::new();
    for record in &input.records {
        match normalize_record(record, &config.grid) {
            Ok(request) => requests.push(request),
            Err(mut found) => errors.append(&mut found),
        }
    }
    let universe = match check_requests(&requests, input.universe.as_ref(), &config.grid) {
        Ok(universe) => Some(universe),
        Err(found) => {
            errors.extend(found);
            None
        }
    };
    let universe = match universe {
        Some(universe) if errors.is_empty() => universe,
        _ => {
            info!("Rejected input with {} error(s)", errors.len());
            return Err(RosterErrors::new(errors).into());
        }
    };

    info!(
        "Scheduling {} student(s) ({} typed, {} raw)",
        requests.len(),
        input.students.len(),
        input.records.len()
    );
    run(&requests, &universe, config)
}

/// Validates a roster without solving it, returning every input error at
/// once.
pub fn check_roster(
    records: &[RawStudentRecord],
    config: &SchedulerConfig,
) -> Result<Vec<StudentRequest>, SchedulerError> {
    config.validate()?;
    let roster = normalize_roster(records, &config.grid)?;
    Ok(roster.requests)
}

fn run(
    requests: &[StudentRequest],
    universe: &SlotUniverse,
    config: &SchedulerConfig,
) -> Result<ScheduleResult, SchedulerError> {
    let capacities = config.capacity.resolve(universe, &config.grid)?;
    let model = build_model(requests, &capacities, config)?;
    let raw = solver::solve(&model, config.mode)?;
    validate_and_report(&model, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverMode;
    use crate::data::{Slot, Weekday};

    #[test]
    fn test_raw_and_typed_inputs_agree() {
        let records = vec![
            RawStudentRecord {
                id: "r1".into(),
                days: "2ª 3ª".into(),
                times: "18:00".into(),
                quota: "2".into(),
                ..Default::default()
            },
            RawStudentRecord {
                id: "r2".into(),
                slots: "mon-18:00".into(),
                quota: "1".into(),
                priority: Some("2".into()),
                ..Default::default()
            },
        ];
        let config = SchedulerConfig::default().with_capacity(1);
        let from_raw = schedule_raw(&records, &config).unwrap();

        let mon = Slot::new(Weekday::Mon, 18 * 60);
        let tue = Slot::new(Weekday::Tue, 18 * 60);
        let typed = vec![
            StudentRequest::new("r1", 2).with_slots([mon, tue]),
            StudentRequest::new("r2", 1).with_slots([mon]).with_priority(2),
        ];
        let from_typed = schedule(&typed, None, &config).unwrap();
        assert_eq!(from_raw, from_typed);
        // r2 outranks r1 for Monday.
        assert_eq!(from_raw.student("r2").unwrap().slots, vec![mon]);
        assert_eq!(from_raw.student("r1").unwrap().unmet_count, 1);
    }

    #[test]
    fn test_negative_capacity_fails_hard() {
        let requests = vec![StudentRequest::new("a", 1).with_slots([Slot::new(Weekday::Mon, 480)])];
        let err = schedule(&requests, None, &SchedulerConfig::default().with_capacity(-1)).unwrap_err();
        assert!(matches!(
            err.input_errors(),
            [crate::error::InputError::InvalidCapacity { value: -1, .. }]
        ));
    }

    #[test]
    fn test_schedule_input_from_json() {
        let json = r#"{
            "config": {"capacity": {"uniform": 2}, "mode": "greedy"},
            "records": [{"id": "a", "days": "fri", "times": "09:00 09:30", "quota": "2"}],
            "students": [{"id": "b", "weeklyQuota": 1, "preferredSlots": [{"day": "fri", "minute": 540}]}]
        }"#;
        let input: SchedulingInput = serde_json::from_str(json).unwrap();
        let result = schedule_input(&input).unwrap();
        assert_eq!(result.summary().solver, SolverMode::Greedy);
        assert!(!result.summary().optimal);
        assert_eq!(result.summary().satisfied, 3);
    }

    #[test]
    fn test_check_roster_collects_errors() {
        let records = vec![RawStudentRecord {
            id: "a".into(),
            days: "sat".into(),
            times: "06:00".into(),
            quota: "0".into(),
            ..Default::default()
        }];
        let err = check_roster(&records, &SchedulerConfig::default()).unwrap_err();
        assert_eq!(err.input_errors().len(), 3);
    }

    #[test]
    fn test_check_roster_rejects_zero_bucket_grid() {
        let records = vec![RawStudentRecord {
            id: "a".into(),
            days: "mon".into(),
            times: "08:00".into(),
            quota: "1".into(),
            ..Default::default()
        }];
        let mut config = SchedulerConfig::default();
        config.grid.bucket_minutes = 0;
        let err = check_roster(&records, &config).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }

    #[test]
    fn test_schedule_input_reports_raw_and_typed_errors_together() {
        let input = SchedulingInput {
            records: vec![RawStudentRecord {
                id: "raw".into(),
                days: "sun".into(),
                times: "08:00".into(),
                quota: "1".into(),
                ..Default::default()
            }],
            students: vec![StudentRequest::new("typed", 0).with_slots([Slot::new(Weekday::Mon, 7 * 60)])],
            ..Default::default()
        };
        let err = schedule_input(&input).unwrap_err();
        let errors = err.input_errors();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.student() == Some("raw")));
        assert_eq!(errors.iter().filter(|e| e.student() == Some("typed")).count(), 2);
    }

    #[test]
    fn test_schedule_input_rejects_id_shared_across_sources() {
        let mon = Slot::new(Weekday::Mon, 9 * 60);
        let input = SchedulingInput {
            records: vec![RawStudentRecord {
                id: "dup".into(),
                slots: "mon-09:00".into(),
                quota: "1".into(),
                ..Default::default()
            }],
            students: vec![StudentRequest::new("dup", 1).with_slots([mon])],
            ..Default::default()
        };
        let err = schedule_input(&input).unwrap_err();
        assert!(matches!(
            err.input_errors(),
            [crate::error::InputError::MalformedRequest { field, .. }] if field == "id"
        ));
    }

    #[test]
    fn test_huge_quota_schedules_without_blowup() {
        let requests = vec![StudentRequest::new("big", 4_000_000_000).with_slots([Slot::new(Weekday::Thu, 600)])];
        let result = schedule(&requests, None, &SchedulerConfig::default()).unwrap();
        assert_eq!(result.summary().satisfied, 1);
        assert_eq!(result.student("big").unwrap().unmet_count, 3_999_999_999);
    }
}
