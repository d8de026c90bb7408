//! Turns raw roster rows into validated [`StudentRequest`]s.
//!
//! The accepted grammar is deliberately closed:
//! - day tokens: `mon`..`fri`, `monday`..`friday`, or the ordinal forms
//!   `2a`/`2ª` (Monday) to `6a`/`6ª` (Friday), case-insensitive;
//! - time tokens: `HH:MM` in 24h form, which must start a bucket of the grid;
//! - slot tokens: `<day>-<time>`;
//! - quota: a positive integer; priority: a non-negative integer;
//! - level: `beginner`/`iniciante` (0), `intermediate`/`intermédio` (1) or
//!   `advanced`/`avançado` (2), used as priority when none is given.
//!
//! Everything else is rejected here, with every bad row reported in a
//! single pass.

use itertools::Itertools;
use log::{debug, info};
use std::collections::{BTreeSet, HashSet};

use crate::config::WeekGrid;
use crate::data::{Minute, RawStudentRecord, Slot, SlotUniverse, StudentRequest, Weekday};
use crate::error::{InputError, RosterErrors};

/// Requests plus the universe of slots anyone asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRoster {
    pub requests: Vec<StudentRequest>,
    pub universe: SlotUniverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeTokenError {
    Malformed(&'static str),
    OffGrid,
}

pub fn parse_day(token: &str) -> Option<Weekday> {
    let day = match token.trim().to_lowercase().as_str() {
        "mon" | "monday" | "2a" | "2ª" => Weekday::Mon,
        "tue" | "tuesday" | "3a" | "3ª" => Weekday::Tue,
        "wed" | "wednesday" | "4a" | "4ª" => Weekday::Wed,
        "thu" | "thursday" | "5a" | "5ª" => Weekday::Thu,
        "fri" | "friday" | "6a" | "6ª" => Weekday::Fri,
        _ => return None,
    };
    Some(day)
}

/// Priority implied by a skill level token.
pub fn parse_level(token: &str) -> Option<u32> {
    let level = match token.trim().to_lowercase().as_str() {
        "beginner" | "iniciante" => 0,
        "intermediate" | "intermédio" | "intermedio" => 1,
        "advanced" | "avançado" | "avancado" => 2,
        _ => return None,
    };
    Some(level)
}

/// Parses `HH:MM` and checks that it starts a bucket of `grid`.
pub fn parse_time(token: &str, grid: &WeekGrid) -> Result<Minute, TimeTokenError> {
    let (h, m) = token
        .split_once(':')
        .ok_or(TimeTokenError::Malformed("expected HH:MM"))?;
    let digits = |s: &str, max_len| !s.is_empty() && s.len() <= max_len && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(h, 2) || !digits(m, 2) || m.len() != 2 {
        return Err(TimeTokenError::Malformed("expected HH:MM"));
    }
    let hours: Minute = h.parse().map_err(|_| TimeTokenError::Malformed("bad hour"))?;
    let minutes: Minute = m.parse().map_err(|_| TimeTokenError::Malformed("bad minute"))?;
    if hours >= 24 || minutes >= 60 {
        return Err(TimeTokenError::Malformed("not a time of day"));
    }

    let minute = hours * 60 + minutes;
    // The day is irrelevant to grid membership.
    if grid.contains(&Slot::new(Weekday::Mon, minute)) {
        Ok(minute)
    } else {
        Err(TimeTokenError::OffGrid)
    }
}

/// Parses a `<day>-<HH:MM>` token for `student`.
pub fn parse_slot_token(student: &str, token: &str, grid: &WeekGrid) -> Result<Slot, InputError> {
    let (day_part, time_part) = token
        .split_once('-')
        .ok_or_else(|| InputError::malformed(student, "slot", token, "expected <day>-<HH:MM>"))?;
    let day = parse_day(day_part)
        .ok_or_else(|| InputError::malformed(student, "slot", token, "unknown weekday"))?;
    let minute = time_minute(student, "slot", token, time_part, grid)?;
    Ok(Slot::new(day, minute))
}

fn time_minute(
    student: &str,
    field: &str,
    token: &str,
    time: &str,
    grid: &WeekGrid,
) -> Result<Minute, InputError> {
    parse_time(time, grid).map_err(|e| match e {
        TimeTokenError::Malformed(reason) => InputError::malformed(student, field, token, reason),
        TimeTokenError::OffGrid => InputError::OutOfRangeSlot {
            student: Some(student.to_string()),
            token: token.to_string(),
        },
    })
}

fn tokens(field: &str) -> impl Iterator<Item = &str> {
    field
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
}

/// Parses one raw row, collecting every problem in it.
pub fn normalize_record(
    record: &RawStudentRecord,
    grid: &WeekGrid,
) -> Result<StudentRequest, Vec<InputError>> {
    let id = record.id.trim();
    let mut errors = Vec::new();

    if id.is_empty() {
        errors.push(InputError::malformed(id, "id", &record.id, "student id is empty"));
    }

    let quota = match record.quota.trim().parse::<i64>() {
        Ok(q) if q > 0 => u32::try_from(q).ok(),
        Ok(_) => None,
        Err(_) => {
            errors.push(InputError::malformed(id, "quota", &record.quota, "not an integer"));
            Some(0)
        }
    };
    let quota = match quota {
        Some(q) => q,
        None => {
            errors.push(InputError::InvalidQuota {
                student: id.to_string(),
                token: record.quota.clone(),
            });
            0
        }
    };

    let level = match record.level.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(token) => parse_level(token).or_else(|| {
            errors.push(InputError::malformed(id, "level", token, "unknown level"));
            None
        }),
    };

    let priority = match record.priority.as_deref().map(str::trim) {
        None | Some("") => level.unwrap_or(0),
        Some(token) => token.parse::<u32>().unwrap_or_else(|_| {
            errors.push(InputError::malformed(
                id,
                "priority",
                token,
                "expected a non-negative integer",
            ));
            0
        }),
    };

    let mut days = BTreeSet::new();
    for token in tokens(&record.days) {
        match parse_day(token) {
            Some(day) => {
                days.insert(day);
            }
            None => errors.push(InputError::malformed(id, "day", token, "unknown weekday")),
        }
    }

    let mut minutes = BTreeSet::new();
    for token in tokens(&record.times) {
        match time_minute(id, "time", token, token, grid) {
            Ok(m) => {
                minutes.insert(m);
            }
            Err(e) => errors.push(e),
        }
    }

    let mut preferred: BTreeSet<Slot> = days
        .iter()
        .cartesian_product(minutes.iter())
        .map(|(d, m)| Slot::new(*d, *m))
        .collect();

    for token in tokens(&record.slots) {
        match parse_slot_token(id, token, grid) {
            Ok(slot) => {
                preferred.insert(slot);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(StudentRequest {
        id: id.to_string(),
        weekly_quota: quota,
        preferred_slots: preferred,
        priority,
    })
}

/// Normalizes a whole roster. Either every row is valid or every error of
/// every row is returned.
pub fn normalize_roster(
    records: &[RawStudentRecord],
    grid: &WeekGrid,
) -> Result<NormalizedRoster, RosterErrors> {
    let mut errors = Vec::new();
    let mut requests = Vec::with_capacity(records.len());
    let mut seen = HashSet::new();

    for record in records {
        match normalize_record(record, grid) {
            Ok(request) => {
                if !seen.insert(request.id.clone()) {
                    errors.push(duplicate_id(&request.id));
                    continue;
                }
                debug!(
                    "Student {} wants {} session(s) over {} slot(s)",
                    request.id,
                    request.weekly_quota,
                    request.preferred_slots.len()
                );
                requests.push(request);
            }
            Err(mut errs) => errors.append(&mut errs),
        }
    }

    if !errors.is_empty() {
        info!("Roster rejected with {} error(s)", errors.len());
        return Err(RosterErrors::new(errors));
    }

    let universe = SlotUniverse::from_requests(&requests);
    info!(
        "Normalized {} student(s) over a universe of {} slot(s)",
        requests.len(),
        universe.len()
    );
    Ok(NormalizedRoster { requests, universe })
}

fn duplicate_id(id: &str) -> InputError {
    InputError::malformed(id, "id", id, "duplicate student id")
}

/// Validates already-typed requests against the grid and an optional
/// explicit universe, returning the universe the run should use.
pub fn check_requests(
    requests: &[StudentRequest],
    universe: Option<&SlotUniverse>,
    grid: &WeekGrid,
) -> Result<SlotUniverse, RosterErrors> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    if let Some(universe) = universe {
        for slot in universe.iter().filter(|s| !grid.contains(s)) {
            errors.push(InputError::OutOfRangeSlot {
                student: None,
                token: slot.to_string(),
            });
        }
    }

    for request in requests {
        let id = request.id.as_str();
        if id.trim().is_empty() {
            errors.push(InputError::malformed(id, "id", id, "student id is empty"));
        } else if !seen.insert(id) {
            errors.push(duplicate_id(id));
        }
        if request.weekly_quota == 0 {
            errors.push(InputError::InvalidQuota {
                student: id.to_string(),
                token: request.weekly_quota.to_string(),
            });
        }
        for slot in &request.preferred_slots {
            let in_universe = universe.is_none_or(|u| u.contains(slot));
            if !grid.contains(slot) || !in_universe {
                errors.push(InputError::OutOfRangeSlot {
                    student: Some(id.to_string()),
                    token: slot.to_string(),
                });
            }
        }
    }

    if !errors.is_empty() {
        return Err(RosterErrors::new(errors));
    }
    Ok(universe
        .cloned()
        .unwrap_or_else(|| SlotUniverse::from_requests(requests)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, days: &str, times: &str, quota: &str) -> RawStudentRecord {
        RawStudentRecord {
            id: id.to_string(),
            days: days.to_string(),
            times: times.to_string(),
            quota: quota.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_day_grammar() {
        assert_eq!(parse_day("2ª"), Some(Weekday::Mon));
        assert_eq!(parse_day("6a"), Some(Weekday::Fri));
        assert_eq!(parse_day("Wednesday"), Some(Weekday::Wed));
        assert_eq!(parse_day("THU"), Some(Weekday::Thu));
        assert_eq!(parse_day("sat"), None);
        assert_eq!(parse_day("7a"), None);
    }

    #[test]
    fn test_time_grammar() {
        let grid = WeekGrid::default();
        assert_eq!(parse_time("08:00", &grid), Ok(480));
        assert_eq!(parse_time("21:30", &grid), Ok(1290));
        assert_eq!(parse_time("22:00", &grid), Err(TimeTokenError::OffGrid));
        assert_eq!(parse_time("07:30", &grid), Err(TimeTokenError::OffGrid));
        assert_eq!(parse_time("09:15", &grid), Err(TimeTokenError::OffGrid));
        assert!(matches!(parse_time("9h", &grid), Err(TimeTokenError::Malformed(_))));
        assert!(matches!(parse_time("25:00", &grid), Err(TimeTokenError::Malformed(_))));
        assert!(matches!(parse_time("10:5", &grid), Err(TimeTokenError::Malformed(_))));
    }

    #[test]
    fn test_days_cross_times_and_dedup() {
        let mut raw = record("s1", "2ª 4ª 2a", "08:00 08:30, 08:00", "2");
        raw.slots = "fri-10:00; mon-08:00".to_string();
        let request = normalize_record(&raw, &WeekGrid::default()).unwrap();
        assert_eq!(request.preferred_slots.len(), 5);
        assert!(request.preferred_slots.contains(&Slot::new(Weekday::Wed, 510)));
        assert!(request.preferred_slots.contains(&Slot::new(Weekday::Fri, 600)));
        assert_eq!(request.weekly_quota, 2);
        assert_eq!(request.priority, 0);
    }

    #[test]
    fn test_level_stands_in_for_priority() {
        let grid = WeekGrid::default();
        let mut raw = record("lv", "mon", "08:00", "1");
        raw.level = Some("Avançado".to_string());
        assert_eq!(normalize_record(&raw, &grid).unwrap().priority, 2);

        raw.priority = Some("7".to_string());
        assert_eq!(normalize_record(&raw, &grid).unwrap().priority, 7);

        raw.level = Some("expert".to_string());
        let errs = normalize_record(&raw, &grid).unwrap_err();
        assert!(matches!(&errs[0], InputError::MalformedRequest { field, .. } if field == "level"));
        assert_eq!(parse_level("intermediate"), Some(1));
        assert_eq!(parse_level("Iniciante"), Some(0));
    }

    #[test]
    fn test_zero_width_grid_rejects_times_without_panicking() {
        let grid = WeekGrid {
            bucket_minutes: 0,
            ..WeekGrid::default()
        };
        let errors = normalize_roster(&[record("z", "mon", "08:00", "1")], &grid).unwrap_err();
        assert!(matches!(errors.errors(), [InputError::OutOfRangeSlot { .. }]));
    }

    #[test]
    fn test_quota_validation() {
        let grid = WeekGrid::default();
        for bad in ["0", "-2"] {
            let errs = normalize_record(&record("q", "mon", "08:00", bad), &grid).unwrap_err();
            assert!(matches!(errs[0], InputError::InvalidQuota { .. }), "{bad}");
        }
        let errs = normalize_record(&record("q", "mon", "08:00", "two"), &grid).unwrap_err();
        assert!(matches!(errs[0], InputError::MalformedRequest { ref field, .. } if field == "quota"));
    }

    #[test]
    fn test_roster_reports_every_bad_row() {
        let records = vec![
            record("ok", "mon", "08:00", "1"),
            record("bad-day", "sun", "08:00", "1"),
            record("bad-time", "mon", "23:00", "1"),
            record("bad-quota", "mon", "08:00", "0"),
            record("ok", "tue", "09:00", "1"),
        ];
        let errors = normalize_roster(&records, &WeekGrid::default()).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors.errors()[1], InputError::OutOfRangeSlot { .. }));
        assert!(errors
            .for_student("ok")
            .any(|e| matches!(e, InputError::MalformedRequest { reason, .. } if reason.contains("duplicate"))));
    }

    #[test]
    fn test_universe_is_only_requested_slots() {
        let records = vec![
            record("a", "mon tue", "08:00", "1"),
            record("b", "tue", "08:00 18:30", "2"),
        ];
        let roster = normalize_roster(&records, &WeekGrid::default()).unwrap();
        assert_eq!(roster.universe.len(), 3);
        assert_eq!(roster.requests.len(), 2);
    }

    #[test]
    fn test_empty_preferences_pass_normalization() {
        let roster = normalize_roster(&[record("lonely", "", "", "1")], &WeekGrid::default()).unwrap();
        assert!(roster.requests[0].preferred_slots.is_empty());
        assert!(roster.universe.is_empty());
    }

    #[test]
    fn test_check_requests_against_explicit_universe() {
        let grid = WeekGrid::default();
        let inside = Slot::new(Weekday::Mon, 480);
        let other = Slot::new(Weekday::Tue, 480);
        let universe: SlotUniverse = [inside].into_iter().collect();
        let requests = vec![StudentRequest::new("a", 1).with_slots([inside, other])];
        let errors = check_requests(&requests, Some(&universe), &grid).unwrap_err();
        assert_eq!(errors.len(), 1);

        let off_grid = vec![StudentRequest::new("b", 0).with_slots([Slot::new(Weekday::Mon, 7 * 60)])];
        let errors = check_requests(&off_grid, None, &grid).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
