use serde::Serialize;
use thiserror::Error;

use crate::data::{Slot, StudentId};

/// A problem with caller-supplied data, tied to the student (or slot) and
/// the token that caused it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InputError {
    #[error("student '{student}': malformed {field} '{token}': {reason}")]
    MalformedRequest {
        student: StudentId,
        field: String,
        token: String,
        reason: String,
    },

    #[error("{}slot '{token}' is outside the weekly grid", student_prefix(.student))]
    OutOfRangeSlot {
        student: Option<StudentId>,
        token: String,
    },

    #[error("student '{student}': weekly quota '{token}' must be a positive integer")]
    InvalidQuota { student: StudentId, token: String },

    #[error("capacity {value}{} must not be negative", slot_suffix(.slot))]
    InvalidCapacity { slot: Option<Slot>, value: i64 },

    #[error("student '{student}' wants {quota} session(s) but has no preferred slot")]
    EmptyPreferenceSet { student: StudentId, quota: u32 },
}

fn student_prefix(student: &Option<StudentId>) -> String {
    match student {
        Some(id) => format!("student '{id}': "),
        None => String::new(),
    }
}

fn slot_suffix(slot: &Option<Slot>) -> String {
    match slot {
        Some(slot) => format!(" for {slot}"),
        None => String::new(),
    }
}

impl InputError {
    pub(crate) fn malformed(
        student: &str,
        field: &str,
        token: &str,
        reason: impl Into<String>,
    ) -> Self {
        InputError::MalformedRequest {
            student: student.to_string(),
            field: field.to_string(),
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// The student the error belongs to, if any.
    pub fn student(&self) -> Option<&str> {
        match self {
            InputError::MalformedRequest { student, .. }
            | InputError::InvalidQuota { student, .. }
            | InputError::EmptyPreferenceSet { student, .. } => Some(student),
            InputError::OutOfRangeSlot { student, .. } => student.as_deref(),
            InputError::InvalidCapacity { .. } => None,
        }
    }
}

/// Every input error found in one validation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} input error(s): {}", .errors.len(), join_errors(.errors))]
pub struct RosterErrors {
    errors: Vec<InputError>,
}

fn join_errors(errors: &[InputError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RosterErrors {
    pub fn new(errors: Vec<InputError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[InputError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors reported against one student.
    pub fn for_student<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a InputError> + 'a {
        self.errors.iter().filter(move |e| e.student() == Some(id))
    }
}

impl IntoIterator for RosterErrors {
    type Item = InputError;
    type IntoIter = std::vec::IntoIter<InputError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid input: {0}")]
    Input(#[from] RosterErrors),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("objective does not fit the solver's number range: {0}")]
    ObjectiveOverflow(String),

    #[error("solver backend failed: {0}")]
    Solver(String),

    /// The solver returned an assignment that breaks an invariant. This is a
    /// bug, never a property of the input.
    #[error("solver contract violation: {detail}")]
    SolverContractViolation { detail: String },
}

impl SchedulerError {
    pub fn input_errors(&self) -> &[InputError] {
        match self {
            SchedulerError::Input(errors) => errors.errors(),
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Weekday;

    #[test]
    fn messages_name_the_offending_student_and_token() {
        let err = InputError::InvalidQuota {
            student: "ana".into(),
            token: "0".into(),
        };
        assert_eq!(
            err.to_string(),
            "student 'ana': weekly quota '0' must be a positive integer"
        );

        let err = InputError::InvalidCapacity {
            slot: Some(Slot::new(Weekday::Wed, 9 * 60)),
            value: -2,
        };
        assert_eq!(err.to_string(), "capacity -2 for Wed 09:00 must not be negative");
    }

    #[test]
    fn batch_is_filterable_by_student() {
        let errors = RosterErrors::new(vec![
            InputError::malformed("a", "day", "sun", "unknown weekday"),
            InputError::InvalidQuota {
                student: "b".into(),
                token: "-1".into(),
            },
            InputError::OutOfRangeSlot {
                student: Some("a".into()),
                token: "07:00".into(),
            },
        ]);
        assert_eq!(errors.for_student("a").count(), 2);
        assert!(errors.to_string().starts_with("3 input error(s)"));
    }

    #[test]
    fn input_errors_serialize_with_kind_tag() {
        let err = InputError::EmptyPreferenceSet {
            student: "c".into(),
            quota: 1,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "emptyPreferenceSet");
        assert_eq!(json["student"], "c");
    }
}
