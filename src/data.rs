use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::config::SchedulerConfig;
use crate::error::InputError;

pub type StudentId = String;

/// Minutes since midnight.
pub type Minute = u16;

/// The teaching week. Weekends are never bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    pub fn short_name(self) -> &'static str {
        match self {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// An atomic bookable unit: a weekday plus the start of a time bucket.
///
/// Slots order by day first and then by time, which is also the order every
/// report lists them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    pub day: Weekday,
    pub minute: Minute,
}

impl Slot {
    pub fn new(day: Weekday, minute: Minute) -> Self {
        Self { day, minute }
    }

    /// `HH:MM` label of the bucket start.
    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.minute / 60, self.minute % 60)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.time_label())
    }
}

/// A validated request for weekly sessions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRequest {
    pub id: StudentId,
    pub weekly_quota: u32,
    pub preferred_slots: BTreeSet<Slot>,
    #[serde(default)]
    pub priority: u32,
}

impl StudentRequest {
    pub fn new(id: impl Into<StudentId>, weekly_quota: u32) -> Self {
        Self {
            id: id.into(),
            weekly_quota,
            preferred_slots: BTreeSet::new(),
            priority: 0,
        }
    }

    pub fn with_slots(mut self, slots: impl IntoIterator<Item = Slot>) -> Self {
        self.preferred_slots.extend(slots);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

/// The set of slots a run schedules over.
///
/// Usually derived from the union of all preferences, so it need not cover
/// the whole weekly grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SlotUniverse {
    slots: BTreeSet<Slot>,
}

impl SlotUniverse {
    pub fn from_requests(requests: &[StudentRequest]) -> Self {
        requests
            .iter()
            .flat_map(|r| r.preferred_slots.iter().copied())
            .collect()
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.slots.contains(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl FromIterator<Slot> for SlotUniverse {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

/// A roster row as collected by a form or spreadsheet, before any parsing.
///
/// `days` and `times` are cross-multiplied into preferred slots; `slots`
/// holds explicit `day-HH:MM` tokens. Tokens are separated by whitespace,
/// commas or semicolons. `level` stands in for `priority` when the latter
/// is absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStudentRecord {
    pub id: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub days: String,
    #[serde(default)]
    pub times: String,
    #[serde(default)]
    pub slots: String,
    pub quota: String,
    #[serde(default)]
    pub priority: Option<String>,
}

/// The complete input for one scheduling run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingInput {
    #[serde(default)]
    pub config: SchedulerConfig,
    #[serde(default)]
    pub students: Vec<StudentRequest>,
    #[serde(default)]
    pub records: Vec<RawStudentRecord>,
    #[serde(default)]
    pub universe: Option<SlotUniverse>,
}

/// One student occupying one slot this week.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub student_id: StudentId,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOutcome {
    pub id: StudentId,
    pub weekly_quota: u32,
    pub priority: u32,
    pub satisfied_count: u32,
    pub unmet_count: u32,
    pub slots: Vec<Slot>,
}

impl StudentOutcome {
    pub fn is_fully_satisfied(&self) -> bool {
        self.unmet_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotUsage {
    pub slot: Slot,
    pub capacity: u32,
    pub occupancy: u32,
    pub students: Vec<StudentId>,
}

impl SlotUsage {
    /// Fraction of capacity in use; a zero-capacity slot reports 0.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.occupancy as f64 / self.capacity as f64
        }
    }
}

/// Roster-wide totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSummary {
    pub requested: u64,
    pub satisfied: u64,
    pub unmet: u64,
    pub total_weight: i64,
    pub solver: crate::config::SolverMode,
    pub optimal: bool,
}

/// The final output of a run. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResult {
    assignments: Vec<Assignment>,
    students: Vec<StudentOutcome>,
    slots: Vec<SlotUsage>,
    issues: Vec<InputError>,
    summary: ScheduleSummary,
}

impl ScheduleResult {
    pub(crate) fn new(
        assignments: Vec<Assignment>,
        students: Vec<StudentOutcome>,
        slots: Vec<SlotUsage>,
        issues: Vec<InputError>,
        summary: ScheduleSummary,
    ) -> Self {
        Self {
            assignments,
            students,
            slots,
            issues,
            summary,
        }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn students(&self) -> &[StudentOutcome] {
        &self.students
    }

    pub fn slots(&self) -> &[SlotUsage] {
        &self.slots
    }

    /// Non-fatal input problems found while modelling, such as students
    /// without any preferred slot.
    pub fn issues(&self) -> &[InputError] {
        &self.issues
    }

    pub fn summary(&self) -> &ScheduleSummary {
        &self.summary
    }

    pub fn student(&self, id: &str) -> Option<&StudentOutcome> {
        self.students
            .binary_search_by(|s| s.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.students[i])
    }

    pub fn slot(&self, slot: &Slot) -> Option<&SlotUsage> {
        self.slots
            .binary_search_by(|u| u.slot.cmp(slot))
            .ok()
            .map(|i| &self.slots[i])
    }
}

impl fmt::Display for ScheduleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} sessions placed ({} unmet), weight {}",
            self.summary.satisfied, self.summary.requested, self.summary.unmet, self.summary.total_weight
        )?;
        for usage in &self.slots {
            writeln!(
                f,
                "  {}: {}/{} {}",
                usage.slot,
                usage.occupancy,
                usage.capacity,
                usage.students.join(", ")
            )?;
        }
        Ok(())
    }
}
