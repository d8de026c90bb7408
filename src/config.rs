use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{Minute, Slot, SlotUniverse};
use crate::error::{InputError, RosterErrors, SchedulerError};

/// Default number of students a slot can hold.
pub const DEFAULT_CAPACITY: i64 = 4;

/// The fixed weekly grid every slot must fall on: Monday to Friday, buckets
/// of `bucket_minutes` starting at `start_minute` and ending before
/// `end_minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekGrid {
    pub start_minute: Minute,
    pub end_minute: Minute,
    pub bucket_minutes: Minute,
}

impl Default for WeekGrid {
    fn default() -> Self {
        Self {
            start_minute: 8 * 60,
            end_minute: 22 * 60,
            bucket_minutes: 30,
        }
    }
}

impl WeekGrid {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.bucket_minutes == 0 {
            return Err(SchedulerError::InvalidConfig(
                "bucket width must be positive".to_string(),
            ));
        }
        if self.start_minute >= self.end_minute || self.end_minute > 24 * 60 {
            return Err(SchedulerError::InvalidConfig(format!(
                "grid window {}..{} is not a valid part of a day",
                self.start_minute, self.end_minute
            )));
        }
        Ok(())
    }

    pub fn contains(&self, slot: &Slot) -> bool {
        self.bucket_minutes > 0
            && slot.minute >= self.start_minute
            && slot.minute < self.end_minute
            && (slot.minute - self.start_minute) % self.bucket_minutes == 0
    }

    pub fn buckets_per_day(&self) -> usize {
        if self.bucket_minutes == 0 || self.start_minute >= self.end_minute {
            return 0;
        }
        (self.end_minute - self.start_minute).div_ceil(self.bucket_minutes) as usize
    }

    /// Every slot of the week in order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        crate::data::Weekday::ALL.into_iter().flat_map(move |day| {
            (0..self.buckets_per_day())
                .map(move |i| Slot::new(day, self.start_minute + i as Minute * self.bucket_minutes))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityOverride {
    pub slot: Slot,
    pub capacity: i64,
}

/// How many students each slot may hold.
///
/// Capacities arrive signed so that negative values can be reported
/// rather than rejected by the deserializer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapacityRule {
    Uniform(i64),
    PerSlot {
        default: i64,
        #[serde(default)]
        overrides: Vec<CapacityOverride>,
    },
}

impl Default for CapacityRule {
    fn default() -> Self {
        CapacityRule::Uniform(DEFAULT_CAPACITY)
    }
}

impl CapacityRule {
    /// Resolves the rule into a concrete bound for every slot in `universe`.
    ///
    /// All negative values and off-grid overrides are reported together.
    pub fn resolve(
        &self,
        universe: &SlotUniverse,
        grid: &WeekGrid,
    ) -> Result<SlotCapacities, SchedulerError> {
        let mut errors = Vec::new();
        let (default, overrides) = match self {
            CapacityRule::Uniform(value) => (*value, &[][..]),
            CapacityRule::PerSlot { default, overrides } => (*default, overrides.as_slice()),
        };

        if default < 0 {
            errors.push(InputError::InvalidCapacity {
                slot: None,
                value: default,
            });
        }

        let mut explicit = BTreeMap::new();
        for o in overrides {
            if !grid.contains(&o.slot) {
                errors.push(InputError::OutOfRangeSlot {
                    student: None,
                    token: o.slot.to_string(),
                });
            } else if o.capacity < 0 {
                errors.push(InputError::InvalidCapacity {
                    slot: Some(o.slot),
                    value: o.capacity,
                });
            } else {
                explicit.insert(o.slot, clamp_capacity(o.capacity));
            }
        }

        if !errors.is_empty() {
            return Err(SchedulerError::Input(RosterErrors::new(errors)));
        }

        let default = clamp_capacity(default);
        let bounds = universe
            .iter()
            .map(|slot| (*slot, explicit.get(slot).copied().unwrap_or(default)))
            .collect();
        Ok(SlotCapacities { bounds })
    }
}

fn clamp_capacity(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Per-slot bounds for exactly the slots of one run's universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotCapacities {
    bounds: BTreeMap<Slot, u32>,
}

impl SlotCapacities {
    pub fn get(&self, slot: &Slot) -> Option<u32> {
        self.bounds.get(slot).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &u32)> {
        self.bounds.iter()
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SolverMode {
    /// Exact min-cost flow. Deterministic for every tie-break order.
    #[default]
    Flow,
    /// Exact integer program on HiGHS, solved one objective tier at a time.
    Lp,
    /// First-fit in priority order. Not optimal; results are flagged as such.
    Greedy,
}

impl SolverMode {
    pub fn is_exact(self) -> bool {
        !matches!(self, SolverMode::Greedy)
    }
}

/// Weight of a single honoured session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WeightPolicy {
    /// Every session is worth 1.
    #[default]
    Uniform,
    /// A session is worth `1 + priority`.
    PriorityScaled,
}

/// Secondary criteria applied, in order, among assignments of equal weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreak {
    /// Prefer sessions for higher-priority students.
    Priority,
    /// Prefer the student whose unmet share of their quota is largest.
    Fairness,
    /// Prefer the lexicographically smaller student id.
    StudentId,
}

fn default_tie_breaks() -> Vec<TieBreak> {
    vec![TieBreak::Priority, TieBreak::Fairness, TieBreak::StudentId]
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    #[serde(default)]
    pub grid: WeekGrid,
    #[serde(default)]
    pub capacity: CapacityRule,
    #[serde(default)]
    pub mode: SolverMode,
    #[serde(default)]
    pub weighting: WeightPolicy,
    #[serde(default = "default_tie_breaks")]
    pub tie_breaks: Vec<TieBreak>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grid: WeekGrid::default(),
            capacity: CapacityRule::default(),
            mode: SolverMode::default(),
            weighting: WeightPolicy::default(),
            tie_breaks: default_tie_breaks(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = CapacityRule::Uniform(capacity);
        self
    }

    pub fn with_mode(mut self, mode: SolverMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_weighting(mut self, weighting: WeightPolicy) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn with_tie_breaks(mut self, tie_breaks: Vec<TieBreak>) -> Self {
        self.tie_breaks = tie_breaks;
        self
    }

    /// Rejects grids that describe no time and tie-break lists naming the
    /// same criterion twice.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        self.grid.validate()?;
        for (i, t) in self.tie_breaks.iter().enumerate() {
            if self.tie_breaks[..i].contains(t) {
                return Err(SchedulerError::InvalidConfig(format!(
                    "tie-break {t:?} listed more than once"
                )));
            }
        }
        Ok(())
    }
}
