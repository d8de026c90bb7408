//! Bipartite capacity network: `source, students.., slots.., sink`.
//!
//! Each honourable session is a unit arc from the source carrying a
//! composite value, session weight on top and one tier per [`TieBreak`]
//! below it. Values never increase along a student's sessions.

use log::{debug, warn};
use std::collections::HashMap;
use std::ops::Range;

use crate::config::{SchedulerConfig, SlotCapacities, TieBreak, WeightPolicy};
use crate::data::{Slot, StudentId, StudentRequest};
use crate::error::{InputError, SchedulerError};

/// Resolution of the fairness tier.
pub const FAIRNESS_RESOLUTION: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveTier {
    Weight,
    Tie(TieBreak),
}

#[derive(Debug, Clone)]
pub struct StudentNode {
    pub id: StudentId,
    pub quota: u32,
    pub priority: u32,
    /// Weight of each honoured session.
    pub weight: i64,
    /// This student's entries in [`FlowModel::units`].
    pub units: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct SlotNode {
    pub slot: Slot,
    pub capacity: u32,
}

/// A student may be placed in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceEdge {
    pub student: usize,
    pub slot: usize,
    pub weight: i64,
}

/// One requested session of one student.
#[derive(Debug, Clone)]
pub struct SessionUnit {
    pub student: usize,
    /// Per-tier values, aligned with [`FlowModel::tiers`].
    pub tiers: Vec<i64>,
    pub value: i128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arc {
    pub from: usize,
    pub to: usize,
    pub capacity: u32,
    pub value: i128,
}

#[derive(Debug, Clone)]
pub struct FlowModel {
    pub students: Vec<StudentNode>,
    pub slots: Vec<SlotNode>,
    pub edges: Vec<PreferenceEdge>,
    pub units: Vec<SessionUnit>,
    pub tiers: Vec<ObjectiveTier>,
    pub arcs: Vec<Arc>,
    /// Reported problems that do not stop the run.
    pub issues: Vec<InputError>,
}

impl FlowModel {
    pub fn source(&self) -> usize {
        0
    }

    pub fn student_node(&self, student: usize) -> usize {
        1 + student
    }

    pub fn slot_node(&self, slot: usize) -> usize {
        1 + self.students.len() + slot
    }

    pub fn sink(&self) -> usize {
        self.node_count() - 1
    }

    pub fn node_count(&self) -> usize {
        2 + self.students.len() + self.slots.len()
    }

    pub fn total_demand(&self) -> u64 {
        self.students.iter().map(|s| s.quota as u64).sum()
    }

    pub fn slot_index(&self, slot: &Slot) -> Option<usize> {
        self.slots.binary_search_by(|n| n.slot.cmp(slot)).ok()
    }

    /// Value of giving `student` their first `count` sessions.
    pub fn prefix_value(&self, student: usize, count: usize) -> i128 {
        let units = &self.students[student].units;
        self.units[units.start..units.start + count.min(units.len())]
            .iter()
            .map(|u| u.value)
            .sum()
    }
}

pub fn build_model(
    requests: &[StudentRequest],
    capacities: &SlotCapacities,
    config: &SchedulerConfig,
) -> Result<FlowModel, SchedulerError> {
    let mut ordered: Vec<&StudentRequest> = requests.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let slots: Vec<SlotNode> = capacities
        .iter()
        .map(|(slot, capacity)| SlotNode {
            slot: *slot,
            capacity: *capacity,
        })
        .collect();
    let slot_lookup: HashMap<Slot, usize> = slots
        .iter()
        .enumerate()
        .map(|(i, n)| (n.slot, i))
        .collect();

    let mut tiers = vec![ObjectiveTier::Weight];
    tiers.extend(config.tie_breaks.iter().map(|t| ObjectiveTier::Tie(*t)));

    let n = ordered.len() as i64;
    let mut students = Vec::with_capacity(ordered.len());
    let mut edges = Vec::new();
    let mut units = Vec::new();
    let mut issues = Vec::new();

    for (index, request) in ordered.iter().enumerate() {
        let weight = match config.weighting {
            WeightPolicy::Uniform => 1,
            WeightPolicy::PriorityScaled => 1 + request.priority as i64,
        };

        if request.preferred_slots.is_empty() {
            warn!(
                "Student {} wants {} session(s) but has no preferred slot",
                request.id, request.weekly_quota
            );
            issues.push(InputError::EmptyPreferenceSet {
                student: request.id.clone(),
                quota: request.weekly_quota,
            });
        }

        for slot in &request.preferred_slots {
            let slot = slot_lookup.get(slot).copied().ok_or_else(|| {
                SchedulerError::InvalidConfig(format!(
                    "slot {slot} preferred by {} has no capacity",
                    request.id
                ))
            })?;
            edges.push(PreferenceEdge {
                student: index,
                slot,
                weight,
            });
        }

        // sessions beyond the preference count can never be honoured
        let quota = request.weekly_quota as i64;
        let reachable = quota.min(request.preferred_slots.len() as i64);
        let start = units.len();
        for k in 0..reachable {
            let values = tiers
                .iter()
                .map(|tier| match tier {
                    ObjectiveTier::Weight => weight,
                    ObjectiveTier::Tie(TieBreak::Priority) => request.priority as i64,
                    ObjectiveTier::Tie(TieBreak::Fairness) => (quota - k) * FAIRNESS_RESOLUTION / quota,
                    ObjectiveTier::Tie(TieBreak::StudentId) => n - index as i64,
                })
                .collect();
            units.push(SessionUnit {
                student: index,
                tiers: values,
                value: 0,
            });
        }

        students.push(StudentNode {
            id: request.id.clone(),
            quota: request.weekly_quota,
            priority: request.priority,
            weight,
            units: start..units.len(),
        });
    }

    let scales = tier_scales(&units, tiers.len())?;
    for unit in &mut units {
        unit.value = composite(&unit.tiers, &scales)?;
    }

    let mut model = FlowModel {
        students,
        slots,
        edges,
        units,
        tiers,
        arcs: Vec::new(),
        issues,
    };
    model.arcs = network_arcs(&model);

    debug!(
        "Built model: {} students, {} slots, {} preference edges, {} session units, {} arcs",
        model.students.len(),
        model.slots.len(),
        model.edges.len(),
        model.units.len(),
        model.arcs.len()
    );
    Ok(model)
}

/// Scale of each tier, top tier first.
fn tier_scales(units: &[SessionUnit], tier_count: usize) -> Result<Vec<i128>, SchedulerError> {
    let overflow = || SchedulerError::ObjectiveOverflow(format!("{} sessions across {tier_count} tiers", units.len()));
    let unit_count = units.len() as i128;
    let mut scales = vec![0i128; tier_count];
    // Largest total all tiers below the current one can contribute.
    let mut below: i128 = 0;
    for t in (0..tier_count).rev() {
        let scale = below.checked_add(1).ok_or_else(overflow)?;
        let max = units.iter().map(|u| u.tiers[t]).max().unwrap_or(0) as i128;
        below = unit_count
            .checked_mul(max)
            .and_then(|v| v.checked_mul(scale))
            .and_then(|v| v.checked_add(below))
            .ok_or_else(overflow)?;
        scales[t] = scale;
    }
    Ok(scales)
}

fn composite(values: &[i64], scales: &[i128]) -> Result<i128, SchedulerError> {
    values.iter().zip(scales).try_fold(0i128, |acc, (v, s)| {
        (*v as i128)
            .checked_mul(*s)
            .and_then(|x| acc.checked_add(x))
            .ok_or_else(|| SchedulerError::ObjectiveOverflow("session value".to_string()))
    })
}

fn network_arcs(model: &FlowModel) -> Vec<Arc> {
    let mut arcs = Vec::with_capacity(model.units.len() + model.edges.len() + model.slots.len());
    for (i, student) in model.students.iter().enumerate() {
        for unit in &model.units[student.units.clone()] {
            arcs.push(Arc {
                from: model.source(),
                to: model.student_node(i),
                capacity: 1,
                value: unit.value,
            });
        }
    }
    for edge in &model.edges {
        arcs.push(Arc {
            from: model.student_node(edge.student),
            to: model.slot_node(edge.slot),
            capacity: 1,
            value: 0,
        });
    }
    for (j, slot) in model.slots.iter().enumerate() {
        arcs.push(Arc {
            from: model.slot_node(j),
            to: model.sink(),
            capacity: slot.capacity,
            value: 0,
        });
    }
    arcs
}
