//! Cross-checks solver output against the assignment invariants and builds
//! the [`ScheduleResult`].
//!
//! The checks do not trust the solver: indices, preference membership,
//! duplicates, slot capacity and student quota are all recounted here. Any
//! failure aborts the run with [`SchedulerError::SolverContractViolation`].

use log::{error, info};
use std::collections::HashSet;

use crate::data::{Assignment, ScheduleResult, ScheduleSummary, SlotUsage, StudentOutcome};
use crate::error::SchedulerError;
use crate::model::FlowModel;
use crate::solver::RawAssignment;

fn violation(detail: String) -> SchedulerError {
    error!("Solver contract violation: {detail}");
    SchedulerError::SolverContractViolation { detail }
}

pub fn validate_and_report(
    model: &FlowModel,
    raw: &RawAssignment,
) -> Result<ScheduleResult, SchedulerError> {
    let edges: HashSet<(usize, usize)> = model.edges.iter().map(|e| (e.student, e.slot)).collect();
    let mut seen = HashSet::with_capacity(raw.pairs.len());
    let mut per_student = vec![Vec::new(); model.students.len()];
    let mut per_slot = vec![Vec::new(); model.slots.len()];

    for &(student, slot) in &raw.pairs {
        if student >= model.students.len() || slot >= model.slots.len() {
            return Err(violation(format!("pair ({student}, {slot}) is out of range")));
        }
        let who = &model.students[student].id;
        let when = model.slots[slot].slot;
        if !edges.contains(&(student, slot)) {
            return Err(violation(format!("{who} placed in non-preferred slot {when}")));
        }
        if !seen.insert((student, slot)) {
            return Err(violation(format!("{who} placed twice in {when}")));
        }
        per_student[student].push(slot);
        per_slot[slot].push(student);
    }

    for (j, occupants) in per_slot.iter().enumerate() {
        let node = &model.slots[j];
        if occupants.len() as u64 > node.capacity as u64 {
            return Err(violation(format!(
                "{} holds {} students, capacity {}",
                node.slot,
                occupants.len(),
                node.capacity
            )));
        }
    }
    for (i, slots) in per_student.iter().enumerate() {
        let node = &model.students[i];
        if slots.len() as u64 > node.quota as u64 {
            return Err(violation(format!(
                "{} placed {} times, quota {}",
                node.id,
                slots.len(),
                node.quota
            )));
        }
    }

    let mut assignments = Vec::with_capacity(raw.pairs.len());
    let mut students = Vec::with_capacity(model.students.len());
    let mut total_weight = 0i64;
    for (i, node) in model.students.iter().enumerate() {
        let mut slots: Vec<_> = per_student[i].iter().map(|&j| model.slots[j].slot).collect();
        slots.sort();
        let satisfied = slots.len() as u32;
        total_weight += node.weight * satisfied as i64;
        assignments.extend(slots.iter().map(|slot| Assignment {
            student_id: node.id.clone(),
            slot: *slot,
        }));
        students.push(StudentOutcome {
            id: node.id.clone(),
            weekly_quota: node.quota,
            priority: node.priority,
            satisfied_count: satisfied,
            unmet_count: node.quota - satisfied,
            slots,
        });
    }

    let slots = model
        .slots
        .iter()
        .zip(&per_slot)
        .map(|(node, occupants)| {
            let mut names: Vec<_> = occupants
                .iter()
                .map(|&i| model.students[i].id.clone())
                .collect();
            names.sort();
            SlotUsage {
                slot: node.slot,
                capacity: node.capacity,
                occupancy: occupants.len() as u32,
                students: names,
            }
        })
        .collect();

    let requested: u64 = students.iter().map(|s| s.weekly_quota as u64).sum();
    let satisfied: u64 = students.iter().map(|s| s.satisfied_count as u64).sum();
    let summary = ScheduleSummary {
        requested,
        satisfied,
        unmet: requested - satisfied,
        total_weight,
        solver: raw.mode,
        optimal: raw.optimal,
    };
    info!(
        "Schedule: {satisfied}/{requested} sessions, {} student(s) short",
        students.iter().filter(|s| s.unmet_count > 0).count()
    );

    Ok(ScheduleResult::new(
        assignments,
        students,
        slots,
        model.issues.clone(),
        summary,
    ))
}
