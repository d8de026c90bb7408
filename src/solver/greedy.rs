use itertools::Itertools;
use log::debug;
use std::cmp::Reverse;

use super::RawAssignment;
use crate::config::SolverMode;
use crate::model::FlowModel;

/// First-fit in order of each student's first-session value (weight, then
/// the configured tie-breaks), earliest preferred slot first.
pub fn solve(model: &FlowModel) -> RawAssignment {
    let mut remaining: Vec<u32> = model.slots.iter().map(|s| s.capacity).collect();
    let by_student = model.edges.iter().into_group_map_by(|e| e.student);

    let order: Vec<usize> = (0..model.students.len())
        .sorted_by_key(|&i| (Reverse(model.prefix_value(i, 1)), i))
        .collect();

    let mut pairs = Vec::new();
    for student in order {
        let quota = model.students[student].quota as usize;
        let placed = by_student
            .get(&student)
            .into_iter()
            .flatten()
            .filter(|e| remaining[e.slot] > 0)
            .take(quota)
            .map(|e| e.slot)
            .collect::<Vec<_>>();
        for slot in placed {
            remaining[slot] -= 1;
            pairs.push((student, slot));
        }
        debug!(
            "Greedy placed {} of {} for {}",
            pairs.iter().filter(|p| p.0 == student).count(),
            quota,
            model.students[student].id
        );
    }

    RawAssignment::new(pairs, SolverMode::Greedy)
}
