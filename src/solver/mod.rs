//! Assignment solvers over a [`FlowModel`].
//!
//! `Flow` and `Lp` both maximise the model's composite session value and
//! are exact. `Greedy` is a degraded first-fit pass whose output is always
//! flagged as non-optimal.

mod flow;
mod greedy;
mod lp;

use log::{info, warn};
use std::time::Instant;

use crate::config::SolverMode;
use crate::error::SchedulerError;
use crate::model::FlowModel;

/// Solver output before validation: `(student, slot)` index pairs into the
/// model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAssignment {
    pub pairs: Vec<(usize, usize)>,
    pub mode: SolverMode,
    pub optimal: bool,
}

impl RawAssignment {
    pub(crate) fn new(mut pairs: Vec<(usize, usize)>, mode: SolverMode) -> Self {
        pairs.sort_unstable();
        Self {
            pairs,
            mode,
            optimal: mode.is_exact(),
        }
    }
}

pub fn solve(model: &FlowModel, mode: SolverMode) -> Result<RawAssignment, SchedulerError> {
    let start_time = Instant::now();
    info!(
        "Solving with {:?}: {} students, {} slots, demand {}",
        mode,
        model.students.len(),
        model.slots.len(),
        model.total_demand()
    );

    let raw = match mode {
        SolverMode::Flow => flow::solve(model)?,
        SolverMode::Lp => lp::solve(model)?,
        SolverMode::Greedy => {
            warn!("Greedy mode selected; the assignment is not guaranteed to be optimal");
            greedy::solve(model)
        }
    };

    info!(
        "Placed {} of {} sessions in {:.2?}",
        raw.pairs.len(),
        model.total_demand(),
        start_time.elapsed()
    );
    Ok(raw)
}
