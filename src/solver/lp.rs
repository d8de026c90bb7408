//! Exact solver on the HiGHS integer programming backend.
//!
//! x_e = 1 if preference edge e is used, y_u = 1 if session unit u is
//! honoured. Each student's used edges must equal their honoured units and
//! each slot's used edges must fit its capacity. The lexicographic
//! objective is solved one tier at a time, pinning every earlier tier at
//! its optimum, so the coefficients stay small integers.

use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, Solution, SolverModel, Variable, constraint, default_solver,
};
use itertools::Itertools;
use log::{debug, info};

use super::RawAssignment;
use crate::config::SolverMode;
use crate::error::SchedulerError;
use crate::model::FlowModel;

struct Stage {
    pairs: Vec<(usize, usize)>,
    honoured: Vec<bool>,
}

pub fn solve(model: &FlowModel) -> Result<RawAssignment, SchedulerError> {
    if model.edges.is_empty() {
        return Ok(RawAssignment::new(Vec::new(), SolverMode::Lp));
    }

    let mut pinned: Vec<(usize, i64)> = Vec::new();
    let mut last = None;
    for tier in 0..model.tiers.len() {
        if model.units.iter().all(|u| u.tiers[tier] == 0) {
            debug!("Skipping empty objective tier {:?}", model.tiers[tier]);
            continue;
        }
        let stage = solve_stage(model, tier, &pinned)?;
        let achieved = tier_total(model, tier, &stage.honoured);
        info!("Tier {:?} optimum: {achieved}", model.tiers[tier]);
        pinned.push((tier, achieved));
        last = Some(stage);
    }

    let pairs = match last {
        Some(stage) => stage.pairs,
        None => Vec::new(),
    };
    Ok(RawAssignment::new(pairs, SolverMode::Lp))
}

fn tier_total(model: &FlowModel, tier: usize, honoured: &[bool]) -> i64 {
    model
        .units
        .iter()
        .zip(honoured)
        .filter(|(_, on)| **on)
        .map(|(u, _)| u.tiers[tier])
        .sum()
}

fn tier_expression(model: &FlowModel, tier: usize, units: &[Variable]) -> Expression {
    model
        .units
        .iter()
        .zip(units)
        .filter(|(u, _)| u.tiers[tier] != 0)
        .map(|(u, var)| u.tiers[tier] as f64 * *var)
        .sum()
}

fn solve_stage(
    model: &FlowModel,
    tier: usize,
    pinned: &[(usize, i64)],
) -> Result<Stage, SchedulerError> {
    let mut problem = ProblemVariables::new();
    let edge_vars = problem.add_vector(variable().binary(), model.edges.len());
    let unit_vars = problem.add_vector(variable().binary(), model.units.len());

    let objective = tier_expression(model, tier, &unit_vars);
    let mut lp = problem
        .maximise(objective)
        .using(default_solver)
        .set_option("threads", 1) // single thread and fixed seed keep runs reproducible
        .set_option("random_seed", 1234)
        .set_option("mip_rel_gap", 0.0)
        .set_option("log_to_console", "false");

    let edges_by_student = model
        .edges
        .iter()
        .zip(&edge_vars)
        .into_group_map_by(|(e, _)| e.student);
    for (i, student) in model.students.iter().enumerate() {
        let placed: Expression = edges_by_student
            .get(&i)
            .into_iter()
            .flatten()
            .map(|(_, var)| **var)
            .sum();
        let honoured: Expression = unit_vars[student.units.clone()].iter().copied().sum();
        lp.add_constraint(constraint!(placed == honoured));
    }

    let edges_by_slot = model
        .edges
        .iter()
        .zip(&edge_vars)
        .into_group_map_by(|(e, _)| e.slot);
    for (j, slot) in model.slots.iter().enumerate() {
        if let Some(edges) = edges_by_slot.get(&j) {
            let occupied: Expression = edges.iter().map(|(_, var)| **var).sum();
            let capacity = slot.capacity as f64;
            lp.add_constraint(constraint!(occupied <= capacity));
        }
    }

    for (pinned_tier, achieved) in pinned {
        let total = tier_expression(model, *pinned_tier, &unit_vars);
        let floor = *achieved as f64 - 0.5;
        lp.add_constraint(constraint!(total >= floor));
    }

    let solution = lp
        .solve()
        .map_err(|e| SchedulerError::Solver(format!("tier {:?}: {e}", model.tiers[tier])))?;

    let pairs = model
        .edges
        .iter()
        .zip(&edge_vars)
        .filter(|(_, var)| solution.value(**var) > 0.5)
        .map(|(e, _)| (e.student, e.slot))
        .collect();
    let honoured = unit_vars
        .iter()
        .map(|var| solution.value(*var) > 0.5)
        .collect();
    Ok(Stage { pairs, honoured })
}
