//! Exact solver: successive shortest paths over negated session values.

use log::{debug, trace};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::RawAssignment;
use crate::config::SolverMode;
use crate::error::SchedulerError;
use crate::model::FlowModel;

const INF: i128 = i128::MAX;

#[derive(Debug, Clone)]
struct ResidualArc {
    to: usize,
    cap: u32,
    cost: i128,
    rev: usize,
}

struct Residual {
    adj: Vec<Vec<ResidualArc>>,
}

impl Residual {
    fn new(nodes: usize) -> Self {
        Self {
            adj: vec![Vec::new(); nodes],
        }
    }

    /// Returns the position of the forward arc in `adj[from]`.
    fn add_arc(&mut self, from: usize, to: usize, cap: u32, cost: i128) -> usize {
        let forward = self.adj[from].len();
        let backward = self.adj[to].len() + usize::from(from == to);
        self.adj[from].push(ResidualArc {
            to,
            cap,
            cost,
            rev: backward,
        });
        self.adj[to].push(ResidualArc {
            to: from,
            cap: 0,
            cost: -cost,
            rev: forward,
        });
        forward
    }

    fn initial_potentials(&self, source: usize) -> Vec<i128> {
        let n = self.adj.len();
        let mut dist = vec![INF; n];
        dist[source] = 0;
        for _ in 0..n {
            let mut changed = false;
            for u in 0..n {
                if dist[u] == INF {
                    continue;
                }
                for arc in self.adj[u].iter().filter(|a| a.cap > 0) {
                    let candidate = dist[u] + arc.cost;
                    if candidate < dist[arc.to] {
                        dist[arc.to] = candidate;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        // Nodes unreachable now stay unreachable; their potential is unused.
        dist.into_iter().map(|d| if d == INF { 0 } else { d }).collect()
    }

    fn shortest_paths(
        &self,
        source: usize,
        potential: &[i128],
    ) -> Result<(Vec<i128>, Vec<Option<(usize, usize)>>), SchedulerError> {
        let n = self.adj.len();
        let mut dist = vec![INF; n];
        let mut prev = vec![None; n];
        let mut heap = BinaryHeap::new();
        dist[source] = 0;
        heap.push(Reverse((0i128, source)));

        while let Some(Reverse((d, u))) = heap.pop() {
            if d > dist[u] {
                continue;
            }
            for (i, arc) in self.adj[u].iter().enumerate() {
                if arc.cap == 0 {
                    continue;
                }
                let reduced = arc.cost + potential[u] - potential[arc.to];
                if reduced < 0 {
                    return Err(SchedulerError::SolverContractViolation {
                        detail: format!("negative reduced cost {reduced} on arc {u} -> {}", arc.to),
                    });
                }
                let candidate = d + reduced;
                if candidate < dist[arc.to] {
                    dist[arc.to] = candidate;
                    prev[arc.to] = Some((u, i));
                    heap.push(Reverse((candidate, arc.to)));
                }
            }
        }
        Ok((dist, prev))
    }
}

pub fn solve(model: &FlowModel) -> Result<RawAssignment, SchedulerError> {
    let source = model.source();
    let sink = model.sink();
    let mut graph = Residual::new(model.node_count());

    let first_edge_arc = model.units.len();
    let mut edge_arcs = Vec::with_capacity(model.edges.len());
    for (i, arc) in model.arcs.iter().enumerate() {
        let at = graph.add_arc(arc.from, arc.to, arc.capacity, -arc.value);
        if i >= first_edge_arc && i < first_edge_arc + model.edges.len() {
            edge_arcs.push((arc.from, at));
        }
    }

    let mut potential = graph.initial_potentials(source);
    let mut augmentations = 0usize;
    let mut total_cost: i128 = 0;

    loop {
        let (dist, prev) = graph.shortest_paths(source, &potential)?;
        if dist[sink] == INF {
            break;
        }
        for (p, d) in potential.iter_mut().zip(&dist) {
            if *d != INF {
                *p += *d;
            }
        }
        let path_cost = potential[sink] - potential[source];
        if path_cost >= 0 {
            break;
        }

        let mut bottleneck = u32::MAX;
        let mut v = sink;
        while let Some((u, i)) = prev[v] {
            bottleneck = bottleneck.min(graph.adj[u][i].cap);
            v = u;
        }
        let mut v = sink;
        while let Some((u, i)) = prev[v] {
            let rev = graph.adj[u][i].rev;
            graph.adj[u][i].cap -= bottleneck;
            graph.adj[v][rev].cap += bottleneck;
            v = u;
        }

        augmentations += 1;
        total_cost += path_cost * bottleneck as i128;
        trace!("Augmentation {augmentations}: {bottleneck} unit(s) at cost {path_cost}");
    }

    let pairs: Vec<(usize, usize)> = model
        .edges
        .iter()
        .zip(&edge_arcs)
        .filter(|(_, (u, at))| graph.adj[*u][*at].cap == 0)
        .map(|(edge, _)| (edge.student, edge.slot))
        .collect();

    debug!(
        "Flow solver finished after {augmentations} augmentation(s), objective {}",
        -total_cost
    );
    Ok(RawAssignment::new(pairs, SolverMode::Flow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::data::{Slot, SlotUniverse, StudentRequest, Weekday};
    use crate::model::build_model;

    fn solve_requests(requests: &[StudentRequest], capacity: i64) -> (FlowModel, RawAssignment) {
        let config = SchedulerConfig::default().with_capacity(capacity);
        let universe = SlotUniverse::from_requests(requests);
        let caps = config.capacity.resolve(&universe, &config.grid).unwrap();
        let model = build_model(requests, &caps, &config).unwrap();
        let raw = solve(&model).unwrap();
        (model, raw)
    }

    fn slot(day: Weekday, h: u16) -> Slot {
        Slot::new(day, h * 60)
    }

    #[test]
    fn test_reroutes_to_free_space() {
        // A greedy pass giving "a" the shared slot strands "b"; the flow
        // solver moves "a" to its second choice.
        let shared = slot(Weekday::Mon, 8);
        let other = slot(Weekday::Tue, 8);
        let requests = vec![
            StudentRequest::new("a", 1).with_slots([shared, other]),
            StudentRequest::new("b", 1).with_slots([shared]),
        ];
        let (model, raw) = solve_requests(&requests, 1);
        assert_eq!(raw.pairs.len(), 2);
        let b = 1;
        let shared_idx = model.slot_index(&shared).unwrap();
        assert!(raw.pairs.contains(&(b, shared_idx)));
        assert!(raw.optimal);
    }

    #[test]
    fn test_priority_wins_contended_slot() {
        let only = slot(Weekday::Wed, 10);
        let requests = vec![
            StudentRequest::new("a", 1).with_slots([only]),
            StudentRequest::new("b", 1).with_slots([only]).with_priority(1),
        ];
        let (_, raw) = solve_requests(&requests, 1);
        assert_eq!(raw.pairs, vec![(1, 0)]);
    }

    #[test]
    fn test_fairness_spreads_scarce_capacity() {
        // Two seats; "a" wants both, "b" one. Fairness gives one to each.
        let s1 = slot(Weekday::Mon, 9);
        let s2 = slot(Weekday::Tue, 9);
        let requests = vec![
            StudentRequest::new("a", 2).with_slots([s1, s2]),
            StudentRequest::new("b", 1).with_slots([s1, s2]),
            StudentRequest::new("c", 1).with_slots([s1, s2]),
        ];
        let (_, raw) = solve_requests(&requests, 1);
        assert_eq!(raw.pairs.len(), 2);
        // Every first session is worth the same; ids decide among them.
        let students: Vec<usize> = raw.pairs.iter().map(|p| p.0).collect();
        assert_eq!(students, vec![0, 1]);
    }

    #[test]
    fn test_zero_capacity_places_nothing() {
        let requests = vec![StudentRequest::new("a", 2).with_slots([slot(Weekday::Fri, 12)])];
        let (_, raw) = solve_requests(&requests, 0);
        assert!(raw.pairs.is_empty());
    }
}
