//! Phase 1 — Allocator
//!
//! Builds a flow network from `(tasks, nodes, cost_matrix, per-node
//! concurrency)` and drives [`MCMFSolver`] to extract a task -> node
//! assignment minimizing total cost, subject to per-node slot capacity.
//!
//! Vertex layout: `0` = source, `1..=T` = tasks, `T+1..=T+N` = nodes,
//! `T+N+1` = sink.

use crate::graph::{FlowGraph, MCMFSolver};
use crate::types::{Assignment, Cost};
use crate::{CostMatrix, Error, Node, PlannerParams, Result, SolverStats, Task};
use serde::Serialize;
use tracing::instrument;

/// Phase 1 allocation result.
///
/// Serializes to the exact shape in the external-interface contract:
/// `{ "assignments": {...}, "total_cost": N, "assigned_count": N }`.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationResult {
    /// task_id -> node_id for every task the flow solve could place
    pub assignments: Assignment,
    /// Total cost of the assignment
    pub total_cost: Cost,
    /// Number of tasks assigned (flow < task count means some are unassigned)
    pub assigned_count: usize,
    /// Solver statistics; ambient observability, not part of the wire contract
    #[serde(skip)]
    pub stats: SolverStats,
}

/// Builds and solves the Phase 1 flow network. Reusable across solves: the
/// topology is fixed at construction, and `solve` resets flows each call.
pub struct Allocator {
    tasks: Vec<Task>,
    nodes: Vec<Node>,
    graph: FlowGraph,
    source: usize,
    sink: usize,
    /// For each task, the (node_index, edge_index) pairs reachable from it.
    task_edges: Vec<Vec<(usize, usize)>>,
    params: PlannerParams,
}

impl Allocator {
    /// Construct the flow network for `(tasks, nodes, costs)`, with no cap on
    /// the underlying MCMF solver's iteration count.
    pub fn new(tasks: Vec<Task>, nodes: Vec<Node>, costs: &CostMatrix) -> Result<Self> {
        Self::with_params(tasks, nodes, costs, PlannerParams::default())
    }

    /// Construct the flow network, honoring `params.iteration_limit` as a
    /// safety bound on the MCMF solve.
    pub fn with_params(
        tasks: Vec<Task>,
        nodes: Vec<Node>,
        costs: &CostMatrix,
        params: PlannerParams,
    ) -> Result<Self> {
        for task in &tasks {
            if task.cpu < 0 || task.ram < 0 {
                return Err(Error::invalid_input(format!(
                    "task {} has negative resource requirement",
                    task.id
                )));
            }
        }
        for node in &nodes {
            if node.cpu_capacity < 0 || node.ram_capacity < 0 {
                return Err(Error::invalid_input(format!(
                    "node {} has negative capacity",
                    node.id
                )));
            }
        }
        costs.validate(tasks.len(), nodes.len())?;

        let t = tasks.len();
        let n = nodes.len();
        let source = 0;
        let sink = t + n + 1;
        let mut graph = FlowGraph::new(t + n + 2);

        for i in 0..t {
            graph.add_edge(source, 1 + i, 1, 0);
        }

        let mut task_edges: Vec<Vec<(usize, usize)>> = vec![Vec::new(); t];
        let mut feasible_tasks_per_node: Vec<Vec<usize>> = vec![Vec::new(); n];

        for i in 0..t {
            for j in 0..n {
                let Some(cost) = costs.get(i, j) else {
                    continue;
                };
                if !nodes[j].can_host(&tasks[i]) {
                    continue;
                }
                let task_vertex = 1 + i;
                let node_vertex = 1 + t + j;
                let edge_idx = graph.add_edge(task_vertex, node_vertex, 1, cost);
                task_edges[i].push((j, edge_idx));
                feasible_tasks_per_node[j].push(i);
            }
        }

        for j in 0..n {
            let feasible = &feasible_tasks_per_node[j];
            if feasible.is_empty() {
                continue;
            }
            let min_cpu = feasible.iter().map(|&i| tasks[i].cpu).min().unwrap_or(0);
            let min_ram = feasible.iter().map(|&i| tasks[i].ram).min().unwrap_or(0);
            let cpu_bound = nodes[j].cpu_capacity / min_cpu.max(1);
            let ram_bound = nodes[j].ram_capacity / min_ram.max(1);
            let resource_bound = cpu_bound.min(ram_bound);
            let capacity = (nodes[j].slots as i64).min(resource_bound.max(0));
            let node_vertex = 1 + t + j;
            graph.add_edge(node_vertex, sink, capacity, 0);
        }

        Ok(Self {
            tasks,
            nodes,
            graph,
            source,
            sink,
            task_edges,
            params,
        })
    }

    /// Reset flows and re-solve. Calling `solve` twice on the same allocator
    /// with no other mutation returns an identical result.
    #[instrument(skip(self), fields(tasks = self.tasks.len(), nodes = self.nodes.len()))]
    pub fn solve(&mut self) -> Result<AllocationResult> {
        self.graph.reset_flows();
        let solver = MCMFSolver::with_params(self.source, self.sink, &self.params);
        let flow_result = solver.solve(&mut self.graph)?;

        let mut assignments = Assignment::new();
        for (i, task) in self.tasks.iter().enumerate() {
            if let Some(&(node_idx, _)) = self.task_edges[i]
                .iter()
                .find(|&&(_, edge_idx)| self.graph.edge(edge_idx).flow > 0)
            {
                assignments.insert(task.id.clone(), self.nodes[node_idx].id.clone());
            }
        }

        if assignments.len() as i64 != flow_result.flow {
            tracing::warn!(
                assigned = assignments.len(),
                flow = flow_result.flow,
                "assignment count does not match solved flow"
            );
        }

        let assigned_count = assignments.len();
        Ok(AllocationResult {
            assignments,
            total_cost: flow_result.cost,
            assigned_count,
            stats: flow_result.stats,
        })
    }
}
