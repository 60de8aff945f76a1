//! Residual flow network and a min-cost max-flow solver.
//!
//! [`FlowGraph`] stores edges in a flat arena and pairs every forward edge with
//! a reverse edge of zero capacity, so augmenting paths can push flow back
//! through the residual graph without any cyclic ownership. [`MCMFSolver`]
//! drives successive shortest paths over that residual graph using
//! Bellman-Ford, which tolerates the negative costs reverse edges carry.

use crate::{Cost, Error, PlannerParams, Result, SolverStats};
use std::time::Instant;

/// A single edge in the residual graph.
///
/// Forward and reverse edges are paired via `reverse`: for any edge `e`,
/// `edges[e.reverse].reverse == index of e`, and `e.flow + edges[e.reverse].flow == 0`.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    /// Source vertex.
    pub from: usize,
    /// Target vertex.
    pub to: usize,
    /// Capacity of this edge.
    pub capacity: i64,
    /// Cost per unit of flow.
    pub cost: i64,
    /// Flow currently pushed along this edge.
    pub flow: i64,
    /// Index of the paired reverse edge in the same arena.
    pub reverse: usize,
}

impl Edge {
    /// Remaining capacity available for augmentation.
    pub fn residual_capacity(&self) -> i64 {
        self.capacity - self.flow
    }
}

/// Directed multigraph with paired forward/reverse edges supporting
/// residual-capacity operations.
///
/// Vertices are dense indices `0..num_vertices`. Built once per solve and
/// reusable across repeated solves via [`FlowGraph::reset_flows`].
#[derive(Debug, Clone)]
pub struct FlowGraph {
    num_vertices: usize,
    adj: Vec<Vec<usize>>,
    edges: Vec<Edge>,
}

impl FlowGraph {
    /// Create an empty graph over `num_vertices` vertices.
    pub fn new(num_vertices: usize) -> Self {
        Self {
            num_vertices,
            adj: vec![Vec::new(); num_vertices],
            edges: Vec::new(),
        }
    }

    /// Number of vertices in the graph.
    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Number of edges currently in the arena (forward and reverse).
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Edge indices leaving `v`, in insertion order.
    pub fn outgoing(&self, v: usize) -> &[usize] {
        &self.adj[v]
    }

    /// Read-only view of an edge by arena index.
    pub fn edge(&self, idx: usize) -> &Edge {
        &self.edges[idx]
    }

    /// Append a forward edge `from -> to` plus its paired zero-capacity,
    /// negative-cost reverse edge. Returns the index of the forward edge.
    ///
    /// Self-loops (`from == to`) are never added by callers in this crate,
    /// but are not special-cased here since the bookkeeping is harmless.
    pub fn add_edge(&mut self, from: usize, to: usize, capacity: i64, cost: i64) -> usize {
        let forward_idx = self.edges.len();
        let reverse_idx = forward_idx + 1;

        self.edges.push(Edge {
            from,
            to,
            capacity,
            cost,
            flow: 0,
            reverse: reverse_idx,
        });
        self.adj[from].push(forward_idx);

        self.edges.push(Edge {
            from: to,
            to: from,
            capacity: 0,
            cost: -cost,
            flow: 0,
            reverse: forward_idx,
        });
        self.adj[to].push(reverse_idx);

        forward_idx
    }

    /// Push `amount` of flow along edge `idx`, keeping the paired reverse
    /// edge's flow at `-amount` so `e.flow + e.reverse.flow == 0` holds.
    fn add_flow(&mut self, idx: usize, amount: i64) {
        self.edges[idx].flow += amount;
        let rev = self.edges[idx].reverse;
        self.edges[rev].flow -= amount;
    }

    /// Zero every edge's flow without touching topology. Makes a `FlowGraph`
    /// safe to solve repeatedly.
    pub fn reset_flows(&mut self) {
        for edge in &mut self.edges {
            edge.flow = 0;
        }
    }
}

/// Result of a min-cost max-flow solve.
#[derive(Debug, Clone)]
pub struct MinCostMaxFlowResult {
    /// Total flow pushed from source to sink.
    pub flow: i64,
    /// Total cost of that flow.
    pub cost: Cost,
    /// Solver statistics (iterations, wall time).
    pub stats: SolverStats,
}

/// Computes min-cost max-flow on a [`FlowGraph`] via successive shortest
/// paths, using Bellman-Ford for shortest-path discovery so that negative
/// residual costs (from reverse edges) are handled correctly.
#[derive(Debug, Clone, Copy)]
pub struct MCMFSolver {
    source: usize,
    sink: usize,
    iteration_limit: usize,
}

impl MCMFSolver {
    /// Create a solver for the given source and sink vertices, with no cap on
    /// the number of successive-shortest-path iterations.
    pub fn new(source: usize, sink: usize) -> Self {
        Self { source, sink, iteration_limit: 0 }
    }

    /// Create a solver honoring `params.iteration_limit` as a safety bound on
    /// the successive-shortest-path loop.
    pub fn with_params(source: usize, sink: usize, params: &PlannerParams) -> Self {
        Self {
            source,
            sink,
            iteration_limit: params.iteration_limit,
        }
    }

    /// Run successive shortest paths until the sink is unreachable in the
    /// residual graph, then return the accumulated flow and cost.
    ///
    /// Does not reset flows itself; callers that want a clean solve call
    /// [`FlowGraph::reset_flows`] first (the Allocator does this at the top
    /// of every `solve`, which is what makes repeated solves idempotent).
    pub fn solve(&self, graph: &mut FlowGraph) -> Result<MinCostMaxFlowResult> {
        if self.source >= graph.num_vertices() || self.sink >= graph.num_vertices() {
            return Err(Error::invalid_input("source or sink out of range"));
        }

        let start = Instant::now();
        let mut total_flow: i64 = 0;
        let mut total_cost: Cost = 0;
        let mut iterations = 0usize;

        loop {
            iterations += 1;
            if self.iteration_limit != 0 && iterations > self.iteration_limit {
                return Err(Error::internal(format!(
                    "MCMF exceeded iteration_limit={} without reaching max flow",
                    self.iteration_limit
                )));
            }
            let Some((path, _path_cost)) = self.bellman_ford_path(graph)? else {
                break;
            };

            let amount = path
                .iter()
                .map(|&e| graph.edge(e).residual_capacity())
                .min()
                .unwrap_or(0);

            if amount <= 0 {
                break;
            }

            for &edge_idx in &path {
                let edge_cost = graph.edge(edge_idx).cost;
                graph.add_flow(edge_idx, amount);
                total_cost += (amount as i128 * edge_cost as i128) as Cost;
            }
            total_flow += amount;
        }

        Ok(MinCostMaxFlowResult {
            flow: total_flow,
            cost: total_cost,
            stats: SolverStats {
                solve_time_seconds: start.elapsed().as_secs_f64(),
                iterations,
                objective_value: Some(total_cost as f64),
                ..Default::default()
            },
        })
    }

    /// Bellman-Ford shortest path from source to sink over edges with
    /// positive residual capacity. At most `V-1` relaxation passes, stopping
    /// early once a pass makes no improvement. Returns the augmenting path as
    /// a list of edge indices plus its total cost, or `None` if the sink is
    /// unreachable.
    fn bellman_ford_path(&self, graph: &FlowGraph) -> Result<Option<(Vec<usize>, Cost)>> {
        let n = graph.num_vertices();
        let mut dist = vec![i64::MAX; n];
        let mut pred_edge: Vec<Option<usize>> = vec![None; n];
        dist[self.source] = 0;

        for _ in 0..n.saturating_sub(1) {
            let mut changed = false;
            for u in 0..n {
                if dist[u] == i64::MAX {
                    continue;
                }
                for &edge_idx in graph.outgoing(u) {
                    let edge = graph.edge(edge_idx);
                    if edge.residual_capacity() <= 0 {
                        continue;
                    }
                    let candidate = (dist[u] as i128 + edge.cost as i128) as i64;
                    if candidate < dist[edge.to] {
                        dist[edge.to] = candidate;
                        pred_edge[edge.to] = Some(edge_idx);
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        if dist[self.sink] == i64::MAX {
            return Ok(None);
        }

        let mut path = Vec::new();
        let mut current = self.sink;
        while current != self.source {
            let Some(edge_idx) = pred_edge[current] else {
                return Err(Error::internal(
                    "broken predecessor chain during path reconstruction",
                ));
            };
            path.push(edge_idx);
            current = graph.edge(edge_idx).from;
        }
        path.reverse();

        Ok(Some((path, dist[self.sink])))
    }
}
