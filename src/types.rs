//! Shared data model: tasks, nodes, cost matrices, dependencies, and the
//! per-node resource envelope every scheduling phase reads and mutates.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// Cost type for optimization problems (signed to allow negative reverse-edge costs)
pub type Cost = i64;

/// Time-slot index; discrete and contiguous within a task's duration
pub type Slot = i64;

/// A unit of computational work with resource demands and a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: String,
    /// CPU requirement
    pub cpu: i64,
    /// RAM requirement
    pub ram: i64,
    /// Deadline: exclusive upper bound on `start + duration`
    pub deadline: i64,
}

impl Task {
    /// Create a new task
    pub fn new(id: impl Into<String>, cpu: i64, ram: i64, deadline: i64) -> Self {
        Self {
            id: id.into(),
            cpu,
            ram,
            deadline,
        }
    }
}

/// A host with CPU/RAM capacity and a concurrency slot count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier
    pub id: String,
    /// CPU capacity
    pub cpu_capacity: i64,
    /// RAM capacity
    pub ram_capacity: i64,
    /// Maximum concurrent tasks admitted in Phase 1
    pub slots: usize,
}

impl Node {
    /// Create a new node
    pub fn new(id: impl Into<String>, cpu_capacity: i64, ram_capacity: i64, slots: usize) -> Self {
        Self {
            id: id.into(),
            cpu_capacity,
            ram_capacity,
            slots,
        }
    }

    /// Whether this node can individually run a task (ignoring concurrency)
    pub fn can_host(&self, task: &Task) -> bool {
        task.cpu <= self.cpu_capacity && task.ram <= self.ram_capacity
    }
}

/// Dense (task_index, node_index) -> cost mapping. `None` marks an
/// infeasible pair rather than overloading a numeric sentinel.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    rows: Vec<Vec<Option<Cost>>>,
}

impl CostMatrix {
    /// Build directly from a matrix of optional costs
    pub fn new(rows: Vec<Vec<Option<Cost>>>) -> Self {
        Self { rows }
    }

    /// Build from a raw integer matrix, treating `sentinel` as "infeasible"
    pub fn from_dense_with_sentinel(rows: Vec<Vec<Cost>>, sentinel: Cost) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|c| if c == sentinel { None } else { Some(c) })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Number of task rows
    pub fn num_tasks(&self) -> usize {
        self.rows.len()
    }

    /// Number of node columns, taken from the first row (0 if empty)
    pub fn num_nodes(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Cost of assigning `task_index` to `node_index`, or `None` if infeasible
    pub fn get(&self, task_index: usize, node_index: usize) -> Option<Cost> {
        self.rows.get(task_index).and_then(|row| row.get(node_index)).copied().flatten()
    }

    /// Validate rectangular shape against expected task/node counts
    pub fn validate(&self, num_tasks: usize, num_nodes: usize) -> Result<()> {
        if self.rows.len() != num_tasks {
            return Err(Error::dimension_mismatch(num_tasks, self.rows.len()));
        }
        for row in &self.rows {
            if row.len() != num_nodes {
                return Err(Error::dimension_mismatch(num_nodes, row.len()));
            }
        }
        Ok(())
    }
}

/// task_id -> positive duration in time slots. Missing entries default to 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DurationMap(pub HashMap<String, i64>);

impl DurationMap {
    /// Create an empty duration map (every task defaults to duration 1)
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Duration for a task, defaulting to 1 if absent
    pub fn duration_of(&self, task_id: &str) -> i64 {
        self.0.get(task_id).copied().unwrap_or(1)
    }

    /// Insert or override a task's duration
    pub fn insert(&mut self, task_id: impl Into<String>, duration: i64) {
        self.0.insert(task_id.into(), duration);
    }
}

impl FromIterator<(String, i64)> for DurationMap {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ordered pair (before_id, after_id); the set of all dependencies forms a
/// DAG over scheduled tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Task that must finish first
    pub before: String,
    /// Task that must start no earlier than `before` finishes
    pub after: String,
}

impl Dependency {
    /// Create a new dependency edge
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// task_id -> node_id, total over scheduled tasks
pub type Assignment = IndexMap<String, String>;

/// Per-node, per-slot remaining CPU and (optionally) remaining RAM.
///
/// Owned exclusively by whichever scheduler is executing; callers' envelopes
/// are deep-copied on ingestion so caller state is never perturbed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceEnvelope {
    /// slot -> remaining cpu
    pub cpu: IndexMap<Slot, i64>,
    /// slot -> remaining ram; `None` when RAM is not tracked for this envelope
    pub ram: Option<IndexMap<Slot, i64>>,
}

impl ResourceEnvelope {
    /// Build a uniform envelope: every slot in `slots` starts with the same
    /// cpu/ram budget.
    pub fn uniform(slots: &[Slot], cpu: i64, ram: Option<i64>) -> Self {
        let cpu_map = slots.iter().map(|&s| (s, cpu)).collect();
        let ram_map = ram.map(|r| slots.iter().map(|&s| (s, r)).collect());
        Self {
            cpu: cpu_map,
            ram: ram_map,
        }
    }

    /// Whether every slot in `[start, start+duration)` exists and has enough
    /// remaining cpu (and ram, if tracked) for `task`.
    pub fn can_fit(&self, start: Slot, duration: i64, task: &Task) -> bool {
        for offset in 0..duration {
            let slot = start + offset;
            match self.cpu.get(&slot) {
                Some(&remaining) if remaining >= task.cpu => {}
                _ => return false,
            }
            if let Some(ram_map) = &self.ram {
                match ram_map.get(&slot) {
                    Some(&remaining) if remaining >= task.ram => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Decrement cpu (and ram, if tracked) over `[start, start+duration)` by
    /// `task`'s demand. Panics-free: a correct caller never calls this on a
    /// window `can_fit` rejected, so underflow here indicates a solver bug.
    pub fn commit(&mut self, start: Slot, duration: i64, task: &Task) -> Result<()> {
        for offset in 0..duration {
            let slot = start + offset;
            let cpu_remaining = self
                .cpu
                .get_mut(&slot)
                .ok_or_else(|| Error::internal(format!("missing cpu envelope slot {slot}")))?;
            if *cpu_remaining < task.cpu {
                return Err(Error::internal(format!("cpu envelope underflow at slot {slot}")));
            }
            *cpu_remaining -= task.cpu;

            if let Some(ram_map) = &mut self.ram {
                let ram_remaining = ram_map
                    .get_mut(&slot)
                    .ok_or_else(|| Error::internal(format!("missing ram envelope slot {slot}")))?;
                if *ram_remaining < task.ram {
                    return Err(Error::internal(format!("ram envelope underflow at slot {slot}")));
                }
                *ram_remaining -= task.ram;
            }
        }
        Ok(())
    }
}

/// node_id -> that node's resource envelope
pub type EnvelopeMap = IndexMap<String, ResourceEnvelope>;

/// Statistics from a solver run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverStats {
    /// Time spent solving (seconds)
    pub solve_time_seconds: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Best objective value found
    pub objective_value: Option<f64>,
}

/// Planner-wide tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerParams {
    /// Safety bound on [`crate::MCMFSolver`]'s successive-shortest-path loop
    /// (0 = unlimited). Exceeding it surfaces as `Error::Internal` instead of
    /// looping forever on a pathological or malformed flow network.
    pub iteration_limit: usize,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self { iteration_limit: 0 }
    }
}
