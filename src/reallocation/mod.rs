//! Phase 3 — DynamicReallocator
//!
//! Applies an ordered event stream (node failures, new task arrivals) to an
//! existing schedule: evicts affected tasks, drops the failed node's
//! envelope, and re-places every queued task greedily on surviving nodes in
//! input order. Tracks a change-penalty equal to the number of successful
//! re-placements. Does not re-run dependency-aware placement — this is
//! best-effort local repair, not a second Phase 2 pass.

use crate::types::{Cost, DurationMap, EnvelopeMap, Node, Slot, Task};
use crate::Result;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// task_id -> (node_id, start_time)
pub type Schedule = IndexMap<String, (String, Slot)>;

/// A single event in the Phase 3 input stream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A node has failed; every task scheduled on it must be re-placed.
    NodeFailure { node_id: String },
    /// A new task has arrived and needs placement.
    NewTask { task: Task },
}

/// Phase 3 result. Serializes to the exact shape in the external-interface
/// contract, including the `UpdatedSchedule` tuple-array form (distinct from
/// Phase 2's object-with-named-fields form).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReallocationResult {
    /// task_id -> (node_id, start_time), after repair
    pub updated_schedule: Schedule,
    /// Evictions and new arrivals, in first-encounter order
    pub reassigned_tasks: Vec<String>,
    /// Tasks with no feasible placement, in first-encounter order, deduplicated
    pub failed_tasks: Vec<String>,
    /// phase1_cost + change_penalty
    pub total_cost: Cost,
    /// Count of tasks successfully (re)placed during this repair
    pub change_penalty: usize,
}

/// Owns a working copy of the schedule, task registry, and envelopes;
/// `apply` consumes one event batch and produces an updated result.
pub struct DynamicReallocator {
    tasks: IndexMap<String, Task>,
    nodes: Vec<Node>,
    schedule: Schedule,
    envelopes: EnvelopeMap,
    durations: DurationMap,
    phase1_cost: Cost,
}

impl DynamicReallocator {
    /// Construct a reallocator seeded from an existing Phase 1/2 result.
    /// Envelopes are deep-copied; the caller's map is never mutated.
    pub fn new(
        tasks: Vec<Task>,
        nodes: Vec<Node>,
        schedule: Schedule,
        envelopes: &EnvelopeMap,
        durations: DurationMap,
        phase1_cost: Cost,
    ) -> Self {
        let tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks,
            nodes,
            schedule,
            envelopes: envelopes.clone(),
            durations,
            phase1_cost,
        }
    }

    /// Apply an ordered batch of events and re-place every affected task.
    #[instrument(skip(self, events), fields(events = events.len()))]
    pub fn apply(&mut self, events: &[Event]) -> Result<ReallocationResult> {
        let mut reassigned = Vec::new();
        let mut reassigned_seen = IndexSet::new();
        let mut queue = Vec::new();

        for event in events {
            match event {
                Event::NodeFailure { node_id } => {
                    self.envelopes.shift_remove(node_id);
                    let evicted: Vec<String> = self
                        .schedule
                        .iter()
                        .filter(|(_, (node, _))| node == node_id)
                        .map(|(task_id, _)| task_id.clone())
                        .collect();
                    tracing::info!(%node_id, evicted = evicted.len(), "node failure");
                    for task_id in evicted {
                        self.schedule.shift_remove(&task_id);
                        if reassigned_seen.insert(task_id.clone()) {
                            reassigned.push(task_id.clone());
                        }
                        queue.push(task_id);
                    }
                }
                Event::NewTask { task } => {
                    let task_id = task.id.clone();
                    self.tasks.insert(task_id.clone(), task.clone());
                    if reassigned_seen.insert(task_id.clone()) {
                        reassigned.push(task_id.clone());
                    }
                    queue.push(task_id);
                }
            }
        }

        let mut change_penalty = 0usize;
        let mut failed = Vec::new();
        let mut failed_seen = IndexSet::new();

        for task_id in &queue {
            let Some(task) = self.tasks.get(task_id).cloned() else {
                continue;
            };
            let duration = self.durations.duration_of(task_id);
            let latest_start = task.deadline - duration;

            let mut placement = None;
            for node in &self.nodes {
                let Some(envelope) = self.envelopes.get(&node.id) else {
                    continue;
                };
                let mut start = 0;
                let mut found = None;
                while start <= latest_start {
                    if envelope.can_fit(start, duration, &task) {
                        found = Some(start);
                        break;
                    }
                    start += 1;
                }
                if let Some(start) = found {
                    placement = Some((node.id.clone(), start));
                    break;
                }
            }

            match placement {
                Some((node_id, start)) => {
                    let envelope = self
                        .envelopes
                        .get_mut(&node_id)
                        .expect("node just selected above must still have an envelope");
                    envelope.commit(start, duration, &task)?;
                    self.schedule.insert(task_id.clone(), (node_id, start));
                    change_penalty += 1;
                }
                None => {
                    tracing::warn!(task = %task_id, "no surviving node admits this task");
                    if failed_seen.insert(task_id.clone()) {
                        failed.push(task_id.clone());
                    }
                }
            }
        }

        let total_cost = self.phase1_cost + change_penalty as Cost;

        Ok(ReallocationResult {
            updated_schedule: self.schedule.clone(),
            reassigned_tasks: reassigned,
            failed_tasks: failed,
            total_cost,
            change_penalty,
        })
    }
}
