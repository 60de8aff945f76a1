//! Phase 4 — LocalScheduler
//!
//! Per-node, single-resource (CPU) timeline placement. Tasks are ordered
//! earliest-deadline-first; each is placed at the first window its node's
//! CPU envelope admits. A task that cannot be placed at all, or that is
//! placed but finishes after its deadline, counts against the penalty.

use crate::types::Slot;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use tracing::instrument;

/// A task local to one node, as Phase 4 sees it.
#[derive(Debug, Clone, Serialize)]
pub struct LocalTask {
    /// Task identifier
    pub id: String,
    /// CPU requirement (the only resource this phase tracks)
    pub cpu: i64,
    /// RAM requirement, carried through for parity with the rest of the
    /// data model; this single-resource planner does not schedule on it
    pub ram: i64,
    /// Duration in time slots
    pub duration: i64,
    /// Deadline: exclusive upper bound on `start + duration`
    pub deadline: i64,
}

/// Per-task execution outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalExecutionInfo {
    /// Chosen start time, or `None` if no window fit
    pub start_time: Option<Slot>,
    /// Whether the task (if placed) finishes by its deadline
    pub meets_deadline: bool,
}

/// Phase 4 result. Serializes to
/// `{ "ExecutionSchedule": {...}, "TotalIdleTime": N, "PenaltyCost": N }`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalScheduleResult {
    /// task_id -> execution outcome, in deadline order
    pub execution_schedule: IndexMap<String, LocalExecutionInfo>,
    /// Sum of remaining cpu across all slots after placement
    pub total_idle_time: i64,
    /// Count of tasks that either could not be placed or missed their deadline
    pub penalty_cost: usize,
}

/// Phase 4 entry point. Stateless: every call is a fresh solve.
pub struct LocalScheduler;

impl LocalScheduler {
    /// Plan a single node's execution timeline.
    #[instrument(skip_all, fields(%node_id, tasks = tasks.len()))]
    pub fn solve(
        node_id: &str,
        tasks: &[LocalTask],
        cpu_envelope: &IndexMap<Slot, i64>,
        allowed_slots: &[Slot],
    ) -> LocalScheduleResult {
        let _ = node_id;
        let allowed: HashSet<Slot> = allowed_slots.iter().copied().collect();
        let max_slot = allowed_slots.iter().copied().max().unwrap_or(0);

        let mut envelope = cpu_envelope.clone();
        let mut ordered: Vec<&LocalTask> = tasks.iter().collect();
        ordered.sort_by_key(|t| t.deadline);

        let mut execution_schedule = IndexMap::new();
        let mut penalty_cost = 0usize;

        for task in ordered {
            let mut placed: Option<Slot> = None;
            let mut s = 0;
            while s + task.duration <= max_slot + 1 {
                let window_ok = (s..s + task.duration).all(|slot| {
                    allowed.contains(&slot) && envelope.get(&slot).copied().unwrap_or(0) >= task.cpu
                });
                if window_ok {
                    placed = Some(s);
                    break;
                }
                s += 1;
            }

            match placed {
                Some(start) => {
                    for slot in start..start + task.duration {
                        if let Some(remaining) = envelope.get_mut(&slot) {
                            *remaining -= task.cpu;
                        }
                    }
                    let meets_deadline = start + task.duration <= task.deadline;
                    if !meets_deadline {
                        penalty_cost += 1;
                        tracing::warn!(task = %task.id, start, deadline = task.deadline, "placed but misses deadline");
                    }
                    execution_schedule.insert(
                        task.id.clone(),
                        LocalExecutionInfo { start_time: Some(start), meets_deadline },
                    );
                }
                None => {
                    penalty_cost += 1;
                    tracing::warn!(task = %task.id, "no window admits this task");
                    execution_schedule.insert(
                        task.id.clone(),
                        LocalExecutionInfo { start_time: None, meets_deadline: false },
                    );
                }
            }
        }

        let total_idle_time: i64 = envelope.values().sum();

        LocalScheduleResult {
            execution_schedule,
            total_idle_time,
            penalty_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_envelope(slots: &[Slot], cpu: i64) -> IndexMap<Slot, i64> {
        slots.iter().map(|&s| (s, cpu)).collect()
    }

    #[test]
    fn places_tasks_edf_and_tracks_idle() {
        let tasks = vec![
            LocalTask { id: "late".into(), cpu: 2, ram: 1, duration: 1, deadline: 5 },
            LocalTask { id: "urgent".into(), cpu: 2, ram: 1, duration: 1, deadline: 1 },
        ];
        let slots: Vec<Slot> = (0..5).collect();
        let envelope = uniform_envelope(&slots, 2);

        let result = LocalScheduler::solve("N1", &tasks, &envelope, &slots);

        assert_eq!(result.execution_schedule["urgent"].start_time, Some(0));
        assert!(result.execution_schedule["urgent"].meets_deadline);
        assert_eq!(result.execution_schedule["late"].start_time, Some(1));
        assert_eq!(result.penalty_cost, 0);
        // 10 total cpu-slots, minus 2 for "urgent" at slot 0 and 2 for "late" at slot 1
        assert_eq!(result.total_idle_time, 10 - 2 - 2);
    }

    #[test]
    fn no_window_increments_penalty() {
        let tasks = vec![LocalTask { id: "big".into(), cpu: 10, ram: 1, duration: 1, deadline: 3 }];
        let slots: Vec<Slot> = (0..3).collect();
        let envelope = uniform_envelope(&slots, 2);

        let result = LocalScheduler::solve("N1", &tasks, &envelope, &slots);
        assert_eq!(result.execution_schedule["big"].start_time, None);
        assert!(!result.execution_schedule["big"].meets_deadline);
        assert_eq!(result.penalty_cost, 1);
    }

    #[test]
    fn placed_but_late_still_penalized() {
        // duration 3 only fits starting at slot 0, which finishes at slot 3 —
        // past the deadline of 2, so it is placed but still penalized.
        let tasks = vec![LocalTask { id: "first".into(), cpu: 2, ram: 1, duration: 3, deadline: 2 }];
        let slots: Vec<Slot> = (0..5).collect();
        let envelope = uniform_envelope(&slots, 2);

        let result = LocalScheduler::solve("N1", &tasks, &envelope, &slots);
        assert_eq!(result.execution_schedule["first"].start_time, Some(0));
        assert!(!result.execution_schedule["first"].meets_deadline);
        assert_eq!(result.penalty_cost, 1);
    }
}
