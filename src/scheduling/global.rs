//! Phase 2 — GlobalScheduler
//!
//! Dependency-aware list scheduling: repeatedly picks the ready task (all
//! predecessors finished) with the earliest feasible start, places it at the
//! first window its node's envelope admits, and repeats until every task is
//! placed or the pass gets stuck.

use crate::types::{Assignment, Cost, Dependency, DurationMap, EnvelopeMap, Slot, Task};
use crate::Node;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

/// One task's placement in the schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    /// Node the task runs on (passed through from the Phase 1 assignment)
    pub node: String,
    /// Chosen start time
    pub start_time: Slot,
}

/// Phase 2 result. Serializes to
/// `{ "schedule": {...}, "valid": bool, "total_cost": N, "reason": string|null }`.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResult {
    /// task_id -> placement, in commit order. Empty when `valid` is false.
    pub schedule: IndexMap<String, ScheduleEntry>,
    /// Whether every task was placed
    pub valid: bool,
    /// Phase 1 cost, passed through unchanged
    pub total_cost: Cost,
    /// First failure reason encountered, if any
    pub reason: Option<String>,
}

impl ScheduleResult {
    fn failure(phase1_cost: Cost, reason: impl Into<String>) -> Self {
        Self {
            schedule: IndexMap::new(),
            valid: false,
            total_cost: phase1_cost,
            reason: Some(reason.into()),
        }
    }
}

/// Phase 2 entry point. Stateless: every call is a fresh solve over its inputs.
pub struct GlobalScheduler;

impl GlobalScheduler {
    /// Place every task named in `assignment` at a start time respecting
    /// dependencies, the allowed time slots, and the per-node envelopes.
    ///
    /// `envelopes` and the tasks/nodes/assignment/durations are read-only
    /// inputs; the envelopes are deep-copied internally so callers keep their
    /// own copy untouched (see `ResourceEnvelope`'s non-mutation contract).
    #[instrument(skip_all, fields(tasks = tasks.len(), nodes = nodes.len()))]
    pub fn solve(
        tasks: &[Task],
        nodes: &[Node],
        assignment: &Assignment,
        allowed_slots: &[Slot],
        envelopes: &EnvelopeMap,
        durations: &DurationMap,
        dependencies: &[Dependency],
        phase1_cost: Cost,
    ) -> ScheduleResult {
        let task_by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let node_by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        for (task_id, node_id) in assignment {
            if !task_by_id.contains_key(task_id.as_str()) {
                return ScheduleResult::failure(
                    phase1_cost,
                    format!("unknown task in assignment: {task_id}"),
                );
            }
            if !node_by_id.contains_key(node_id.as_str()) {
                return ScheduleResult::failure(
                    phase1_cost,
                    format!("unknown node in assignment: {node_id}"),
                );
            }
        }

        // Dependencies form a DAG over assigned (scheduled) tasks; an
        // endpoint that was never assigned is a structural error here, not a
        // silently-ignored edge.
        let mut seen_deps: HashSet<(String, String)> = HashSet::new();
        let mut preds: HashMap<String, Vec<String>> = HashMap::new();
        let mut succs: HashMap<String, Vec<String>> = HashMap::new();
        let mut in_degree: IndexMap<String, usize> = IndexMap::new();
        for task in tasks {
            if assignment.contains_key(&task.id) {
                in_degree.insert(task.id.clone(), 0);
            }
        }

        for dep in dependencies {
            if !in_degree.contains_key(&dep.before) {
                return ScheduleResult::failure(
                    phase1_cost,
                    format!("unknown task in dependency: {}", dep.before),
                );
            }
            if !in_degree.contains_key(&dep.after) {
                return ScheduleResult::failure(
                    phase1_cost,
                    format!("unknown task in dependency: {}", dep.after),
                );
            }
            if !seen_deps.insert((dep.before.clone(), dep.after.clone())) {
                continue;
            }
            succs.entry(dep.before.clone()).or_default().push(dep.after.clone());
            preds.entry(dep.after.clone()).or_default().push(dep.before.clone());
            *in_degree.get_mut(&dep.after).expect("validated above") += 1;
        }

        let allowed: HashSet<Slot> = allowed_slots.iter().copied().collect();
        let mut working_envelopes = envelopes.clone();
        let mut schedule: IndexMap<String, ScheduleEntry> = IndexMap::new();
        let mut finish: HashMap<String, Slot> = HashMap::new();
        let mut remaining = in_degree;

        while !remaining.is_empty() {
            let ready: Vec<String> = remaining
                .iter()
                .filter(|&(_, &deg)| deg == 0)
                .map(|(id, _)| id.clone())
                .collect();

            if ready.is_empty() {
                let stuck: Vec<&str> = remaining.keys().map(String::as_str).collect();
                return ScheduleResult::failure(
                    phase1_cost,
                    format!("dependency cycle among: {}", stuck.join(", ")),
                );
            }

            let mut candidates: Vec<(String, Slot, i64, i64)> = Vec::new(); // (task_id, start, deadline, cpu)
            let mut blocked: Vec<String> = Vec::new();

            for task_id in &ready {
                let task = task_by_id[task_id.as_str()];
                let node_id = &assignment[task_id];
                let duration = durations.duration_of(task_id);
                let est = preds
                    .get(task_id)
                    .map(|ps| ps.iter().map(|p| finish[p]).max().unwrap_or(0))
                    .unwrap_or(0);
                let latest_start = task.deadline - duration;

                if latest_start < est {
                    blocked.push(format!("{task_id}(est={est}, latest_start={latest_start})"));
                    continue;
                }

                let Some(env) = working_envelopes.get(node_id) else {
                    blocked.push(format!("{task_id}(no envelope for node {node_id})"));
                    continue;
                };

                let mut chosen_start = None;
                let mut s = est;
                while s <= latest_start {
                    let window_allowed = (s..s + duration).all(|slot| allowed.contains(&slot));
                    if window_allowed && env.can_fit(s, duration, task) {
                        chosen_start = Some(s);
                        break;
                    }
                    s += 1;
                }

                match chosen_start {
                    Some(start) => candidates.push((task_id.clone(), start, task.deadline, task.cpu)),
                    None => blocked.push(format!("{task_id}(est={est}, latest_start={latest_start})")),
                }
            }

            if candidates.is_empty() {
                return ScheduleResult::failure(
                    phase1_cost,
                    format!("no feasible placement for: {}", blocked.join(", ")),
                );
            }

            candidates.sort_by(|a, b| {
                a.1.cmp(&b.1) // earliest_feasible_start ascending
                    .then(a.2.cmp(&b.2)) // deadline ascending
                    .then(b.3.cmp(&a.3)) // cpu descending
                    .then(a.0.cmp(&b.0)) // stable final tie-break
            });
            let (task_id, start, _, _) = candidates.into_iter().next().unwrap();

            let task = task_by_id[task_id.as_str()];
            let node_id = assignment[&task_id].clone();
            let duration = durations.duration_of(&task_id);
            let env = working_envelopes
                .get_mut(&node_id)
                .expect("checked present above");
            if let Err(e) = env.commit(start, duration, task) {
                return ScheduleResult::failure(phase1_cost, e.to_string());
            }

            finish.insert(task_id.clone(), start + duration);
            schedule.insert(task_id.clone(), ScheduleEntry { node: node_id, start_time: start });
            remaining.shift_remove(&task_id);
            if let Some(succ_list) = succs.get(&task_id) {
                for succ in succ_list {
                    if let Some(d) = remaining.get_mut(succ) {
                        *d -= 1;
                    }
                }
            }
        }

        ScheduleResult {
            schedule,
            valid: true,
            total_cost: phase1_cost,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceEnvelope;
    use proptest::prelude::*;

    fn uniform_envelopes(node_ids: &[&str], slots: &[Slot], cpu: i64, ram: Option<i64>) -> EnvelopeMap {
        let mut map = EnvelopeMap::new();
        for id in node_ids {
            map.insert(id.to_string(), ResourceEnvelope::uniform(slots, cpu, ram));
        }
        map
    }

    /// A random single-node, dependency-free scheduling instance: a handful
    /// of tasks with random cpu/ram/deadline, against a random uniform
    /// per-slot envelope. Deliberately small so both feasible and infeasible
    /// instances show up often.
    fn arb_schedule_instance() -> impl Strategy<Value = (Vec<Task>, i64, i64)> {
        prop::collection::vec((1i64..4, 1i64..4, 1i64..12), 1..6).prop_flat_map(|specs| {
            let tasks: Vec<Task> = specs
                .into_iter()
                .enumerate()
                .map(|(i, (cpu, ram, deadline))| Task::new(format!("T{i}"), cpu, ram, deadline))
                .collect();
            (Just(tasks), 1i64..6, 1i64..6)
        })
    }

    proptest! {
        /// Schedule validity (per-slot cpu/ram conservation, deadlines met),
        /// determinism across repeated solves, and envelope non-mutation, all
        /// over randomly generated single-node instances.
        #[test]
        fn schedule_validity_determinism_and_envelope_non_mutation(
            (tasks, cpu_cap, ram_cap) in arb_schedule_instance()
        ) {
            let nodes = vec![Node::new("N1", 1000, 1000, tasks.len())];
            let mut assignment = Assignment::new();
            for t in &tasks {
                assignment.insert(t.id.clone(), "N1".to_string());
            }
            let slots: Vec<Slot> = (0..20).collect();
            let envelopes = uniform_envelopes(&["N1"], &slots, cpu_cap, Some(ram_cap));
            let before = envelopes.clone();
            let durations = DurationMap::new();

            let r1 = GlobalScheduler::solve(&tasks, &nodes, &assignment, &slots, &envelopes, &durations, &[], 0);
            let r2 = GlobalScheduler::solve(&tasks, &nodes, &assignment, &slots, &envelopes, &durations, &[], 0);

            prop_assert_eq!(&envelopes, &before);
            prop_assert_eq!(r1.valid, r2.valid);

            if r1.valid {
                prop_assert_eq!(r1.schedule.len(), tasks.len());
                prop_assert_eq!(r2.schedule.len(), tasks.len());

                let mut cpu_usage: HashMap<Slot, i64> = HashMap::new();
                let mut ram_usage: HashMap<Slot, i64> = HashMap::new();

                for task in &tasks {
                    let entry1 = &r1.schedule[&task.id];
                    let entry2 = &r2.schedule[&task.id];
                    prop_assert_eq!(entry1.start_time, entry2.start_time);

                    let duration = durations.duration_of(&task.id);
                    prop_assert!(entry1.start_time >= 0);
                    prop_assert!(entry1.start_time + duration <= task.deadline);

                    for offset in 0..duration {
                        let slot = entry1.start_time + offset;
                        *cpu_usage.entry(slot).or_insert(0) += task.cpu;
                        *ram_usage.entry(slot).or_insert(0) += task.ram;
                    }
                }

                for used in cpu_usage.values() {
                    prop_assert!(*used <= cpu_cap);
                }
                for used in ram_usage.values() {
                    prop_assert!(*used <= ram_cap);
                }
            }
        }
    }

    #[test]
    fn full_pipeline_with_dependencies_seed_scenario() {
        let tasks = vec![
            Task::new("T1", 2, 4, 3),
            Task::new("T2", 1, 2, 3),
            Task::new("T3", 3, 3, 4),
        ];
        let nodes = vec![
            Node::new("N1", 5, 6, 2),
            Node::new("N2", 6, 5, 2),
            Node::new("N3", 4, 4, 2),
        ];
        let mut assignment = Assignment::new();
        assignment.insert("T1".into(), "N1".into());
        assignment.insert("T2".into(), "N2".into());
        assignment.insert("T3".into(), "N3".into());

        let deps = vec![Dependency::new("T1", "T3"), Dependency::new("T2", "T3")];
        let mut durations = DurationMap::new();
        durations.insert("T1", 1);
        durations.insert("T2", 1);
        durations.insert("T3", 2);

        let slots: Vec<Slot> = (0..6).collect();
        let envelopes = uniform_envelopes(&["N1", "N2", "N3"], &slots, 10, Some(10));

        let result = GlobalScheduler::solve(&tasks, &nodes, &assignment, &slots, &envelopes, &durations, &deps, 11);

        assert!(result.valid, "reason: {:?}", result.reason);
        let t3 = &result.schedule["T3"];
        assert!(t3.start_time >= 1);
        assert!(t3.start_time + 2 <= 4);
        assert_eq!(result.total_cost, 11);
    }

    #[test]
    fn deadline_tight_infeasibility() {
        let tasks = vec![Task::new("T", 1, 1, 2)];
        let nodes = vec![Node::new("N1", 4, 4, 1)];
        let mut assignment = Assignment::new();
        assignment.insert("T".into(), "N1".into());
        let durations: DurationMap = [("T".to_string(), 3)].into_iter().collect();
        let slots: Vec<Slot> = (0..5).collect();
        let envelopes = uniform_envelopes(&["N1"], &slots, 4, Some(4));

        let result = GlobalScheduler::solve(&tasks, &nodes, &assignment, &slots, &envelopes, &durations, &[], 0);
        assert!(!result.valid);
        assert!(result.reason.unwrap().contains('T'));
    }

    #[test]
    fn dependency_cycle_is_detected() {
        let tasks = vec![Task::new("A", 1, 1, 5), Task::new("B", 1, 1, 5)];
        let nodes = vec![Node::new("N1", 4, 4, 2)];
        let mut assignment = Assignment::new();
        assignment.insert("A".into(), "N1".into());
        assignment.insert("B".into(), "N1".into());
        let deps = vec![Dependency::new("A", "B"), Dependency::new("B", "A")];
        let slots: Vec<Slot> = (0..5).collect();
        let envelopes = uniform_envelopes(&["N1"], &slots, 4, Some(4));

        let result = GlobalScheduler::solve(
            &tasks,
            &nodes,
            &assignment,
            &slots,
            &envelopes,
            &DurationMap::new(),
            &deps,
            0,
        );
        assert!(!result.valid);
        assert!(result.reason.unwrap().to_lowercase().contains("cycle"));
    }

    #[test]
    fn envelopes_are_not_mutated() {
        let tasks = vec![Task::new("T1", 2, 2, 5)];
        let nodes = vec![Node::new("N1", 4, 4, 1)];
        let mut assignment = Assignment::new();
        assignment.insert("T1".into(), "N1".into());
        let slots: Vec<Slot> = (0..5).collect();
        let envelopes = uniform_envelopes(&["N1"], &slots, 4, Some(4));
        let before = envelopes.clone();

        let _ = GlobalScheduler::solve(
            &tasks,
            &nodes,
            &assignment,
            &slots,
            &envelopes,
            &DurationMap::new(),
            &[],
            0,
        );
        assert_eq!(envelopes, before);
    }

    #[test]
    fn determinism_across_repeated_solves() {
        let tasks = vec![Task::new("T1", 1, 1, 5), Task::new("T2", 1, 1, 5)];
        let nodes = vec![Node::new("N1", 4, 4, 2)];
        let mut assignment = Assignment::new();
        assignment.insert("T1".into(), "N1".into());
        assignment.insert("T2".into(), "N1".into());
        let slots: Vec<Slot> = (0..5).collect();
        let envelopes = uniform_envelopes(&["N1"], &slots, 4, Some(4));

        let r1 = GlobalScheduler::solve(&tasks, &nodes, &assignment, &slots, &envelopes, &DurationMap::new(), &[], 3);
        let r2 = GlobalScheduler::solve(&tasks, &nodes, &assignment, &slots, &envelopes, &DurationMap::new(), &[], 3);
        assert_eq!(r1.schedule["T1"].start_time, r2.schedule["T1"].start_time);
        assert_eq!(r1.schedule["T2"].start_time, r2.schedule["T2"].start_time);
    }
}
