//! Benchmarks for Phase 2 global scheduling

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fleet_planner::scheduling::GlobalScheduler;
use fleet_planner::{Assignment, DurationMap, EnvelopeMap, Node, ResourceEnvelope, Task};

fn chain_problem(n: usize) -> (Vec<Task>, Vec<Node>, Assignment, Vec<i64>, EnvelopeMap, DurationMap, Vec<fleet_planner::Dependency>) {
    let tasks: Vec<Task> = (0..n).map(|i| Task::new(format!("T{i}"), 1, 1, (n * 2) as i64)).collect();
    let nodes = vec![Node::new("N0", 10, 10, n)];
    let mut assignment = Assignment::new();
    for t in &tasks {
        assignment.insert(t.id.clone(), "N0".to_string());
    }
    let slots: Vec<i64> = (0..(n as i64 * 2)).collect();
    let mut envelopes = EnvelopeMap::new();
    envelopes.insert("N0".to_string(), ResourceEnvelope::uniform(&slots, 10, Some(10)));
    let durations: DurationMap = tasks.iter().map(|t| (t.id.clone(), 1)).collect();
    let deps: Vec<fleet_planner::Dependency> = (1..n)
        .map(|i| fleet_planner::Dependency::new(format!("T{}", i - 1), format!("T{i}")))
        .collect();
    (tasks, nodes, assignment, slots, envelopes, durations, deps)
}

fn bench_global_scheduler(c: &mut Criterion) {
    let mut group = c.benchmark_group("global_scheduler");

    for size in [10, 50, 100, 200].iter() {
        let (tasks, nodes, assignment, slots, envelopes, durations, deps) = chain_problem(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                GlobalScheduler::solve(
                    black_box(&tasks),
                    &nodes,
                    &assignment,
                    &slots,
                    &envelopes,
                    &durations,
                    &deps,
                    0,
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_global_scheduler);
criterion_main!(benches);
