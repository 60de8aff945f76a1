//! # fleet-planner
//!
//! Offline fleet task scheduler: a four-phase pipeline that allocates tasks
//! to nodes, schedules them against dependencies and per-slot resource
//! envelopes, repairs the schedule under node failures and new arrivals, and
//! finally plans each node's own execution timeline.
//!
//! ## Modules
//!
//! - [`graph`] — arena-indexed flow network and min-cost max-flow solver
//! - [`allocation`] — Phase 1: task -> node assignment via MCMF
//! - [`scheduling`] — Phase 2 ([`scheduling::global`]) and Phase 4
//!   ([`scheduling::local`]) list-scheduling passes
//! - [`reallocation`] — Phase 3: event-driven schedule repair
//!
//! ## Quick Start
//!
//! ```rust
//! use fleet_planner::allocation::Allocator;
//! use fleet_planner::{CostMatrix, Node, Task};
//!
//! let tasks = vec![Task::new("T1", 2, 4, 2), Task::new("T2", 1, 2, 3)];
//! let nodes = vec![Node::new("N1", 5, 6, 2), Node::new("N2", 3, 3, 2)];
//! let costs = CostMatrix::from_dense_with_sentinel(vec![vec![4, 6], vec![3, 2]], i64::MAX);
//!
//! let mut allocator = Allocator::new(tasks, nodes, &costs).unwrap();
//! let result = allocator.solve().unwrap();
//! println!("total cost: {}", result.total_cost);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocation;
pub mod graph;
pub mod reallocation;
pub mod scheduling;

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;

/// Prelude for common imports
pub mod prelude {
    pub use crate::allocation::{AllocationResult, Allocator};
    pub use crate::graph::{Edge, FlowGraph, MCMFSolver, MinCostMaxFlowResult};
    pub use crate::reallocation::{DynamicReallocator, Event, ReallocationResult, Schedule};
    pub use crate::scheduling::{GlobalScheduler, LocalScheduler, ScheduleEntry, ScheduleResult};
    pub use crate::Error;
    pub use crate::Result;
}
