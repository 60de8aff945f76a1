//! Flow-network primitives backing Phase 1 allocation.
//!
//! - [`flow::FlowGraph`] — arena-indexed residual graph.
//! - [`flow::MCMFSolver`] — successive-shortest-paths min-cost max-flow.

pub mod flow;

pub use flow::{Edge, FlowGraph, MCMFSolver, MinCostMaxFlowResult};
