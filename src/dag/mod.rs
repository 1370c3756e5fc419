// src/dag/mod.rs

//! Task graph representation.
//!
//! - [`graph`] holds [`TaskGraph`], the wave-partitioned set of tasks that
//!   the orchestrator submits as one unit.

pub mod graph;

pub use graph::TaskGraph;
