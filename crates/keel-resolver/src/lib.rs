//! Dependency-version resolution engine: backtracking search over
//! asynchronous version lookups, a cycle-free selection graph, incremental
//! re-resolution, and build-order sequencing.

pub mod cache;
pub mod error;
pub mod graph;
pub mod incremental;
pub mod resolver;
pub mod schedule;
pub mod source;
