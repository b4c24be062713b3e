//! # Dockflow Core Library
//!
//! Orchestration and analysis logic for a multi-stage protein-protein docking pipeline:
//! a rigid-body search produces candidate poses, the poses are clustered, a handful of
//! representative clusters are refined in parallel with a restrained-docking tool, and the
//! per-cluster energetics are merged into one ranked result set.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `ClusterTable`,
//!   `EnergyTable`), the geometric interface-residue detector and the text parsers for
//!   structure files, clustering logs and energy tables.
//!
//! - **[`engine`]: The Logic Core.** Configuration, error taxonomy, progress reporting,
//!   external-tool plumbing, the per-cluster refinement task, the parallel orchestrator
//!   and the result aggregator.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures (rigid-body docking only, or the
//!   complete pipeline) that tie `engine` and `core` together.

pub mod core;
pub mod engine;
pub mod workflows;
