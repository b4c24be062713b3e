//! # Workflows Module
//!
//! End-to-end procedures built from the engine and core layers.
//!
//! - [`dock`] - Rigid-body docking of two structures into ranked complex poses
//! - [`pipeline`] - The complete run: docking, clustering, parallel refinement, aggregation

pub mod dock;
pub mod pipeline;
