//! Provides input functionality for the text formats exchanged with external tools.
//!
//! This module contains readers for molecular structure files, the clustering log emitted
//! by the structural-clustering collaborator, and the whitespace-delimited energy tables
//! written by the refinement collaborator. Structure formats share the trait-based
//! interface in [`traits`].

pub mod cluster_log;
pub mod energy_table;
pub mod pdb;
pub mod traits;
