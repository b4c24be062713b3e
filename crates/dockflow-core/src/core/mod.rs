//! # Core Module
//!
//! Fundamental building blocks of the docking pipeline. Everything in this module is a pure
//! function of its inputs: no process spawning, no directory staging.
//!
//! - **Molecular Representation** ([`models`]) - Chains, residues and atoms of a loaded structure
//! - **File I/O** ([`io`]) - Structure files, clustering logs and refinement energy tables
//! - **Interface Detection** ([`interface`]) - Residues of two chains in contact
//! - **Cluster Records** ([`clustering`]) - Typed clustering results and cluster selection
//! - **Energetics** ([`energy`]) - Energy tables, the inner-join merge and the combined score

pub mod clustering;
pub mod energy;
pub mod interface;
pub mod io;
pub mod models;
