//! Adapters for the external collaborators of the pipeline.
//!
//! Each adapter only knows how to stage inputs, launch the tool through
//! [`run_tool`](crate::engine::process::run_tool) and locate its outputs. The refinement
//! collaborator sits behind the [`Refiner`] trait so the per-cluster task can be driven
//! by any implementation.

pub mod gromacs;
pub mod haddock;
pub mod zdock;

use crate::core::energy::EnergyTable;
use crate::core::interface::InterfaceResult;
use crate::engine::error::EngineError;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a refinement collaborator needs for one cluster.
#[derive(Debug, Clone)]
pub struct RefinementRequest {
    pub cluster_id: u32,
    /// Private working directory of this cluster; holds copies of both input structures.
    pub work_dir: PathBuf,
    /// Receptor file name inside `work_dir`.
    pub receptor: String,
    /// Ligand file name inside `work_dir`.
    pub ligand: String,
    pub receptor_chain: char,
    pub ligand_chain: char,
    /// Interface residues used as active restraints.
    pub interface: InterfaceResult,
    pub timeout: Option<Duration>,
}

/// Candidate structures and their energy terms, as two partial tables.
#[derive(Debug, Clone, Default)]
pub struct RefinementOutput {
    /// Directory the structure identifiers of both tables are relative to.
    pub analysis_dir: PathBuf,
    pub interaction: EnergyTable,
    pub desolvation: EnergyTable,
}

/// A restrained-docking refinement collaborator.
pub trait Refiner: Send + Sync {
    fn refine(&self, request: &RefinementRequest) -> Result<RefinementOutput, EngineError>;
}
