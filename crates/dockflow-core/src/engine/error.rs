use thiserror::Error;

use super::config::ConfigError;
use super::process::ProcessError;
use crate::core::energy::MissingTermError;
use crate::core::interface::InterfaceError;
use crate::core::io::energy_table::EnergyTableError;
use crate::core::io::pdb::PdbError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read structure: {0}")]
    Structure(#[from] PdbError),

    #[error("Interface detection failed: {0}")]
    Interface(#[from] InterfaceError),

    #[error("Failed to read energy table: {0}")]
    EnergyTable(#[from] EnergyTableError),

    #[error("External tool failed: {0}")]
    Process(#[from] ProcessError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster {cluster_id} not found in the cluster table")]
    ClusterNotFound { cluster_id: u32 },

    #[error("Cluster {cluster_id} produced no representative structure")]
    NoRepresentative { cluster_id: u32 },

    #[error(transparent)]
    MissingTerm(#[from] MissingTermError),

    #[error("No usable result: all {attempted} cluster task(s) failed")]
    EmptyResult { attempted: usize },

    #[error("Expected output is missing: {path}")]
    MissingOutput { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write results table: {0}")]
    Csv(#[from] csv::Error),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

/// An error raised inside one cluster's refinement task, tagged with the cluster id.
#[derive(Debug, Error)]
#[error("Cluster {cluster_id} failed: {error}")]
pub struct TaskFailure {
    pub cluster_id: u32,
    #[source]
    pub error: EngineError,
}

impl TaskFailure {
    pub fn new(cluster_id: u32, error: EngineError) -> Self {
        Self { cluster_id, error }
    }
}
