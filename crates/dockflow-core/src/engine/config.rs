use crate::core::clustering::ClusterOrder;
use crate::core::interface::InterfaceSearch;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("External tool location '{0}' is not configured")]
    MissingTool(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Install locations of the external collaborators.
///
/// Resolved once at startup and passed down explicitly; no component looks up the
/// process environment on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Directory holding `zdock`, `mark_sur`, `create.pl`, `create_lig` and `uniCHARMM`.
    pub zdock: PathBuf,
    /// HADDOCK installation root.
    pub haddock: PathBuf,
    /// The `gmx` executable.
    pub gromacs: PathBuf,
    /// Directory holding the HADDOCK analysis scripts.
    pub haddock_tools: PathBuf,
    /// The `haddock-restraints` executable.
    pub haddock_restraints: PathBuf,
    /// Python interpreter used to launch HADDOCK.
    pub python: PathBuf,
}

impl ToolPaths {
    pub fn zdock_file(&self, name: &str) -> PathBuf {
        self.zdock.join(name)
    }

    pub fn haddock_script(&self) -> PathBuf {
        self.haddock.join("haddock").join("run_haddock.py")
    }

    pub fn cluster_analysis_script(&self) -> PathBuf {
        self.haddock_tools.join("ana_clusters.csh")
    }
}

#[derive(Default)]
pub struct ToolPathsBuilder {
    zdock: Option<PathBuf>,
    haddock: Option<PathBuf>,
    gromacs: Option<PathBuf>,
    haddock_tools: Option<PathBuf>,
    haddock_restraints: Option<PathBuf>,
    python: Option<PathBuf>,
}

impl ToolPathsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zdock(mut self, path: impl Into<PathBuf>) -> Self {
        self.zdock = Some(path.into());
        self
    }
    pub fn haddock(mut self, path: impl Into<PathBuf>) -> Self {
        self.haddock = Some(path.into());
        self
    }
    pub fn gromacs(mut self, path: impl Into<PathBuf>) -> Self {
        self.gromacs = Some(path.into());
        self
    }
    pub fn haddock_tools(mut self, path: impl Into<PathBuf>) -> Self {
        self.haddock_tools = Some(path.into());
        self
    }
    pub fn haddock_restraints(mut self, path: impl Into<PathBuf>) -> Self {
        self.haddock_restraints = Some(path.into());
        self
    }
    pub fn python(mut self, path: impl Into<PathBuf>) -> Self {
        self.python = Some(path.into());
        self
    }

    /// Builds paths for a docking-only run, where only the ZDOCK location is required.
    pub fn build_for_docking(mut self) -> Result<ToolPaths, ConfigError> {
        self.haddock.get_or_insert_with(PathBuf::new);
        self.gromacs.get_or_insert_with(PathBuf::new);
        self.build()
    }

    pub fn build(self) -> Result<ToolPaths, ConfigError> {
        let zdock = self.zdock.ok_or(ConfigError::MissingTool("ZDOCK"))?;
        let haddock = self.haddock.ok_or(ConfigError::MissingTool("HADDOCK"))?;
        let gromacs = self.gromacs.ok_or(ConfigError::MissingTool("GROMACS"))?;
        let haddock_tools = self
            .haddock_tools
            .unwrap_or_else(|| haddock.join("tools"));
        Ok(ToolPaths {
            zdock,
            haddock,
            gromacs,
            haddock_tools,
            haddock_restraints: self
                .haddock_restraints
                .unwrap_or_else(|| PathBuf::from("haddock-restraints")),
            python: self.python.unwrap_or_else(|| PathBuf::from("python")),
        })
    }
}

/// Parameters of one rigid-body docking search.
#[derive(Debug, Clone, PartialEq)]
pub struct DockingConfig {
    pub num_predictions: usize,
    pub seed: u32,
    pub dense_rotational_sampling: bool,
    pub fix_receptor: bool,
    /// Name of the search output file, relative to the work directory.
    pub output_name: String,
    /// Upper bound on each docking program run.
    pub timeout: Option<Duration>,
}

impl Default for DockingConfig {
    fn default() -> Self {
        Self {
            num_predictions: 2000,
            seed: random_seed(),
            dense_rotational_sampling: false,
            fix_receptor: false,
            output_name: "zdock.out".to_string(),
            timeout: None,
        }
    }
}

/// Draws a docking seed from 1..=100.
pub fn random_seed() -> u32 {
    use rand::Rng;
    rand::thread_rng().gen_range(1..=100)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringConfig {
    /// Number of top-ranked poses extracted and clustered.
    pub poses: usize,
    /// Clustering cutoff in nanometres.
    pub cutoff: f64,
    pub output_prefix: String,
    /// Group selection fed to the clustering tool on stdin.
    pub group: String,
    pub extra_options: Vec<String>,
    /// Upper bound on the clustering program run.
    pub timeout: Option<Duration>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            poses: 100,
            cutoff: 0.45,
            output_prefix: "cluster".to_string(),
            group: "3".to_string(),
            extra_options: Vec::new(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementConfig {
    /// Interface residue distance threshold in Angstroms.
    pub interface_distance: f64,
    pub interface_search: InterfaceSearch,
    pub receptor_chain: char,
    pub ligand_chain: char,
    pub run_number: u32,
    /// Value passed to the cluster analysis as `-best N`.
    pub analysis_best: u32,
    /// Upper bound on each external process of a refinement task.
    pub timeout: Option<Duration>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            interface_distance: 8.0,
            interface_search: InterfaceSearch::default(),
            receptor_chain: 'A',
            ligand_chain: 'B',
            run_number: 1,
            analysis_best: 4,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub tools: ToolPaths,
    pub output_dir: PathBuf,
    pub max_clusters: usize,
    pub cluster_order: ClusterOrder,
    /// Worker count of the refinement pool; `None` uses the available parallelism.
    pub num_workers: Option<usize>,
    pub docking: DockingConfig,
    pub clustering: ClusteringConfig,
    pub refinement: RefinementConfig,
}

impl PipelineConfig {
    pub fn docking_dir(&self) -> PathBuf {
        self.output_dir.join("docking")
    }

    pub fn results_csv(&self) -> PathBuf {
        self.output_dir.join("combined_results.csv")
    }
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    tools: Option<ToolPaths>,
    output_dir: Option<PathBuf>,
    max_clusters: Option<usize>,
    cluster_order: Option<ClusterOrder>,
    num_workers: Option<usize>,
    docking: Option<DockingConfig>,
    clustering: Option<ClusteringConfig>,
    refinement: Option<RefinementConfig>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = Some(tools);
        self
    }
    pub fn output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = Some(dir.as_ref().to_path_buf());
        self
    }
    pub fn max_clusters(mut self, n: usize) -> Self {
        self.max_clusters = Some(n);
        self
    }
    pub fn cluster_order(mut self, order: ClusterOrder) -> Self {
        self.cluster_order = Some(order);
        self
    }
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = Some(n);
        self
    }
    pub fn docking(mut self, docking: DockingConfig) -> Self {
        self.docking = Some(docking);
        self
    }
    pub fn clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = Some(clustering);
        self
    }
    pub fn refinement(mut self, refinement: RefinementConfig) -> Self {
        self.refinement = Some(refinement);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let refinement = self.refinement.unwrap_or_default();
        if !(refinement.interface_distance.is_finite() && refinement.interface_distance > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "interface_distance",
                reason: format!("must be positive, got {}", refinement.interface_distance),
            });
        }
        let clustering = self.clustering.unwrap_or_default();
        if !(clustering.cutoff.is_finite() && clustering.cutoff > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "cluster_cutoff",
                reason: format!("must be positive, got {}", clustering.cutoff),
            });
        }
        if clustering.poses == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "poses",
                reason: "at least one pose is needed for clustering".to_string(),
            });
        }
        if self.num_workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                parameter: "num_workers",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(PipelineConfig {
            tools: self.tools.ok_or(ConfigError::MissingParameter("tools"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            max_clusters: self.max_clusters.unwrap_or(3),
            cluster_order: self.cluster_order.unwrap_or_default(),
            num_workers: self.num_workers,
            docking: self.docking.unwrap_or_default(),
            clustering,
            refinement,
        })
    }
}
