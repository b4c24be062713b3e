use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Dockflow Developers",
    version,
    about = "Dockflow CLI - Protein-protein docking pipeline: rigid-body search, pose clustering, restrained refinement and scoring.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the complete pipeline: docking, clustering, refinement of the selected clusters and scoring.
    Run(RunArgs),
    /// Run the rigid-body docking stage only.
    Dock(DockArgs),
    /// Print the interface residues between two chains of a structure.
    Interface(InterfaceArgs),
    /// Parse a structural clustering log and print its clusters.
    Clusters(ClustersArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the receptor structure (PDB).
    #[arg(required = true, value_name = "RECEPTOR")]
    pub receptor: PathBuf,

    /// Path to the ligand structure (PDB).
    #[arg(required = true, value_name = "LIGAND")]
    pub ligand: PathBuf,

    /// Directory receiving all intermediate and final results [default: results]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Selection and Refinement Overrides ---
    /// Maximum number of clusters to refine [default: 3]
    #[arg(short = 'c', long, value_name = "INT")]
    pub max_clusters: Option<usize>,

    /// Distance threshold for interface residues, in Angstroms [default: 8.0]
    #[arg(short = 'd', long, value_name = "FLOAT")]
    pub interface_distance: Option<f64>,

    /// Clustering cutoff, in nanometres [default: 0.45]
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub cluster_cutoff: Option<f64>,

    /// Order in which clusters are picked: 'log', 'largest' or 'tightest' [default: log]
    #[arg(long, value_name = "ORDER")]
    pub cluster_order: Option<String>,

    /// Upper bound for each refinement tool invocation, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S refinement.run-number=2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,
}

/// Arguments for the `dock` subcommand.
#[derive(Args, Debug)]
pub struct DockArgs {
    /// Path to the receptor structure (PDB).
    #[arg(short = 'R', long, required = true, value_name = "PATH")]
    pub receptor: PathBuf,

    /// Path to the ligand structure (PDB).
    #[arg(short = 'L', long, required = true, value_name = "PATH")]
    pub ligand: PathBuf,

    /// Name of the docking output file.
    #[arg(short, long, default_value = "zdock.out", value_name = "NAME")]
    pub output: String,

    /// Number of predictions to keep.
    #[arg(short = 'N', long, default_value_t = 2000, value_name = "INT")]
    pub num_predictions: usize,

    /// Randomization seed [default: random in 1..=100]
    #[arg(short = 'S', long, value_name = "INT")]
    pub seed: Option<u32>,

    /// Use dense rotational sampling.
    #[arg(short = 'D', long)]
    pub dense: bool,

    /// Fix the receptor, preventing its rotation.
    #[arg(short = 'F', long)]
    pub fix: bool,

    /// Also write out the top N predictions as complex structures.
    #[arg(long, value_name = "INT")]
    pub poses: Option<usize>,

    /// Working directory for the docking run.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub work_dir: PathBuf,

    /// Upper bound for every external tool invocation, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Arguments for the `interface` subcommand.
#[derive(Args, Debug)]
pub struct InterfaceArgs {
    /// Path to the structure file (PDB).
    #[arg(required = true, value_name = "PDB")]
    pub pdb: PathBuf,

    /// First chain identifier (e.g. 'A').
    #[arg(required = true, value_name = "CHAIN1")]
    pub chain1: char,

    /// Second chain identifier (e.g. 'B').
    #[arg(required = true, value_name = "CHAIN2")]
    pub chain2: char,

    /// Distance threshold for interface residues, in Angstroms.
    #[arg(long, default_value_t = 8.0, value_name = "FLOAT")]
    pub distance: f64,

    /// Search strategy: 'exhaustive' or 'kdtree'.
    #[arg(long, default_value = "exhaustive", value_name = "STRATEGY")]
    pub search: String,
}

/// Arguments for the `clusters` subcommand.
#[derive(Args, Debug)]
pub struct ClustersArgs {
    /// Path to the clustering log.
    #[arg(required = true, value_name = "LOG")]
    pub log: PathBuf,

    /// Also show which clusters a pipeline run would refine, picking at most this many.
    #[arg(short = 'c', long, value_name = "INT")]
    pub max_clusters: Option<usize>,

    /// Order in which clusters are picked: 'log', 'largest' or 'tightest'.
    #[arg(long, default_value = "log", value_name = "ORDER")]
    pub order: String,
}
