use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use dockflow::core::clustering::ClusterOrder;
use dockflow::core::interface::InterfaceSearch;
use dockflow::engine::config::{self as core_config, ConfigError, ToolPathsBuilder};
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const ENV_ZDOCK: &str = "ZDOCK";
pub const ENV_HADDOCK: &str = "HADDOCK";
pub const ENV_GROMACS: &str = "GROMACS";
pub const ENV_HADDOCK_TOOLS: &str = "HADDOCKTOOLS";
pub const ENV_HADDOCK_RESTRAINTS: &str = "HADDOCK_RESTRAINTS";

const DEFAULT_OUTPUT_DIR: &str = "results";

/// External tool locations taken from the process environment.
///
/// `HADDOCK_RESTRAINTS` names the directory holding the `haddock-restraints` binary.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ToolEnvironment {
    zdock: Option<PathBuf>,
    haddock: Option<PathBuf>,
    gromacs: Option<PathBuf>,
    haddock_tools: Option<PathBuf>,
    haddock_restraints: Option<PathBuf>,
}

impl ToolEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            zdock: get(ENV_ZDOCK),
            haddock: get(ENV_HADDOCK),
            gromacs: get(ENV_GROMACS),
            haddock_tools: get(ENV_HADDOCK_TOOLS),
            haddock_restraints: get(ENV_HADDOCK_RESTRAINTS).map(|dir| dir.join("haddock-restraints")),
        }
    }

    /// A builder pre-filled with every location that is set.
    pub fn builder(&self) -> ToolPathsBuilder {
        let mut builder = ToolPathsBuilder::new();
        if let Some(p) = &self.zdock {
            builder = builder.zdock(p);
        }
        if let Some(p) = &self.haddock {
            builder = builder.haddock(p);
        }
        if let Some(p) = &self.gromacs {
            builder = builder.gromacs(p);
        }
        if let Some(p) = &self.haddock_tools {
            builder = builder.haddock_tools(p);
        }
        if let Some(p) = &self.haddock_restraints {
            builder = builder.haddock_restraints(p);
        }
        builder
    }
}

/// Maps a tool resolution failure onto the CLI's environment error.
pub fn tool_error(error: ConfigError) -> CliError {
    match error {
        ConfigError::MissingTool(name) => CliError::Environment(format!(
            "The {} location is not configured. Export the {} environment variable or set `tools.{}` in the config file.",
            name,
            name,
            name.to_ascii_lowercase()
        )),
        other => CliError::Config(other.to_string()),
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialToolsConfig {
    zdock: Option<PathBuf>,
    haddock: Option<PathBuf>,
    gromacs: Option<PathBuf>,
    haddock_tools: Option<PathBuf>,
    haddock_restraints: Option<PathBuf>,
    python: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDockingConfig {
    num_predictions: Option<usize>,
    seed: Option<u32>,
    dense_rotational_sampling: Option<bool>,
    fix_receptor: Option<bool>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialClusteringConfig {
    poses: Option<usize>,
    cutoff: Option<f64>,
    group: Option<String>,
    extra_options: Option<Vec<String>>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialRefinementConfig {
    max_clusters: Option<usize>,
    cluster_order: Option<String>,
    interface_distance: Option<f64>,
    interface_search: Option<String>,
    receptor_chain: Option<char>,
    ligand_chain: Option<char>,
    run_number: Option<u32>,
    analysis_best: Option<u32>,
    timeout_secs: Option<u64>,
}

/// The `run` configuration as read from a TOML file; every field is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialPipelineConfig {
    output_dir: Option<PathBuf>,
    tools: Option<PartialToolsConfig>,
    docking: Option<PartialDockingConfig>,
    clustering: Option<PartialClusteringConfig>,
    refinement: Option<PartialRefinementConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_char(key: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CliError::Config(format!(
            "Invalid value for {}: '{}' is not a single chain identifier",
            key, value
        ))),
    }
}

impl PartialPipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolves the final pipeline configuration.
    ///
    /// Precedence, highest first: command-line flags, `--set` overrides, this file,
    /// the tool environment, built-in defaults.
    pub fn merge_with_cli(
        mut self,
        args: &RunArgs,
        env: &ToolEnvironment,
        threads: Option<usize>,
    ) -> Result<core_config::PipelineConfig> {
        self.apply_set_values(&args.set_values)?;

        let tools_config = self.tools.take().unwrap_or_default();
        let docking_config = self.docking.take().unwrap_or_default();
        let clustering_config = self.clustering.take().unwrap_or_default();
        let refinement_config = self.refinement.take().unwrap_or_default();

        let tools = Self::merge_tools(tools_config, env)?;

        let defaults = core_config::DockingConfig::default();
        let docking = core_config::DockingConfig {
            num_predictions: docking_config
                .num_predictions
                .unwrap_or(defaults.num_predictions),
            seed: docking_config.seed.unwrap_or(defaults.seed),
            dense_rotational_sampling: docking_config
                .dense_rotational_sampling
                .unwrap_or(defaults.dense_rotational_sampling),
            fix_receptor: docking_config.fix_receptor.unwrap_or(defaults.fix_receptor),
            output_name: defaults.output_name,
            timeout: docking_config.timeout_secs.map(Duration::from_secs),
        };

        let defaults = core_config::ClusteringConfig::default();
        let clustering = core_config::ClusteringConfig {
            poses: clustering_config.poses.unwrap_or(defaults.poses),
            cutoff: args
                .cluster_cutoff
                .or(clustering_config.cutoff)
                .unwrap_or(defaults.cutoff),
            output_prefix: defaults.output_prefix,
            group: clustering_config.group.unwrap_or(defaults.group),
            extra_options: clustering_config
                .extra_options
                .unwrap_or(defaults.extra_options),
            timeout: clustering_config.timeout_secs.map(Duration::from_secs),
        };

        let defaults = core_config::RefinementConfig::default();
        let interface_search = match &refinement_config.interface_search {
            Some(name) => InterfaceSearch::from_str(name).map_err(|e| CliError::Config(e.to_string()))?,
            None => defaults.interface_search,
        };
        let refinement = core_config::RefinementConfig {
            interface_distance: args
                .interface_distance
                .or(refinement_config.interface_distance)
                .unwrap_or(defaults.interface_distance),
            interface_search,
            receptor_chain: refinement_config
                .receptor_chain
                .unwrap_or(defaults.receptor_chain),
            ligand_chain: refinement_config.ligand_chain.unwrap_or(defaults.ligand_chain),
            run_number: refinement_config.run_number.unwrap_or(defaults.run_number),
            analysis_best: refinement_config
                .analysis_best
                .unwrap_or(defaults.analysis_best),
            timeout: args
                .timeout
                .or(refinement_config.timeout_secs)
                .map(Duration::from_secs),
        };

        let cluster_order = match args
            .cluster_order
            .as_ref()
            .or(refinement_config.cluster_order.as_ref())
        {
            Some(name) => ClusterOrder::from_str(name).map_err(|e| CliError::Config(e.to_string()))?,
            None => ClusterOrder::default(),
        };

        let output_dir = args
            .output_dir
            .clone()
            .or(self.output_dir.take())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let mut builder = core_config::PipelineConfigBuilder::new()
            .tools(tools)
            .output_dir(output_dir)
            .cluster_order(cluster_order)
            .docking(docking)
            .clustering(clustering)
            .refinement(refinement);
        if let Some(n) = args.max_clusters.or(refinement_config.max_clusters) {
            builder = builder.max_clusters(n);
        }
        if let Some(n) = threads {
            builder = builder.num_workers(n);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn merge_tools(file: PartialToolsConfig, env: &ToolEnvironment) -> Result<core_config::ToolPaths> {
        let mut builder = env.builder();
        if let Some(p) = file.zdock {
            builder = builder.zdock(p);
        }
        if let Some(p) = file.haddock {
            builder = builder.haddock(p);
        }
        if let Some(p) = file.gromacs {
            builder = builder.gromacs(p);
        }
        if let Some(p) = file.haddock_tools {
            builder = builder.haddock_tools(p);
        }
        if let Some(p) = file.haddock_restraints {
            builder = builder.haddock_restraints(p);
        }
        if let Some(p) = file.python {
            builder = builder.python(p);
        }
        builder.build().map_err(tool_error)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            if let Some(field) = key.strip_prefix("tools.") {
                let tools = self.tools.get_or_insert_with(Default::default);
                let slot = match field {
                    "zdock" => &mut tools.zdock,
                    "haddock" => &mut tools.haddock,
                    "gromacs" => &mut tools.gromacs,
                    "haddock-tools" => &mut tools.haddock_tools,
                    "haddock-restraints" => &mut tools.haddock_restraints,
                    "python" => &mut tools.python,
                    _ => return Err(Self::unsupported(key)),
                };
                *slot = Some(PathBuf::from(value));
                continue;
            }

            match key {
                "output-dir" => self.output_dir = Some(PathBuf::from(value)),
                "docking.num-predictions" => {
                    self.docking.get_or_insert_with(Default::default).num_predictions =
                        Some(parse_value(key, value)?);
                }
                "docking.seed" => {
                    self.docking.get_or_insert_with(Default::default).seed = Some(parse_value(key, value)?);
                }
                "docking.dense-rotational-sampling" => {
                    self.docking
                        .get_or_insert_with(Default::default)
                        .dense_rotational_sampling = Some(parse_value(key, value)?);
                }
                "docking.fix-receptor" => {
                    self.docking.get_or_insert_with(Default::default).fix_receptor =
                        Some(parse_value(key, value)?);
                }
                "docking.timeout-secs" => {
                    self.docking.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_value(key, value)?);
                }
                "clustering.timeout-secs" => {
                    self.clustering.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_value(key, value)?);
                }
                "clustering.poses" => {
                    self.clustering.get_or_insert_with(Default::default).poses = Some(parse_value(key, value)?);
                }
                "clustering.cutoff" => {
                    self.clustering.get_or_insert_with(Default::default).cutoff = Some(parse_value(key, value)?);
                }
                "clustering.group" => {
                    self.clustering.get_or_insert_with(Default::default).group = Some(value.to_string());
                }
                "refinement.max-clusters" => {
                    self.refinement.get_or_insert_with(Default::default).max_clusters =
                        Some(parse_value(key, value)?);
                }
                "refinement.cluster-order" => {
                    self.refinement.get_or_insert_with(Default::default).cluster_order = Some(value.to_string());
                }
                "refinement.interface-distance" => {
                    self.refinement
                        .get_or_insert_with(Default::default)
                        .interface_distance = Some(parse_value(key, value)?);
                }
                "refinement.interface-search" => {
                    self.refinement.get_or_insert_with(Default::default).interface_search =
                        Some(value.to_string());
                }
                "refinement.receptor-chain" => {
                    self.refinement.get_or_insert_with(Default::default).receptor_chain =
                        Some(parse_char(key, value)?);
                }
                "refinement.ligand-chain" => {
                    self.refinement.get_or_insert_with(Default::default).ligand_chain =
                        Some(parse_char(key, value)?);
                }
                "refinement.run-number" => {
                    self.refinement.get_or_insert_with(Default::default).run_number =
                        Some(parse_value(key, value)?);
                }
                "refinement.analysis-best" => {
                    self.refinement.get_or_insert_with(Default::default).analysis_best =
                        Some(parse_value(key, value)?);
                }
                "refinement.timeout-secs" => {
                    self.refinement.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_value(key, value)?);
                }
                _ => return Err(Self::unsupported(key)),
            }
        }
        Ok(())
    }

    fn unsupported(key: &str) -> CliError {
        CliError::Config(format!("Unsupported configuration key for --set: '{}'", key))
    }
}
