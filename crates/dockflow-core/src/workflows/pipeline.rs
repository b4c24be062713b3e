use super::dock::{self, DockOptions};
use crate::core::clustering::{ClusterTable, select_clusters};
use crate::engine::aggregate::{PipelineResult, aggregate, stage_files, write_csv};
use crate::engine::config::PipelineConfig;
use crate::engine::error::EngineError;
use crate::engine::orchestrator::run_all;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::refine::RefineContext;
use crate::engine::tools::Refiner;
use crate::engine::tools::gromacs::cluster_poses;
use crate::engine::tools::haddock::HaddockRefiner;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

const COPIED_FILES_DIR: &str = "copied_files";

#[derive(Debug)]
pub struct PipelineOutcome {
    pub result: PipelineResult,
    pub clusters: ClusterTable,
    /// Cluster ids that were refined, in selection order.
    pub selected: Vec<u32>,
    pub csv_path: PathBuf,
    pub copied_files: Vec<PathBuf>,
}

/// Runs the complete pipeline with the HADDOCK refinement toolchain.
#[instrument(skip_all, name = "pipeline_workflow")]
pub fn run(
    receptor: &Path,
    ligand: &Path,
    config: &PipelineConfig,
    reporter: &ProgressReporter,
) -> Result<PipelineOutcome, EngineError> {
    let refiner = HaddockRefiner::new(
        config.tools.clone(),
        config.refinement.run_number,
        config.refinement.analysis_best,
    );
    run_with_refiner(receptor, ligand, config, &refiner, reporter)
}

/// Runs the complete pipeline: docking, pose clustering, per-cluster refinement and
/// aggregation.
///
/// Layout under the output directory: `docking/` holds the inputs, poses and one
/// `Pos<id>/` directory per refined cluster; `docking/copied_files/` and the output
/// directory itself receive the representative structures; `combined_results.csv` holds
/// the scored table.
pub fn run_with_refiner(
    receptor: &Path,
    ligand: &Path,
    config: &PipelineConfig,
    refiner: &dyn Refiner,
    reporter: &ProgressReporter,
) -> Result<PipelineOutcome, EngineError> {
    let docking_dir = std::path::absolute(config.docking_dir())?;
    info!(output = %config.output_dir.display(), "Starting docking pipeline.");

    let options = DockOptions {
        docking: config.docking.clone(),
        poses: Some(config.clustering.poses),
    };
    let docked = dock::run(receptor, ligand, &docking_dir, &config.tools, &options, reporter)?;

    reporter.report(Progress::PhaseStart { name: "Clustering" });
    let clusters = cluster_poses(
        &config.tools,
        &docking_dir,
        &docked.poses,
        &config.clustering,
    )?;
    reporter.report(Progress::PhaseFinish);

    refine_clusters(clusters, &docked.receptor, &docked.ligand, config, refiner, reporter)
}

/// Selects clusters from `clusters`, refines them in parallel and writes the results.
///
/// Poses and the per-cluster working directories live in the docking directory of
/// `config`; `receptor` and `ligand` are copied into every working directory.
#[instrument(skip_all, name = "refinement_stage")]
pub fn refine_clusters(
    clusters: ClusterTable,
    receptor: &Path,
    ligand: &Path,
    config: &PipelineConfig,
    refiner: &dyn Refiner,
    reporter: &ProgressReporter,
) -> Result<PipelineOutcome, EngineError> {
    let output_dir = std::path::absolute(&config.output_dir)?;
    let docking_dir = std::path::absolute(config.docking_dir())?;

    let selected = select_clusters(&clusters, config.max_clusters, config.cluster_order);
    if selected.is_empty() {
        warn!("The clustering log contains no clusters to refine.");
        return Err(EngineError::EmptyResult { attempted: 0 });
    }
    info!(
        found = clusters.len(),
        selected = ?selected,
        order = %config.cluster_order,
        "Selected clusters for refinement."
    );

    reporter.report(Progress::PhaseStart { name: "Refinement" });
    let ctx = RefineContext {
        table: &clusters,
        pose_dir: &docking_dir,
        work_root: &docking_dir,
        receptor,
        ligand,
        config: &config.refinement,
        refiner,
    };
    let outcomes = run_all(&selected, &ctx, config.num_workers, reporter)?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Aggregation" });
    let result = aggregate(outcomes)?;
    for failure in &result.failures {
        reporter.report(Progress::Message(failure.to_string()));
    }
    let copied_files = stage_files(
        &result,
        &[docking_dir.join(COPIED_FILES_DIR), output_dir.clone()],
    )?;
    std::fs::create_dir_all(&output_dir)?;
    let csv_path = std::path::absolute(config.results_csv())?;
    write_csv(&result, &csv_path)?;
    reporter.report(Progress::PhaseFinish);

    Ok(PipelineOutcome {
        result,
        clusters,
        selected,
        csv_path,
        copied_files,
    })
}
