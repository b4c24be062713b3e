use crate::cli::RunArgs;
use crate::config::{PartialPipelineConfig, ToolEnvironment};
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use dockflow::engine::progress::ProgressReporter;
use dockflow::workflows::{self, pipeline::PipelineOutcome};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub(crate) fn ensure_input(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input structure not found: {}", path.display()),
        )))
    }
}

pub async fn run(args: RunArgs, threads: Option<usize>, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialPipelineConfig::from_file(path)?,
        None => PartialPipelineConfig::default(),
    };
    info!("Merging configuration from file, environment and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, &ToolEnvironment::from_env(), threads)?;

    ensure_input(&args.receptor)?;
    ensure_input(&args.ligand)?;

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Starting docking pipeline (seed {}, up to {} cluster(s))...",
        config.docking.seed, config.max_clusters
    );
    let outcome = tokio::task::block_in_place(|| {
        workflows::pipeline::run(&args.receptor, &args.ligand, &config, &reporter)
    })?;

    info!(
        rows = outcome.result.rows.len(),
        failures = outcome.result.failures.len(),
        "Pipeline finished."
    );
    for failure in &outcome.result.failures {
        warn!("{}", failure);
    }
    print!("{}", render_summary(&outcome));
    Ok(())
}

fn render_summary(outcome: &PipelineOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Refined {} of {} cluster(s) found; selected {:?}.\n",
        outcome.result.rows.len(),
        outcome.clusters.len(),
        outcome.selected
    ));
    for (rank, row) in outcome.result.ranked().iter().enumerate() {
        out.push_str(&format!(
            "  {}. cluster {:<4} score {:>10.3}  {}\n",
            rank + 1,
            row.representative.cluster_id,
            row.score,
            row.representative.path.display()
        ));
    }
    for failure in &outcome.result.failures {
        out.push_str(&format!("  ✗ {}\n", failure));
    }
    out.push_str(&format!("Results written to: {}\n", outcome.csv_path.display()));
    out
}
