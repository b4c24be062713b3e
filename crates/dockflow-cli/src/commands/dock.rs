use crate::cli::DockArgs;
use crate::commands::run::ensure_input;
use crate::config::{ToolEnvironment, tool_error};
use crate::error::Result;
use crate::ui::{CliProgressHandler, UiEvent};
use dockflow::engine::config::{DockingConfig, random_seed};
use dockflow::engine::progress::ProgressReporter;
use dockflow::workflows::dock::{self, DockOptions};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

fn dock_options(args: &DockArgs) -> DockOptions {
    DockOptions {
        docking: DockingConfig {
            num_predictions: args.num_predictions,
            seed: args.seed.unwrap_or_else(random_seed),
            dense_rotational_sampling: args.dense,
            fix_receptor: args.fix,
            output_name: args.output.clone(),
            timeout: args.timeout.map(Duration::from_secs),
        },
        poses: args.poses,
    }
}

pub async fn run(args: DockArgs, ui_sender: mpsc::Sender<UiEvent>) -> Result<()> {
    let tools = ToolEnvironment::from_env()
        .builder()
        .build_for_docking()
        .map_err(tool_error)?;
    ensure_input(&args.receptor)?;
    ensure_input(&args.ligand)?;

    let options = dock_options(&args);
    info!(seed = options.docking.seed, "Resolved docking options.");

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let result = tokio::task::block_in_place(|| {
        dock::run(&args.receptor, &args.ligand, &args.work_dir, &tools, &options, &reporter)
    })?;

    println!("Docking output written to: {}", result.output.display());
    if !result.poses.is_empty() {
        println!("Extracted {} complex structure(s).", result.poses.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn dock_args(extra: &[&str]) -> DockArgs {
        let mut argv = vec!["dockflow", "dock", "-R", "r.pdb", "-L", "l.pdb"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Dock(args) => args,
            _ => panic!("Expected 'dock' subcommand"),
        }
    }

    #[test]
    fn flags_map_onto_docking_config() {
        let options = dock_options(&dock_args(&[
            "-N", "500", "-S", "12", "-F", "-o", "run.out", "--poses", "10", "--timeout", "60",
        ]));
        assert_eq!(options.docking.num_predictions, 500);
        assert_eq!(options.docking.seed, 12);
        assert!(options.docking.fix_receptor);
        assert!(!options.docking.dense_rotational_sampling);
        assert_eq!(options.docking.output_name, "run.out");
        assert_eq!(options.poses, Some(10));
        assert_eq!(options.docking.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn seed_is_drawn_when_not_given() {
        let options = dock_options(&dock_args(&[]));
        assert!((1..=100).contains(&options.docking.seed));
        assert_eq!(options.poses, None);
    }
}
