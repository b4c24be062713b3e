use crate::core::io::pdb::ensure_end_record;
use crate::engine::config::{DockingConfig, ToolPaths};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tools::zdock::{ZdockRunner, marked_file_name};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default)]
pub struct DockOptions {
    pub docking: DockingConfig,
    /// Number of top predictions to write out as complexes; `None` skips extraction.
    pub poses: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DockResult {
    /// Copies of the inputs inside the work directory.
    pub receptor: PathBuf,
    pub ligand: PathBuf,
    pub receptor_marked: PathBuf,
    pub ligand_marked: PathBuf,
    /// Output file of the docking search.
    pub output: PathBuf,
    /// Extracted complexes in rank order; empty when extraction was skipped.
    pub poses: Vec<PathBuf>,
}

/// Copies `source` into `work_dir` unless it already lives there, returning the copy.
pub(crate) fn stage_into(source: &Path, work_dir: &Path) -> Result<PathBuf, EngineError> {
    let name = source
        .file_name()
        .ok_or_else(|| EngineError::Internal(format!("'{}' has no file name", source.display())))?;
    let target = work_dir.join(name);
    let same = match (source.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same {
        std::fs::copy(source, &target)?;
    }
    Ok(target)
}

/// Runs the rigid-body docking stage inside `work_dir`.
///
/// Both inputs are copied into the work directory and terminated with an `END` record
/// before any tool sees them. Surface marking, the docking search and (optionally) pose
/// extraction follow, each consuming the previous step's output.
#[instrument(skip_all, name = "docking_workflow")]
pub fn run(
    receptor: &Path,
    ligand: &Path,
    work_dir: &Path,
    tools: &ToolPaths,
    options: &DockOptions,
    reporter: &ProgressReporter,
) -> Result<DockResult, EngineError> {
    reporter.report(Progress::PhaseStart { name: "Docking" });
    std::fs::create_dir_all(work_dir)?;
    let work_dir = std::path::absolute(work_dir)?;

    let receptor = stage_into(receptor, &work_dir)?;
    let ligand = stage_into(ligand, &work_dir)?;
    for input in [&receptor, &ligand] {
        if ensure_end_record(input)? {
            debug!(path = %input.display(), "Appended END record.");
        }
    }

    let runner = ZdockRunner::new(tools, &work_dir).with_timeout(options.docking.timeout);

    reporter.report(Progress::StatusUpdate {
        text: "Marking surface residues".to_string(),
    });
    let mark = |input: &Path| -> Result<PathBuf, EngineError> {
        let name = input.file_name().map(PathBuf::from).unwrap_or_default();
        runner.mark_surface(&name, Path::new(&marked_file_name(input)))
    };
    let receptor_marked = mark(&receptor)?;
    let ligand_marked = mark(&ligand)?;

    reporter.report(Progress::StatusUpdate {
        text: "Running docking search".to_string(),
    });
    let output = runner.dock(
        Path::new(&marked_file_name(&receptor)),
        Path::new(&marked_file_name(&ligand)),
        &options.docking,
    )?;

    let poses = match options.poses {
        Some(count) => {
            reporter.report(Progress::StatusUpdate {
                text: format!("Extracting {} poses", count),
            });
            runner.extract_poses(Path::new(&options.docking.output_name), count)?
        }
        None => Vec::new(),
    };

    info!(output = %output.display(), poses = poses.len(), "Docking stage finished.");
    reporter.report(Progress::PhaseFinish);
    Ok(DockResult {
        receptor,
        ligand,
        receptor_marked,
        ligand_marked,
        output,
        poses,
    })
}
