use super::{RefinementOutput, RefinementRequest, Refiner};
use crate::core::io::energy_table::{parse_best_cluster, read_energy_table};
use crate::engine::config::ToolPaths;
use crate::engine::error::EngineError;
use crate::engine::process::{ToolCommand, run_tool};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// One molecule of the restraint definition consumed by the restraint generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestraintEntry {
    pub id: u32,
    pub chain: String,
    pub active: Vec<isize>,
    pub passive: Vec<isize>,
    pub structure: String,
    pub target: Vec<u32>,
    pub passive_from_active: bool,
    pub filter_buried: bool,
}

/// Restraint entries for the receptor (id 1) and ligand (id 2), each targeting the other.
pub fn restraint_entries(request: &RefinementRequest) -> Vec<RestraintEntry> {
    let entry = |id: u32, chain: char, structure: &str, target: u32| RestraintEntry {
        id,
        chain: chain.to_string(),
        active: request.interface.get(chain).to_vec(),
        passive: Vec::new(),
        structure: structure.to_string(),
        target: vec![target],
        passive_from_active: true,
        filter_buried: true,
    };
    vec![
        entry(1, request.receptor_chain, &request.receptor, 2),
        entry(2, request.ligand_chain, &request.ligand, 1),
    ]
}

/// Renders the run parameter file of the refinement tool.
pub fn render_run_param(haddock_dir: &Path, run_number: u32, entries: &[RestraintEntry]) -> String {
    let mut content = format!(
        "AMBIG_TBL=./restraints.tbl\nHADDOCK_DIR={}/\nRUN_NUMBER={}\nN_COMP={}\nPROJECT_DIR=.\n",
        haddock_dir.display(),
        run_number,
        entries.len()
    );
    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(content, "PDB_FILE{}={}", i + 1, entry.structure);
        let _ = writeln!(content, "PROT_SEGID_{}={}", i + 1, entry.chain);
    }
    content
}

/// Directory of the water-refined structures of a run, relative to its project.
pub fn analysis_dir(work_dir: &Path, run_number: u32) -> PathBuf {
    work_dir
        .join(format!("run{}", run_number))
        .join("structures")
        .join("it1")
        .join("water")
}

/// Refinement through the HADDOCK toolchain.
pub struct HaddockRefiner {
    tools: ToolPaths,
    run_number: u32,
    analysis_best: u32,
}

impl HaddockRefiner {
    pub fn new(tools: ToolPaths, run_number: u32, analysis_best: u32) -> Self {
        Self {
            tools,
            run_number,
            analysis_best,
        }
    }

    fn write_inputs(&self, request: &RefinementRequest) -> Result<(), EngineError> {
        let entries = restraint_entries(request);
        let json_path = request.work_dir.join("output.json");
        let writer = BufWriter::new(File::create(&json_path)?);
        serde_json::to_writer_pretty(writer, &entries)
            .map_err(|e| EngineError::Internal(format!("failed to write restraint input: {}", e)))?;

        run_tool(
            &ToolCommand::new(&self.tools.haddock_restraints)
                .arg("tbl")
                .arg("output.json")
                .current_dir(&request.work_dir)
                .stdout_to(request.work_dir.join("restraints.tbl"))
                .timeout(request.timeout),
        )?;

        std::fs::write(
            request.work_dir.join("run.param"),
            render_run_param(&self.tools.haddock, self.run_number, &entries),
        )?;
        Ok(())
    }

    fn run_protocol(&self, request: &RefinementRequest) -> Result<(), EngineError> {
        let run_dir = request.work_dir.join(format!("run{}", self.run_number));
        // The first invocation sets up the run directory, the second runs the protocol.
        for dir in [&request.work_dir, &run_dir] {
            if !dir.is_dir() {
                return Err(EngineError::MissingOutput { path: dir.clone() });
            }
            run_tool(
                &ToolCommand::new(&self.tools.python)
                    .arg(self.tools.haddock_script())
                    .current_dir(dir)
                    .timeout(request.timeout),
            )?;
        }
        Ok(())
    }

    fn analyse(&self, request: &RefinementRequest) -> Result<RefinementOutput, EngineError> {
        let analysis_dir = analysis_dir(&request.work_dir, self.run_number);
        if !analysis_dir.is_dir() {
            return Err(EngineError::MissingOutput { path: analysis_dir });
        }
        run_tool(
            &ToolCommand::new(self.tools.cluster_analysis_script())
                .arg("-best")
                .arg(self.analysis_best.to_string())
                .arg("analysis/cluster.out")
                .current_dir(&analysis_dir)
                .timeout(request.timeout),
        )?;

        let score_file = analysis_dir.join(format!("cluster_haddock-score.txt_best{}", self.analysis_best));
        let text = std::fs::read_to_string(&score_file)
            .map_err(|_| EngineError::MissingOutput { path: score_file.clone() })?;
        let (cluster, score) = parse_best_cluster(&text).ok_or(EngineError::NoRepresentative {
            cluster_id: request.cluster_id,
        })?;
        info!(cluster_id = request.cluster_id, haddock_cluster = %cluster, score, "Selected best refinement cluster.");

        Ok(RefinementOutput {
            interaction: read_energy_table(&analysis_dir, &cluster, "ener")?,
            desolvation: read_energy_table(&analysis_dir, &cluster, "Edesolv")?,
            analysis_dir,
        })
    }
}

impl Refiner for HaddockRefiner {
    #[instrument(skip_all, name = "haddock_refinement", fields(cluster_id = request.cluster_id))]
    fn refine(&self, request: &RefinementRequest) -> Result<RefinementOutput, EngineError> {
        self.write_inputs(request)?;
        self.run_protocol(request)?;
        self.analyse(request)
    }
}
