use crate::engine::config::{DockingConfig, ToolPaths};
use crate::engine::error::EngineError;
use crate::engine::process::{ToolCommand, run_tool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// File name of the complex written by the pose extractor for a ranked prediction.
pub fn pose_file_name(member: &str) -> String {
    format!("complex.{}.pdb", member)
}

/// File name of the surface-marked copy of a structure: `<stem>_m.pdb`.
pub fn marked_file_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}_m.pdb", stem)
}

/// Drives the rigid-body docking tool and its helpers inside one work directory.
pub struct ZdockRunner<'a> {
    tools: &'a ToolPaths,
    work_dir: PathBuf,
    timeout: Option<Duration>,
}

impl<'a> ZdockRunner<'a> {
    pub fn new(tools: &'a ToolPaths, work_dir: impl AsRef<Path>) -> Self {
        Self {
            tools,
            work_dir: work_dir.as_ref().to_path_buf(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn stage_helper(&self, name: &str) -> Result<(), EngineError> {
        let source = self.tools.zdock_file(name);
        let target = self.work_dir.join(name);
        debug!(source = %source.display(), "Staging docking helper.");
        std::fs::copy(&source, &target)?;
        Ok(())
    }

    fn command(&self, name: &str) -> ToolCommand {
        ToolCommand::new(self.tools.zdock_file(name))
            .current_dir(&self.work_dir)
            .timeout(self.timeout)
    }

    /// Marks surface residues of `input`, writing `output` (both relative to the work dir
    /// or absolute).
    pub fn mark_surface(&self, input: &Path, output: &Path) -> Result<PathBuf, EngineError> {
        self.stage_helper("uniCHARMM")?;
        run_tool(&self.command("mark_sur").arg(input).arg(output))?;
        let produced = self.work_dir.join(output);
        if !produced.exists() {
            return Err(EngineError::MissingOutput { path: produced });
        }
        Ok(produced)
    }

    /// Runs the docking search and returns the path of its output file.
    pub fn dock(
        &self,
        receptor: &Path,
        ligand: &Path,
        config: &DockingConfig,
    ) -> Result<PathBuf, EngineError> {
        info!(
            predictions = config.num_predictions,
            seed = config.seed,
            "Running rigid-body docking search."
        );
        let mut command = self
            .command("zdock")
            .arg("-R")
            .arg(receptor)
            .arg("-L")
            .arg(ligand)
            .arg("-o")
            .arg(&config.output_name)
            .arg("-N")
            .arg(config.num_predictions.to_string())
            .arg("-S")
            .arg(config.seed.to_string());
        if config.dense_rotational_sampling {
            command = command.arg("-D");
        }
        if config.fix_receptor {
            command = command.arg("-F");
        }
        run_tool(&command)?;

        let output = self.work_dir.join(&config.output_name);
        if !output.exists() {
            return Err(EngineError::MissingOutput { path: output });
        }
        Ok(output)
    }

    /// Writes the top `count` predictions as `complex.<i>.pdb` and returns their paths in
    /// rank order.
    pub fn extract_poses(&self, docking_output: &Path, count: usize) -> Result<Vec<PathBuf>, EngineError> {
        self.stage_helper("create_lig")?;
        run_tool(
            &self
                .command("create.pl")
                .arg(docking_output)
                .arg(count.to_string()),
        )?;

        let poses: Vec<PathBuf> = (1..=count)
            .map(|i| self.work_dir.join(pose_file_name(&i.to_string())))
            .take_while(|p| p.exists())
            .collect();
        if poses.is_empty() {
            return Err(EngineError::MissingOutput {
                path: self.work_dir.join(pose_file_name("1")),
            });
        }
        info!(poses = poses.len(), "Extracted docking poses.");
        Ok(poses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_and_marked_names_follow_tool_conventions() {
        assert_eq!(pose_file_name("17"), "complex.17.pdb");
        assert_eq!(marked_file_name(Path::new("/data/7OPB_A.pdb")), "7OPB_A_m.pdb");
        assert_eq!(marked_file_name(Path::new("ligand")), "ligand_m.pdb");
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use crate::engine::config::ToolPathsBuilder;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        fn fake_install() -> (tempfile::TempDir, ToolPaths) {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("uniCHARMM"), "params").unwrap();
            std::fs::write(dir.path().join("create_lig"), "").unwrap();
            script(dir.path(), "mark_sur", "cp \"$1\" \"$2\"");
            script(dir.path(), "zdock", "echo \"$@\" > zdock.out");
            script(
                dir.path(),
                "create.pl",
                "i=1; while [ $i -le $2 ]; do echo END > complex.$i.pdb; i=$((i+1)); done",
            );
            let tools = ToolPathsBuilder::new()
                .zdock(dir.path())
                .haddock("/opt/haddock")
                .gromacs("gmx")
                .build()
                .unwrap();
            (dir, tools)
        }

        #[test]
        fn docking_steps_produce_expected_files() {
            let (_install, tools) = fake_install();
            let work = tempfile::tempdir().unwrap();
            std::fs::write(work.path().join("rec.pdb"), "END\n").unwrap();
            let runner = ZdockRunner::new(&tools, work.path());

            let marked = runner
                .mark_surface(Path::new("rec.pdb"), Path::new("rec_m.pdb"))
                .unwrap();
            assert!(marked.exists());
            assert!(work.path().join("uniCHARMM").exists());

            let config = DockingConfig {
                seed: 42,
                fix_receptor: true,
                ..Default::default()
            };
            let output = runner
                .dock(Path::new("rec_m.pdb"), Path::new("lig_m.pdb"), &config)
                .unwrap();
            let args = std::fs::read_to_string(output).unwrap();
            assert_eq!(
                args.trim(),
                "-R rec_m.pdb -L lig_m.pdb -o zdock.out -N 2000 -S 42 -F"
            );

            let poses = runner.extract_poses(Path::new("zdock.out"), 3).unwrap();
            assert_eq!(poses.len(), 3);
            assert!(poses[2].ends_with("complex.3.pdb"));
        }
    }
}
