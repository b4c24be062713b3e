use crate::core::clustering::ClusterTable;
use crate::core::io::cluster_log::read_cluster_log;
use crate::engine::config::{ClusteringConfig, ToolPaths};
use crate::engine::error::EngineError;
use crate::engine::process::{ToolCommand, run_tool};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const CLUSTER_LOG: &str = "cluster.log";

/// Concatenates poses into one multi-frame file the clustering tool can read.
///
/// Every pose is preceded by a `TITLE` record carrying its 1-based frame number and
/// followed by `ENDMDL`.
pub fn combine_poses(poses: &[PathBuf], combined: &Path) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(combined)?);
    for (index, pose) in poses.iter().enumerate() {
        writeln!(out, "TITLE     AAA t=  {}", index + 1)?;
        let content = std::fs::read_to_string(pose)?;
        out.write_all(content.as_bytes())?;
        if !content.is_empty() && !content.ends_with('\n') {
            writeln!(out)?;
        }
        writeln!(out, "ENDMDL")?;
    }
    out.flush()
}

/// Clusters `poses` with the structural-clustering tool and parses its log.
///
/// The first pose serves as the reference structure.
pub fn cluster_poses(
    tools: &ToolPaths,
    work_dir: &Path,
    poses: &[PathBuf],
    config: &ClusteringConfig,
) -> Result<ClusterTable, EngineError> {
    let reference = poses
        .first()
        .ok_or_else(|| EngineError::Internal("no poses to cluster".to_string()))?;
    let combined = work_dir.join(format!("{}_combined.pdb", config.output_prefix));
    combine_poses(poses, &combined)?;

    info!(poses = poses.len(), cutoff = config.cutoff, "Clustering docking poses.");
    let command = ToolCommand::new(&tools.gromacs)
        .arg("cluster")
        .arg("-f")
        .arg(&combined)
        .arg("-s")
        .arg(reference)
        .arg("-cutoff")
        .arg(config.cutoff.to_string())
        .args(&config.extra_options)
        .current_dir(work_dir)
        .stdin(config.group.clone())
        .timeout(config.timeout);
    run_tool(&command)?;

    let log = work_dir.join(CLUSTER_LOG);
    if !log.exists() {
        return Err(EngineError::MissingOutput { path: log });
    }
    let table = read_cluster_log(&log)?;
    info!(clusters = table.len(), "Parsed clustering results.");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_file_frames_each_pose() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("complex.1.pdb");
        let second = dir.path().join("complex.2.pdb");
        std::fs::write(&first, "ATOM 1\nEND\n").unwrap();
        std::fs::write(&second, "ATOM 2").unwrap();

        let combined = dir.path().join("cluster_combined.pdb");
        combine_poses(&[first, second], &combined).unwrap();
        assert_eq!(
            std::fs::read_to_string(&combined).unwrap(),
            "TITLE     AAA t=  1\nATOM 1\nEND\nENDMDL\nTITLE     AAA t=  2\nATOM 2\nENDMDL\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn clustering_reads_the_log_written_by_the_tool() {
        use crate::engine::config::ToolPathsBuilder;
        use std::os::unix::fs::PermissionsExt;

        let install = tempfile::tempdir().unwrap();
        let gmx = install.path().join("gmx");
        std::fs::write(
            &gmx,
            "#!/bin/sh\nread group\nprintf '  1 |   2 0.2 |   1 .1 |   1   2\\n' > cluster.log\necho \"$group $@\" > args.txt\n",
        )
        .unwrap();
        std::fs::set_permissions(&gmx, std::fs::Permissions::from_mode(0o755)).unwrap();
        let tools = ToolPathsBuilder::new()
            .zdock("/opt/zdock")
            .haddock("/opt/haddock")
            .gromacs(&gmx)
            .build()
            .unwrap();

        let work = tempfile::tempdir().unwrap();
        let poses: Vec<PathBuf> = (1..=2)
            .map(|i| {
                let p = work.path().join(format!("complex.{}.pdb", i));
                std::fs::write(&p, "END\n").unwrap();
                p
            })
            .collect();

        let table = cluster_poses(&tools, work.path(), &poses, &ClusteringConfig::default()).unwrap();
        assert_eq!(table.cluster_ids(), vec![1]);
        assert_eq!(table.records()[0].members, vec!["1", "2"]);

        let args = std::fs::read_to_string(work.path().join("args.txt")).unwrap();
        assert!(args.starts_with("3 cluster -f "));
        assert!(args.trim_end().ends_with("-cutoff 0.45"));
        assert!(work.path().join("cluster_combined.pdb").exists());
    }

    #[test]
    fn clustering_without_poses_is_rejected() {
        let tools = crate::engine::config::ToolPathsBuilder::new()
            .zdock("z")
            .haddock("h")
            .gromacs("g")
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            cluster_poses(&tools, dir.path(), &[], &ClusteringConfig::default()),
            Err(EngineError::Internal(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn clustering_honours_its_own_timeout() {
        use crate::engine::config::ToolPathsBuilder;
        use crate::engine::process::ProcessError;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;

        let install = tempfile::tempdir().unwrap();
        let gmx = install.path().join("gmx");
        std::fs::write(&gmx, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&gmx, std::fs::Permissions::from_mode(0o755)).unwrap();
        let tools = ToolPathsBuilder::new()
            .zdock("/opt/zdock")
            .haddock("/opt/haddock")
            .gromacs(&gmx)
            .build()
            .unwrap();

        let work = tempfile::tempdir().unwrap();
        let pose = work.path().join("complex.1.pdb");
        std::fs::write(&pose, "END\n").unwrap();
        let config = ClusteringConfig {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        assert!(matches!(
            cluster_poses(&tools, work.path(), &[pose], &config),
            Err(EngineError::Process(ProcessError::Timeout { .. }))
        ));
    }
}
