use crate::core::clustering::ClusterTable;
use crate::core::energy::EnergyRecord;
use crate::core::interface::interface_residues_with;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::engine::config::RefinementConfig;
use crate::engine::error::EngineError;
use crate::engine::tools::zdock::pose_file_name;
use crate::engine::tools::{RefinementRequest, Refiner};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// The selected refined structure of one cluster with its merged energy terms.
#[derive(Debug, Clone, PartialEq)]
pub struct RepresentativeStructure {
    pub cluster_id: u32,
    /// Absolute path of the selected structure file.
    pub path: PathBuf,
    pub energy: EnergyRecord,
}

/// Read-only inputs shared by every refinement task of a run.
pub struct RefineContext<'a> {
    pub table: &'a ClusterTable,
    /// Directory holding the `complex.<member>.pdb` poses.
    pub pose_dir: &'a Path,
    /// Parent of the per-cluster working directories.
    pub work_root: &'a Path,
    pub receptor: &'a Path,
    pub ligand: &'a Path,
    pub config: &'a RefinementConfig,
    pub refiner: &'a dyn Refiner,
}

/// Working directory of one cluster. Distinct cluster ids never share a directory.
pub fn cluster_work_dir(work_root: &Path, cluster_id: u32) -> PathBuf {
    work_root.join(format!("Pos{}", cluster_id))
}

fn stage_input(source: &Path, work_dir: &Path) -> Result<String, EngineError> {
    let name = source
        .file_name()
        .ok_or_else(|| EngineError::Internal(format!("'{}' has no file name", source.display())))?;
    std::fs::copy(source, work_dir.join(name))?;
    Ok(name.to_string_lossy().into_owned())
}

/// Refines one cluster and picks its representative structure.
///
/// The cluster's first member is the pose carried forward. Its interface residues become
/// the restraints of the refinement, which runs in `Pos<cluster_id>` under the work root.
#[instrument(skip_all, name = "refine_cluster", fields(cluster_id = cluster_id))]
pub fn refine_cluster(cluster_id: u32, ctx: &RefineContext) -> Result<RepresentativeStructure, EngineError> {
    let record = ctx
        .table
        .get(cluster_id)
        .ok_or(EngineError::ClusterNotFound { cluster_id })?;
    let member = record
        .first_member()
        .ok_or(EngineError::NoRepresentative { cluster_id })?;

    let pose = ctx.pose_dir.join(pose_file_name(member));
    let (structure, _) = PdbFile::read_from_path(&pose)?;
    let interface = interface_residues_with(
        &structure,
        ctx.config.receptor_chain,
        ctx.config.ligand_chain,
        ctx.config.interface_distance,
        ctx.config.interface_search,
    )?;
    debug!(pose = %pose.display(), "Computed interface residues:\n{}", interface);

    let work_dir = std::path::absolute(cluster_work_dir(ctx.work_root, cluster_id))?;
    std::fs::create_dir_all(&work_dir)?;
    let request = RefinementRequest {
        cluster_id,
        receptor: stage_input(ctx.receptor, &work_dir)?,
        ligand: stage_input(ctx.ligand, &work_dir)?,
        work_dir,
        receptor_chain: ctx.config.receptor_chain,
        ligand_chain: ctx.config.ligand_chain,
        interface,
        timeout: ctx.config.timeout,
    };

    let output = ctx.refiner.refine(&request)?;
    let merged = output.interaction.inner_join(&output.desolvation);
    let energy = merged
        .first()
        .cloned()
        .ok_or(EngineError::NoRepresentative { cluster_id })?;

    let path = std::path::absolute(output.analysis_dir.join(&energy.structure))?;
    info!(path = %path.display(), "Selected representative structure.");
    Ok(RepresentativeStructure {
        cluster_id,
        path,
        energy,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::clustering::ClusterRecord;
    use crate::core::energy::{EDESOLV, EELEC, EVDW, EnergyTable};
    use crate::core::interface::InterfaceError;
    use crate::core::io::pdb::tests::atom_line;
    use crate::engine::tools::RefinementOutput;
    use std::sync::Mutex;

    /// Writes a two-chain pose where only A:3 and B:2 are in contact.
    pub(crate) fn write_pose(dir: &Path, member: &str) {
        let mut lines = Vec::new();
        let mut serial = 1;
        for i in 1..=5 {
            lines.push(atom_line(serial, "CA", "ALA", 'A', i, [i as f64 * 20.0, 0.0, 0.0]));
            serial += 1;
        }
        for j in 1..=5 {
            let xyz = if j == 2 { [60.0, 3.0, 0.0] } else { [j as f64 * 20.0, 50.0, 0.0] };
            lines.push(atom_line(serial, "CA", "GLY", 'B', j, xyz));
            serial += 1;
        }
        lines.push("END".to_string());
        std::fs::write(dir.join(pose_file_name(member)), lines.join("\n")).unwrap();
    }

    pub(crate) fn table(ids: &[u32]) -> ClusterTable {
        ClusterTable::new(
            ids.iter()
                .map(|&id| ClusterRecord {
                    cluster_id: id,
                    structure_count: 2,
                    rmsd: Some(0.2),
                    middle_structure: id,
                    middle_rmsd: None,
                    members: vec![id.to_string(), (id + 50).to_string()],
                })
                .collect(),
        )
    }

    /// Returns canned tables and records the requests it receives.
    pub(crate) struct MockRefiner {
        pub(crate) fail_for: Option<u32>,
        pub(crate) desolvation_ids: Vec<&'static str>,
        pub(crate) seen: Mutex<Vec<RefinementRequest>>,
    }

    impl MockRefiner {
        pub(crate) fn new() -> Self {
            Self {
                fail_for: None,
                desolvation_ids: vec!["best.pdb", "other.pdb"],
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Refiner for MockRefiner {
        fn refine(&self, request: &RefinementRequest) -> Result<RefinementOutput, EngineError> {
            self.seen.lock().unwrap().push(request.clone());
            if self.fail_for == Some(request.cluster_id) {
                return Err(EngineError::Internal("refinement crashed".into()));
            }
            let mut interaction = EnergyTable::new(vec![EVDW.into(), EELEC.into()]);
            interaction.push_row("best.pdb", &[-10.0, -5.0 - request.cluster_id as f64]);
            interaction.push_row("other.pdb", &[-1.0, -1.0]);
            let mut desolvation = EnergyTable::new(vec![EDESOLV.into()]);
            for id in &self.desolvation_ids {
                desolvation.push_row(*id, &[2.0]);
            }
            Ok(RefinementOutput {
                analysis_dir: request.work_dir.join("water"),
                interaction,
                desolvation,
            })
        }
    }

    pub(crate) struct Fixture {
        pub(crate) dir: tempfile::TempDir,
        pub(crate) config: RefinementConfig,
    }

    impl Fixture {
        pub(crate) fn new(ids: &[u32]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for id in ids {
                write_pose(dir.path(), &id.to_string());
            }
            std::fs::write(dir.path().join("receptor.pdb"), "END\n").unwrap();
            std::fs::write(dir.path().join("ligand.pdb"), "END\n").unwrap();
            Self {
                dir,
                config: RefinementConfig::default(),
            }
        }

        pub(crate) fn receptor(&self) -> PathBuf {
            self.dir.path().join("receptor.pdb")
        }

        pub(crate) fn ligand(&self) -> PathBuf {
            self.dir.path().join("ligand.pdb")
        }
    }

    #[test]
    fn representative_is_first_merged_row() {
        let fixture = Fixture::new(&[4]);
        let table = table(&[4]);
        let refiner = MockRefiner::new();
        let (receptor, ligand) = (fixture.receptor(), fixture.ligand());
        let ctx = RefineContext {
            table: &table,
            pose_dir: fixture.dir.path(),
            work_root: fixture.dir.path(),
            receptor: &receptor,
            ligand: &ligand,
            config: &fixture.config,
            refiner: &refiner,
        };

        let rep = refine_cluster(4, &ctx).unwrap();
        assert_eq!(rep.cluster_id, 4);
        assert!(rep.path.is_absolute());
        assert!(rep.path.ends_with("Pos4/water/best.pdb"));
        assert_eq!(rep.energy.combined_score(), Ok(-10.0 - 9.0 + 2.0));

        let seen = refiner.seen.lock().unwrap();
        assert_eq!(seen[0].interface.get('A'), &[3]);
        assert_eq!(seen[0].interface.get('B'), &[2]);
        assert_eq!(seen[0].receptor, "receptor.pdb");
        assert!(seen[0].work_dir.join("receptor.pdb").exists());
        assert!(seen[0].work_dir.join("ligand.pdb").exists());
    }

    #[test]
    fn unknown_cluster_is_reported() {
        let fixture = Fixture::new(&[1]);
        let table = table(&[1]);
        let refiner = MockRefiner::new();
        let (receptor, ligand) = (fixture.receptor(), fixture.ligand());
        let ctx = RefineContext {
            table: &table,
            pose_dir: fixture.dir.path(),
            work_root: fixture.dir.path(),
            receptor: &receptor,
            ligand: &ligand,
            config: &fixture.config,
            refiner: &refiner,
        };
        assert!(matches!(
            refine_cluster(9, &ctx),
            Err(EngineError::ClusterNotFound { cluster_id: 9 })
        ));
    }

    #[test]
    fn empty_merge_has_no_representative() {
        let fixture = Fixture::new(&[2]);
        let table = table(&[2]);
        let mut refiner = MockRefiner::new();
        refiner.desolvation_ids = vec!["unrelated.pdb"];
        let (receptor, ligand) = (fixture.receptor(), fixture.ligand());
        let ctx = RefineContext {
            table: &table,
            pose_dir: fixture.dir.path(),
            work_root: fixture.dir.path(),
            receptor: &receptor,
            ligand: &ligand,
            config: &fixture.config,
            refiner: &refiner,
        };
        assert!(matches!(
            refine_cluster(2, &ctx),
            Err(EngineError::NoRepresentative { cluster_id: 2 })
        ));
    }

    #[test]
    fn missing_chain_in_pose_fails_the_task() {
        let mut fixture = Fixture::new(&[3]);
        fixture.config.ligand_chain = 'C';
        let table = table(&[3]);
        let refiner = MockRefiner::new();
        let (receptor, ligand) = (fixture.receptor(), fixture.ligand());
        let ctx = RefineContext {
            table: &table,
            pose_dir: fixture.dir.path(),
            work_root: fixture.dir.path(),
            receptor: &receptor,
            ligand: &ligand,
            config: &fixture.config,
            refiner: &refiner,
        };
        assert!(matches!(
            refine_cluster(3, &ctx),
            Err(EngineError::Interface(InterfaceError::ChainNotFound('C')))
        ));
        assert!(refiner.seen.lock().unwrap().is_empty());
    }
}
