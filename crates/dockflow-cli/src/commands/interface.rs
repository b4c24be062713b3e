use crate::cli::InterfaceArgs;
use crate::error::{CliError, Result};
use dockflow::core::interface::{InterfaceSearch, interface_residues_with};
use dockflow::core::io::pdb::PdbFile;
use dockflow::core::io::traits::StructureFile;
use std::str::FromStr;
use tracing::info;

pub async fn run(args: InterfaceArgs) -> Result<()> {
    let search = InterfaceSearch::from_str(&args.search).map_err(|e| CliError::Argument(e.to_string()))?;

    info!("Loading structure from {:?}", &args.pdb);
    let (structure, metadata) = PdbFile::read_from_path(&args.pdb).map_err(|e| CliError::FileParsing {
        path: args.pdb.clone(),
        source: e.into(),
    })?;
    info!(
        models = metadata.model_count,
        skipped = metadata.skipped_records.len(),
        "Structure loaded."
    );

    let result = interface_residues_with(&structure, args.chain1, args.chain2, args.distance, search)
        .map_err(|e| CliError::Dockflow(e.into()))?;

    println!(
        "Interface residues between chains {} and {} (within {} Å):",
        args.chain1, args.chain2, args.distance
    );
    print!("{}", result);
    Ok(())
}
