use crate::core::energy::EnergyTable;
use phf::{Map, phf_map};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Column layouts of the per-cluster tables written by the refinement analysis, keyed by
/// file suffix. The first column is the structure identifier.
pub static TABLE_LAYOUTS: Map<&'static str, &'static [&'static str]> = phf_map! {
    "ener" => &[
        "#struc", "Einter", "Enb", "Evdw+0.1Eelec", "Evdw", "Eelec", "Eair",
        "Ecdih", "Ecoup", "Esani", "Evean", "Edani",
    ],
    "Edesolv" => &["#struc", "Edesolv"],
};

#[derive(Debug, Error)]
pub enum EnergyTableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unknown energy table kind '{0}'")]
    UnknownLayout(String),
    #[error("Line {line}: expected at most {expected} columns, found {found}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// Parses a whitespace-delimited energy table with the given column layout.
///
/// Blank lines and lines starting with `#` are skipped. Non-numeric values become
/// undefined (NaN), as do missing trailing values.
pub fn parse_energy_table(text: &str, layout: &[&str]) -> Result<EnergyTable, EnergyTableError> {
    let mut table = EnergyTable::new(layout.iter().skip(1).map(|c| c.to_string()).collect());

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() > layout.len() {
            return Err(EnergyTableError::ColumnCount {
                line: index + 1,
                expected: layout.len(),
                found: tokens.len(),
            });
        }
        let values: Vec<f64> = tokens[1..]
            .iter()
            .map(|t| t.parse().unwrap_or(f64::NAN))
            .collect();
        table.push_row(tokens[0], &values);
    }
    Ok(table)
}

/// Reads `<cluster>_<kind>` from `dir`, where `kind` is a key of [`TABLE_LAYOUTS`].
///
/// A missing file yields an empty table.
pub fn read_energy_table(dir: &Path, cluster: &str, kind: &str) -> Result<EnergyTable, EnergyTableError> {
    let layout = TABLE_LAYOUTS
        .get(kind)
        .ok_or_else(|| EnergyTableError::UnknownLayout(kind.to_string()))?;
    let path = dir.join(format!("{}_{}", cluster, kind));

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Energy table not found; treating it as empty.");
            return Ok(EnergyTable::new(
                layout.iter().skip(1).map(|c| c.to_string()).collect(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let table = parse_energy_table(&text, layout)?;
    debug!(path = %path.display(), rows = table.len(), "Read energy table.");
    Ok(table)
}

/// Picks the cluster with the lowest score from a `cluster score ...` listing.
///
/// Lines that are blank, commented, too short or carry a non-numeric score are skipped.
/// Returns `None` when no line qualifies. Ties keep the first cluster listed.
pub fn parse_best_cluster(text: &str) -> Option<(String, f64)> {
    let mut best: Option<(String, f64)> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(name), Some(raw)) = (tokens.next(), tokens.next()) else {
            continue;
        };
        let Ok(score) = raw.parse::<f64>() else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, b)| score < *b) {
            best = Some((name.to_string(), score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::energy::{EDESOLV, EELEC, EVDW};

    const ENER: &str = "\
#struc Einter Enb Evdw+0.1Eelec Evdw Eelec Eair Ecdih Ecoup Esani Evean Edani
complex_12w.pdb -310.5 -280.1 -60.2 -45.3 -148.7 30.4 0 0 0 0 0
complex_3w.pdb  -290.0 -250.0 -55.0 -40.0 -150.0 40.0 0 0 0 0 0

complex_7w.pdb  -200.0 -180.0 -50.0 nan -130.0 20.0 0 0 0 0 0
";

    #[test]
    fn parses_interaction_table_with_header_and_blank_lines() {
        let table = parse_energy_table(ENER, TABLE_LAYOUTS["ener"]).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.columns().len(), 11);
        let first = table.first().unwrap();
        assert_eq!(first.structure, "complex_12w.pdb");
        assert_eq!(first.get(EVDW), Some(-45.3));
        assert_eq!(first.get(EELEC), Some(-148.7));
        assert_eq!(table.get("complex_7w.pdb").unwrap().get(EVDW), None);
    }

    #[test]
    fn short_rows_pad_with_undefined_values() {
        let table = parse_energy_table("a.pdb\nb.pdb 3.5\n", TABLE_LAYOUTS["Edesolv"]).unwrap();
        assert_eq!(table.get("a.pdb").unwrap().get(EDESOLV), None);
        assert_eq!(table.get("b.pdb").unwrap().get(EDESOLV), Some(3.5));
    }

    #[test]
    fn long_rows_are_rejected() {
        let err = parse_energy_table("a.pdb 1 2\n", TABLE_LAYOUTS["Edesolv"]).unwrap_err();
        assert!(matches!(
            err,
            EnergyTableError::ColumnCount {
                line: 1,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn missing_file_reads_as_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = read_energy_table(dir.path(), "file.nam_clust1", "Edesolv").unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns(), &["Edesolv"]);
    }

    #[test]
    fn reads_tables_by_cluster_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.nam_clust2_ener"), ENER).unwrap();
        std::fs::write(
            dir.path().join("file.nam_clust2_Edesolv"),
            "#struc Edesolv\ncomplex_3w.pdb 4.1\ncomplex_12w.pdb 2.2\n",
        )
        .unwrap();

        let ener = read_energy_table(dir.path(), "file.nam_clust2", "ener").unwrap();
        let desolv = read_energy_table(dir.path(), "file.nam_clust2", "Edesolv").unwrap();
        let merged = ener.inner_join(&desolv);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.first().unwrap().structure, "complex_12w.pdb");
        assert_eq!(merged.first().unwrap().get(EDESOLV), Some(2.2));

        assert!(matches!(
            read_energy_table(dir.path(), "file.nam_clust2", "water"),
            Err(EnergyTableError::UnknownLayout(_))
        ));
    }

    #[test]
    fn best_cluster_has_lowest_score() {
        let text = "\
#Cluster haddock-score sd
file.nam_clust1 -98.2 3.1
file.nam_clust2 -120.4 5.0
file.nam_clust3 n/a
file.nam_clust4 -120.4 1.0
broken
";
        let (name, score) = parse_best_cluster(text).unwrap();
        assert_eq!(name, "file.nam_clust2");
        assert_eq!(score, -120.4);
        assert_eq!(parse_best_cluster("# only a header\n"), None);
    }
}
