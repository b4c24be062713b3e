use std::collections::HashSet;
use thiserror::Error;

/// Name of the join-key column shared by the refinement tool's energy tables.
pub const STRUCTURE_COLUMN: &str = "#struc";
pub const EVDW: &str = "Evdw";
pub const EELEC: &str = "Eelec";
pub const EDESOLV: &str = "Edesolv";

/// Terms summed into the combined score, in summation order.
pub const SCORE_TERMS: [&str; 3] = [EVDW, EELEC, EDESOLV];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Energy term '{term}' is missing for structure '{structure}'")]
pub struct MissingTermError {
    pub structure: String,
    pub term: String,
}

/// Named energy terms of one structure, in table column order.
///
/// Values the producing tool wrote as non-numeric are stored as NaN and reported as
/// absent by [`EnergyRecord::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRecord {
    pub structure: String,
    terms: Vec<(String, f64)>,
}

impl EnergyRecord {
    pub fn new(structure: impl Into<String>, terms: Vec<(String, f64)>) -> Self {
        Self {
            structure: structure.into(),
            terms,
        }
    }

    /// Value of `term`, or `None` if the term is absent or undefined.
    pub fn get(&self, term: &str) -> Option<f64> {
        self.terms
            .iter()
            .find(|(name, _)| name == term)
            .map(|(_, value)| *value)
            .filter(|value| !value.is_nan())
    }

    pub fn terms(&self) -> impl Iterator<Item = (&str, f64)> {
        self.terms.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Sum of van der Waals, electrostatic and desolvation energies. Lower is better.
    pub fn combined_score(&self) -> Result<f64, MissingTermError> {
        SCORE_TERMS.iter().try_fold(0.0, |acc, term| {
            self.get(term).map(|v| acc + v).ok_or_else(|| MissingTermError {
                structure: self.structure.clone(),
                term: term.to_string(),
            })
        })
    }
}

/// A table of energy records keyed by structure identifier, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyTable {
    columns: Vec<String>,
    rows: Vec<EnergyRecord>,
}

impl EnergyTable {
    /// Creates an empty table with the given term columns (the key column excluded).
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row. Missing trailing values are stored as undefined.
    pub fn push_row(&mut self, structure: impl Into<String>, values: &[f64]) {
        let terms = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), values.get(i).copied().unwrap_or(f64::NAN)))
            .collect();
        self.rows.push(EnergyRecord::new(structure, terms));
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[EnergyRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&EnergyRecord> {
        self.rows.first()
    }

    pub fn get(&self, structure: &str) -> Option<&EnergyRecord> {
        self.rows.iter().find(|r| r.structure == structure)
    }

    /// Inner join on structure identifier.
    ///
    /// Rows keep this table's relative order. A structure present in only one table is
    /// dropped silently. Columns of `other` already present in `self` are not repeated.
    pub fn inner_join(&self, other: &EnergyTable) -> EnergyTable {
        let known: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        let extra: Vec<&String> = other
            .columns
            .iter()
            .filter(|c| !known.contains(c.as_str()))
            .collect();

        let mut columns = self.columns.clone();
        columns.extend(extra.iter().map(|c| (*c).clone()));

        let mut rows = Vec::new();
        for left in &self.rows {
            for right in other.rows.iter().filter(|r| r.structure == left.structure) {
                let mut terms = left.terms.clone();
                for column in &extra {
                    let value = right
                        .terms
                        .iter()
                        .find(|(name, _)| name == *column)
                        .map_or(f64::NAN, |(_, v)| *v);
                    terms.push(((*column).clone(), value));
                }
                rows.push(EnergyRecord::new(left.structure.clone(), terms));
            }
        }

        EnergyTable { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interaction(ids: &[&str]) -> EnergyTable {
        let mut table = EnergyTable::new(vec![EVDW.into(), EELEC.into()]);
        for (i, id) in ids.iter().enumerate() {
            table.push_row(*id, &[-10.0 - i as f64, -5.0]);
        }
        table
    }

    fn desolvation(ids: &[&str]) -> EnergyTable {
        let mut table = EnergyTable::new(vec![EDESOLV.into()]);
        for id in ids {
            table.push_row(*id, &[2.0]);
        }
        table
    }

    #[test]
    fn inner_join_keeps_common_structures_in_left_order() {
        let merged = interaction(&["s3.pdb", "s1.pdb", "s2.pdb"]).inner_join(&desolvation(&["s2.pdb", "s3.pdb", "s4.pdb"]));
        let ids: Vec<&str> = merged.rows().iter().map(|r| r.structure.as_str()).collect();
        assert_eq!(ids, vec!["s3.pdb", "s2.pdb"]);
        assert_eq!(merged.columns(), &["Evdw", "Eelec", "Edesolv"]);
        assert_eq!(merged.first().unwrap().get(EDESOLV), Some(2.0));
    }

    #[test]
    fn inner_join_of_overlapping_structure_sets() {
        let mut desolv = EnergyTable::new(vec![EDESOLV.into()]);
        desolv.push_row("2", &[2.5]);
        desolv.push_row("3", &[3.5]);
        desolv.push_row("4", &[4.5]);

        let merged = interaction(&["1", "2", "3"]).inner_join(&desolv);
        let ids: Vec<&str> = merged.rows().iter().map(|r| r.structure.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);

        let row2 = merged.get("2").unwrap();
        assert_eq!(row2.get(EVDW), Some(-11.0));
        assert_eq!(row2.get(EDESOLV), Some(2.5));
        let row3 = merged.get("3").unwrap();
        assert_eq!(row3.get(EVDW), Some(-12.0));
        assert_eq!(row3.get(EDESOLV), Some(3.5));
        assert!(merged.get("1").is_none());
        assert!(merged.get("4").is_none());
    }

    #[test]
    fn inner_join_with_no_match_is_empty() {
        let merged = interaction(&["a"]).inner_join(&desolvation(&["b"]));
        assert!(merged.is_empty());
        assert!(interaction(&["a"]).inner_join(&EnergyTable::default()).is_empty());
    }

    #[test]
    fn combined_score_sums_three_terms() {
        let record = EnergyRecord::new(
            "s1.pdb",
            vec![
                (EVDW.into(), -10.0),
                (EELEC.into(), -5.0),
                (EDESOLV.into(), 2.0),
            ],
        );
        assert_eq!(record.combined_score(), Ok(-13.0));
    }

    #[test]
    fn combined_score_names_the_missing_term() {
        let mut table = EnergyTable::new(vec![EVDW.into(), EELEC.into(), EDESOLV.into()]);
        table.push_row("s1.pdb", &[-10.0, f64::NAN, 1.0]);
        table.push_row("s2.pdb", &[-10.0, -1.0]);

        let err = table.rows()[0].combined_score().unwrap_err();
        assert_eq!(err.term, EELEC);
        assert_eq!(err.structure, "s1.pdb");
        assert_eq!(table.rows()[1].combined_score().unwrap_err().term, EDESOLV);
    }

    #[test]
    fn nan_terms_read_as_absent() {
        let record = EnergyRecord::new("x", vec![(EVDW.into(), f64::NAN)]);
        assert_eq!(record.get(EVDW), None);
        assert_eq!(record.get("Eair"), None);
        assert_eq!(record.terms().count(), 1);
    }
}
