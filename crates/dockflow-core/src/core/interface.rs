use crate::core::models::structure::Structure;
use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::Point3;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, PartialEq)]
pub enum InterfaceError {
    #[error("Chain '{0}' not found in the structure")]
    ChainNotFound(char),
    #[error("Interface distance threshold must be a positive number, got {0}")]
    InvalidThreshold(f64),
}

/// Strategy used to find atom pairs within the threshold distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceSearch {
    /// Residue by residue, atom by atom scan with a short-circuit per residue pair.
    #[default]
    Exhaustive,
    /// Partner-chain atoms are indexed in a k-d tree and queried per atom.
    KdTree,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown interface search '{0}'. Expected 'exhaustive' or 'kdtree'.")]
pub struct ParseInterfaceSearchError(String);

impl FromStr for InterfaceSearch {
    type Err = ParseInterfaceSearchError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(InterfaceSearch::Exhaustive),
            "kdtree" | "kd-tree" => Ok(InterfaceSearch::KdTree),
            _ => Err(ParseInterfaceSearchError(s.to_string())),
        }
    }
}

/// Interface residue numbers per chain, sorted ascending and free of duplicates.
///
/// Both queried chains always have an entry, possibly empty. When the same chain is
/// given twice the two sets share a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceResult {
    residues: BTreeMap<char, Vec<isize>>,
}

impl InterfaceResult {
    fn from_sets(sets: BTreeMap<char, BTreeSet<isize>>) -> Self {
        Self {
            residues: sets
                .into_iter()
                .map(|(chain, set)| (chain, set.into_iter().collect()))
                .collect(),
        }
    }

    /// Residue numbers found for `chain`; empty if the chain was not part of the query.
    pub fn get(&self, chain: char) -> &[isize] {
        self.residues.get(&chain).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn chains(&self) -> impl Iterator<Item = char> + '_ {
        self.residues.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &[isize])> {
        self.residues.iter().map(|(c, r)| (*c, r.as_slice()))
    }

    /// True if no residue of either chain is at the interface.
    pub fn is_empty(&self) -> bool {
        self.residues.values().all(Vec::is_empty)
    }
}

impl fmt::Display for InterfaceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (chain, residues) in self.iter() {
            let list: Vec<String> = residues.iter().map(|r| r.to_string()).collect();
            writeln!(f, "{}: [{}]", chain, list.join(", "))?;
        }
        Ok(())
    }
}

/// Atom coordinates of one residue, keyed by its sequence number.
struct ResidueAtoms {
    number: isize,
    positions: Vec<Point3<f64>>,
}

fn collect_chain(structure: &Structure, chain: char) -> Result<Vec<ResidueAtoms>, InterfaceError> {
    let chain_id = structure
        .find_chain_by_id(chain)
        .ok_or(InterfaceError::ChainNotFound(chain))?;
    let chain = structure
        .chain(chain_id)
        .ok_or(InterfaceError::ChainNotFound(chain))?;

    Ok(chain
        .residues()
        .iter()
        .filter_map(|&id| {
            let residue = structure.residue(id)?;
            Some(ResidueAtoms {
                number: residue.residue_number,
                positions: structure.residue_atoms(id).map(|a| a.position).collect(),
            })
        })
        .collect())
}

fn residues_in_contact(a: &[Point3<f64>], b: &[Point3<f64>], threshold: f64) -> bool {
    let mut found = false;
    'outer: for pa in a {
        for pb in b {
            if nalgebra::distance(pa, pb) <= threshold {
                found = true;
                break 'outer;
            }
        }
    }
    found
}

/// For one residue of the first chain, the partner residue numbers it touches.
fn exhaustive_partners(residue: &ResidueAtoms, partners: &[ResidueAtoms], threshold: f64) -> Vec<isize> {
    partners
        .iter()
        .filter(|p| residues_in_contact(&residue.positions, &p.positions, threshold))
        .map(|p| p.number)
        .collect()
}

struct PartnerIndex {
    tree: ImmutableKdTree<f64, 3>,
    positions: Vec<Point3<f64>>,
    owners: Vec<isize>,
}

impl PartnerIndex {
    // Bulk construction: atoms sharing a coordinate on one axis do not overflow a bucket.
    fn build(partners: &[ResidueAtoms]) -> Self {
        let mut positions = Vec::new();
        let mut owners = Vec::new();
        for residue in partners {
            for p in &residue.positions {
                positions.push(*p);
                owners.push(residue.number);
            }
        }
        let points: Vec<[f64; 3]> = positions.iter().map(|p| [p.x, p.y, p.z]).collect();
        Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            positions,
            owners,
        }
    }

    fn partners_of(&self, residue: &ResidueAtoms, threshold: f64) -> Vec<isize> {
        if self.positions.is_empty() {
            return Vec::new();
        }
        // Slightly widened query, then the exact `<=` test used by the exhaustive scan.
        let radius = threshold * (1.0 + 1e-9) + 1e-12;
        let radius_sq = radius * radius;
        let mut found = BTreeSet::new();
        for p in &residue.positions {
            for neighbour in self
                .tree
                .within_unsorted::<SquaredEuclidean>(&[p.x, p.y, p.z], radius_sq)
            {
                let idx = neighbour.item as usize;
                if nalgebra::distance(p, &self.positions[idx]) <= threshold {
                    found.insert(self.owners[idx]);
                }
            }
        }
        found.into_iter().collect()
    }
}

/// Finds the residues of `chain_a` and `chain_b` that are in contact.
///
/// A residue is at the interface if at least one of its atoms lies within `threshold`
/// Angstroms (inclusive) of at least one atom of some residue of the partner chain.
pub fn interface_residues(
    structure: &Structure,
    chain_a: char,
    chain_b: char,
    threshold: f64,
) -> Result<InterfaceResult, InterfaceError> {
    interface_residues_with(structure, chain_a, chain_b, threshold, InterfaceSearch::default())
}

/// Same as [`interface_residues`], with an explicit search strategy. Every strategy
/// returns identical results.
pub fn interface_residues_with(
    structure: &Structure,
    chain_a: char,
    chain_b: char,
    threshold: f64,
    search: InterfaceSearch,
) -> Result<InterfaceResult, InterfaceError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(InterfaceError::InvalidThreshold(threshold));
    }
    let residues_a = collect_chain(structure, chain_a)?;
    let residues_b = collect_chain(structure, chain_b)?;

    let index = match search {
        InterfaceSearch::Exhaustive => None,
        InterfaceSearch::KdTree => Some(PartnerIndex::build(&residues_b)),
    };
    let partners_for = |residue: &ResidueAtoms| match &index {
        Some(index) => index.partners_of(residue, threshold),
        None => exhaustive_partners(residue, &residues_b, threshold),
    };

    #[cfg(not(feature = "parallel"))]
    let contacts: Vec<(isize, Vec<isize>)> = residues_a
        .iter()
        .map(|r| (r.number, partners_for(r)))
        .collect();

    #[cfg(feature = "parallel")]
    let contacts: Vec<(isize, Vec<isize>)> = residues_a
        .par_iter()
        .map(|r| (r.number, partners_for(r)))
        .collect();

    let mut sets: BTreeMap<char, BTreeSet<isize>> = BTreeMap::new();
    sets.entry(chain_a).or_default();
    sets.entry(chain_b).or_default();
    for (number, partners) in contacts {
        if partners.is_empty() {
            continue;
        }
        sets.entry(chain_a).or_default().insert(number);
        sets.entry(chain_b).or_default().extend(partners);
    }

    let result = InterfaceResult::from_sets(sets);
    debug!(
        chain_a = %chain_a,
        chain_b = %chain_b,
        threshold,
        count_a = result.get(chain_a).len(),
        count_b = result.get(chain_b).len(),
        "Interface residues computed."
    );
    Ok(result)
}
