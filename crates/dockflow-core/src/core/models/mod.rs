//! # Core Models Module
//!
//! Data structures describing a loaded molecular structure. A [`structure::Structure`]
//! exclusively owns its chains, residues and atoms; atoms and residues carry non-owning
//! back-references to their parents in the form of stable slot-map keys.
//!
//! - [`atom`] - Atom name, element and coordinates
//! - [`residue`] - Residue sequence number and ordered atoms
//! - [`chain`] - Chain identifier and ordered residues
//! - [`structure`] - The root container with lookup maps
//! - [`ids`] - Stable identifiers for atoms, residues and chains

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod structure;
