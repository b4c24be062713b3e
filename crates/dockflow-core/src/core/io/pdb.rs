use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Structure declares no models (no ATOM/HETATM or MODEL records found)")]
    NoModels,
    #[error("The first model contains no readable atom records ({skipped} record(s) skipped)")]
    EmptyModel { skipped: usize },
}

/// A record the permissive reader could not interpret and therefore ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    /// Number of models the file declares. A file without MODEL records counts as one.
    pub model_count: usize,
    /// Whether the file ends with an `END` record.
    pub has_end_record: bool,
    pub skipped_records: Vec<SkippedRecord>,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn column_char(line: &str, index: usize) -> char {
    line.get(index..index + 1)
        .and_then(|s| s.chars().next())
        .unwrap_or(' ')
}

struct AtomRecord<'a> {
    serial: usize,
    name: &'a str,
    res_name: &'a str,
    chain_id: char,
    res_seq: isize,
    position: Point3<f64>,
    element: &'a str,
}

fn parse_atom_record(line: &str) -> Result<AtomRecord<'_>, String> {
    if line.len() < 54 {
        return Err("record too short for coordinates".into());
    }
    let name = slice_and_trim(line, 12, 16);
    if name.is_empty() {
        return Err("empty atom name (columns 13-16)".into());
    }
    let res_seq_str = slice_and_trim(line, 22, 26);
    let res_seq: isize = res_seq_str
        .parse()
        .map_err(|_| format!("invalid residue number '{}' (columns 23-26)", res_seq_str))?;
    let coord = |start: usize, end: usize, columns: &str| -> Result<f64, String> {
        let raw = slice_and_trim(line, start, end);
        raw.parse()
            .map_err(|_| format!("invalid coordinate '{}' (columns {})", raw, columns))
    };
    let x = coord(30, 38, "31-38")?;
    let y = coord(38, 46, "39-46")?;
    let z = coord(46, 54, "47-54")?;

    Ok(AtomRecord {
        serial: slice_and_trim(line, 6, 11).parse().unwrap_or(0),
        name,
        res_name: slice_and_trim(line, 17, 20),
        chain_id: column_char(line, 21),
        res_seq,
        position: Point3::new(x, y, z),
        element: slice_and_trim(line, 76, 78),
    })
}

/// Permissive reader for fixed-column PDB coordinate files.
///
/// Only the first model is loaded. Malformed `ATOM`/`HETATM` records are skipped and
/// reported in [`PdbMetadata::skipped_records`] instead of aborting the load, and a repeated
/// atom name within a residue (an alternate location) keeps the first occurrence.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut structure = Structure::new();
        let mut metadata = PdbMetadata::default();

        let mut model_records = 0usize;
        let mut endmdl_records = 0usize;
        let mut first_model_closed = false;
        let mut current: Option<(char, isize, ResidueId)> = None;

        let mut buf = Vec::new();
        let mut line_num = 0usize;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_num += 1;
            // Bytes outside UTF-8 (e.g. Latin-1 remarks) must not abort the load.
            let decoded = String::from_utf8_lossy(&buf);
            let is_utf8 = matches!(decoded, Cow::Borrowed(_));
            let line = decoded.trim_end_matches(['\n', '\r']);
            let record_type = slice_and_trim(line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => {
                    if first_model_closed {
                        continue;
                    }
                    let parsed = if is_utf8 {
                        parse_atom_record(line)
                    } else {
                        Err("record is not valid UTF-8".to_string())
                    };
                    let record = match parsed {
                        Ok(record) => record,
                        Err(reason) => {
                            warn!(line = line_num, %reason, "Skipping malformed atom record.");
                            metadata.skipped_records.push(SkippedRecord {
                                line: line_num,
                                reason,
                            });
                            continue;
                        }
                    };

                    let residue_id = match current {
                        Some((chain, seq, id)) if chain == record.chain_id && seq == record.res_seq => id,
                        _ => {
                            let chain_id = structure.add_chain(record.chain_id);
                            let Some(id) =
                                structure.add_residue(chain_id, record.res_seq, record.res_name)
                            else {
                                continue;
                            };
                            current = Some((record.chain_id, record.res_seq, id));
                            id
                        }
                    };

                    let duplicate = structure
                        .residue(residue_id)
                        .and_then(|r| r.get_atom_id_by_name(record.name))
                        .is_some();
                    if duplicate {
                        debug!(
                            line = line_num,
                            atom = record.name,
                            "Ignoring alternate location for an atom already read."
                        );
                        continue;
                    }

                    let mut atom = Atom::new(record.name, residue_id, record.position);
                    atom.serial = record.serial;
                    atom.element = record.element.to_string();
                    structure.add_atom_to_residue(residue_id, atom);
                }
                "MODEL" => {
                    model_records += 1;
                    // A new model without a preceding ENDMDL still ends the first one.
                    if model_records > 1 || structure.atom_count() > 0 {
                        first_model_closed = true;
                    }
                }
                "ENDMDL" => {
                    endmdl_records += 1;
                    first_model_closed = true;
                }
                "END" => {
                    metadata.has_end_record = true;
                    break;
                }
                _ => {}
            }
        }

        let implicit_model = usize::from(structure.atom_count() > 0);
        metadata.model_count = model_records.max(endmdl_records).max(implicit_model);

        if metadata.model_count == 0 {
            return Err(PdbError::NoModels);
        }
        if structure.atom_count() == 0 {
            return Err(PdbError::EmptyModel {
                skipped: metadata.skipped_records.len(),
            });
        }
        Ok((structure, metadata))
    }
}

/// Appends an `END` record to a structure file whose last non-empty line is not `END`.
///
/// # Return
///
/// Returns `true` if the file was modified.
pub fn ensure_end_record(path: &Path) -> io::Result<bool> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    let mut bytes = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut bytes)?;
    let content = String::from_utf8_lossy(&bytes);

    let last_line = content.lines().rev().find(|l| !l.trim().is_empty());
    if last_line.map(str::trim) == Some("END") {
        return Ok(false);
    }
    if content.is_empty() || content.ends_with('\n') {
        file.write_all(b"END\n")?;
    } else {
        file.write_all(b"\nEND\n")?;
    }
    Ok(true)
}
