use crate::core::clustering::{ClusterRecord, ClusterTable};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\s*\|\s*(\d+)\s*([\d.]*)\s*\|\s*(\d+)\s*([\d.]*)\s*\|")
        .expect("cluster header pattern is valid")
});

static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("integer pattern is valid"));

fn optional_metric(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        None
    } else {
        raw.parse().ok()
    }
}

fn number<T: std::str::FromStr>(raw: &str, field: &'static str) -> Result<T, &'static str> {
    raw.parse().map_err(|_| field)
}

/// `None` if the line is not a header. A line shaped like a header whose numbers do
/// not fit the record yields the offending field name.
fn parse_header(line: &str) -> Option<Result<(ClusterRecord, usize), &'static str>> {
    let caps = HEADER.captures(line)?;
    let end = caps.get(0).map_or(line.len(), |m| m.end());
    let record = || -> Result<ClusterRecord, &'static str> {
        Ok(ClusterRecord {
            cluster_id: number(&caps[1], "cluster id")?,
            structure_count: number(&caps[2], "structure count")?,
            rmsd: optional_metric(&caps[3]),
            middle_structure: number(&caps[4], "middle structure")?,
            middle_rmsd: optional_metric(&caps[5]),
            members: Vec::new(),
        })
    };
    Some(record().map(|record| (record, end)))
}

fn integers(text: &str) -> impl Iterator<Item = String> + '_ {
    INTEGER.find_iter(text).map(|m| m.as_str().to_string())
}

/// Parses the textual log of the structural-clustering tool into a [`ClusterTable`].
///
/// A header line has the shape `id | count [rmsd] | middle [rmsd] | members...`. Every
/// non-blank line after a header that is not itself a header continues the member list of
/// the current cluster. Lines before the first header are ignored, and a log without any
/// header yields an empty table rather than an error.
pub fn parse_cluster_log(text: &str) -> ClusterTable {
    let mut records = Vec::new();
    let mut current: Option<ClusterRecord> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_header(line) {
            Some(Ok((mut record, end))) => {
                if let Some(done) = current.take() {
                    records.push(done);
                }
                record.members.extend(integers(&line[end..]));
                current = Some(record);
            }
            Some(Err(field)) => {
                // The cluster is dropped whole; its continuation lines belong to nobody.
                warn!(line, field, "Skipping cluster header with an out-of-range number.");
                if let Some(done) = current.take() {
                    records.push(done);
                }
            }
            None => {
                if let Some(record) = current.as_mut() {
                    record.members.extend(integers(line));
                }
            }
        }
    }

    if let Some(done) = current {
        records.push(done);
    }

    debug!(clusters = records.len(), "Parsed clustering log.");
    ClusterTable::new(records)
}

/// Reads and parses a clustering log file.
pub fn read_cluster_log(path: &Path) -> io::Result<ClusterTable> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_cluster_log(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GMX_LOG: &str = "\
Using linkage method for clustering
Using RMSD cutoff 0.45 nm
The RMSD ranges from 0.0933602 to 1.41458 nm
Found 3 clusters

cl. | #st  rmsd | middle rmsd | cluster members
  1 |  14 0.329 |     18 .288 |     1    2    4    6   11   13
    |           |             |    18   19   24   26
    |           |             |    30   33   47   51
  2 |   1       |      3      |     3
  3 |   2 0.201 |      5 .201 |     5    9
";

    #[test]
    fn header_with_continuation_lines_accumulates_members_in_order() {
        let log = "1 | 5 0.30 | 7 0.20 | 7 2\n    | | | 9 11 4\n";
        let table = parse_cluster_log(log);
        assert_eq!(table.len(), 1);
        let record = &table.records()[0];
        assert_eq!(record.members, vec!["7", "2", "9", "11", "4"]);
        assert_eq!(record.members_joined(), "7, 2, 9, 11, 4");
        assert_eq!(record.first_member(), Some("7"));
    }

    #[test]
    fn oversized_cluster_id_does_not_extend_the_previous_cluster() {
        let log = "1 | 2 | 3 | 3 4\n99999999999 | 2 | 5 | 5 6\n   | | | 7\n2 | 1 | 8 | 8\n";
        let table = parse_cluster_log(log);
        assert_eq!(table.cluster_ids(), vec![1, 2]);
        assert_eq!(table.get(1).unwrap().members, vec!["3", "4"]);
        assert_eq!(table.get(2).unwrap().members, vec!["8"]);
    }

    #[test]
    fn parses_a_realistic_log_in_appearance_order() {
        let table = parse_cluster_log(GMX_LOG);
        assert_eq!(table.cluster_ids(), vec![1, 2, 3]);

        let first = table.get(1).unwrap();
        assert_eq!(first.structure_count, 14);
        assert_eq!(first.rmsd, Some(0.329));
        assert_eq!(first.middle_structure, 18);
        assert_eq!(first.middle_rmsd, Some(0.288));
        assert_eq!(first.members.len(), 14);
        assert_eq!(first.members.last().map(String::as_str), Some("51"));

        let singleton = table.get(2).unwrap();
        assert_eq!(singleton.structure_count, 1);
        assert_eq!(singleton.rmsd, None);
        assert_eq!(singleton.middle_rmsd, None);
        assert_eq!(singleton.members, vec!["3"]);

        assert_eq!(table.get(3).unwrap().members, vec!["5", "9"]);
    }

    #[test]
    fn continuation_lines_with_numbers_are_not_headers() {
        let log = "4 | 3 | 8 | 8\n 10 11 12 \n";
        let table = parse_cluster_log(log);
        assert_eq!(table.len(), 1);
        assert_eq!(table.records()[0].members, vec!["8", "10", "11", "12"]);
    }

    #[test]
    fn log_without_headers_yields_empty_table() {
        let table = parse_cluster_log("Found 0 clusters\n\n12 34 56\n");
        assert!(table.is_empty());
        assert!(parse_cluster_log("").is_empty());
    }

    #[test]
    fn member_tokens_are_kept_verbatim() {
        let table = parse_cluster_log("1 | 2 | 007 | 007 10\n");
        assert_eq!(table.records()[0].members, vec!["007", "10"]);
        assert_eq!(table.records()[0].middle_structure, 7);
    }

    #[test]
    fn read_cluster_log_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.log");
        std::fs::write(&path, GMX_LOG).unwrap();
        assert_eq!(read_cluster_log(&path).unwrap().len(), 3);
        assert!(read_cluster_log(&dir.path().join("missing.log")).is_err());
    }
}
