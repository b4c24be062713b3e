use crate::cli::ClustersArgs;
use crate::error::{CliError, Result};
use dockflow::core::clustering::{ClusterOrder, ClusterTable, select_clusters};
use dockflow::core::io::cluster_log::read_cluster_log;
use std::fmt::Write;
use std::str::FromStr;
use tracing::info;

pub async fn run(args: ClustersArgs) -> Result<()> {
    let order = ClusterOrder::from_str(&args.order).map_err(|e| CliError::Argument(e.to_string()))?;
    let table = read_cluster_log(&args.log).map_err(|e| CliError::FileParsing {
        path: args.log.clone(),
        source: e.into(),
    })?;
    info!(clusters = table.len(), "Parsed clustering log.");

    print!("{}", render_table(&table));
    if let Some(max) = args.max_clusters {
        let selected = select_clusters(&table, max, order);
        println!("Selected for refinement ({} order): {:?}", order, selected);
    }
    Ok(())
}

fn render_table(table: &ClusterTable) -> String {
    let mut out = String::new();
    if table.is_empty() {
        out.push_str("No clusters found.\n");
        return out;
    }
    let _ = writeln!(out, "{:>7}  {:>5}  {:>7}  {:>6}  members", "cluster", "size", "rmsd", "middle");
    for record in table.records() {
        let rmsd = record
            .rmsd
            .map_or_else(|| "-".to_string(), |v| format!("{:.3}", v));
        let _ = writeln!(
            out,
            "{:>7}  {:>5}  {:>7}  {:>6}  {}",
            record.cluster_id,
            record.structure_count,
            rmsd,
            record.middle_structure,
            record.members_joined()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockflow::core::io::cluster_log::parse_cluster_log;

    #[test]
    fn table_lists_one_line_per_cluster() {
        let table = parse_cluster_log(
            "  1 |  3  0.250 |   7 0.190 |    7   12   40\n  2 |  1        |   5       |    5\n",
        );
        let text = render_table(&table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("cluster"));
        assert!(lines[1].trim_start().starts_with("1"));
        assert!(lines[1].contains("0.250"));
        assert!(lines[2].contains("  -  "));
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(render_table(&ClusterTable::default()), "No clusters found.\n");
    }
}
