use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One cluster reported by the structural-clustering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    pub cluster_id: u32,
    pub structure_count: usize,
    /// Cluster-level distance metric; the clustering tool omits it for singletons.
    pub rmsd: Option<f64>,
    /// Member chosen by the clustering tool as the cluster medoid.
    pub middle_structure: u32,
    pub middle_rmsd: Option<f64>,
    /// Member ids as the original textual tokens, in log order.
    pub members: Vec<String>,
}

impl ClusterRecord {
    /// The highest-ranked pose of the cluster, by the producing tool's convention.
    pub fn first_member(&self) -> Option<&str> {
        self.members.first().map(String::as_str)
    }

    /// Renders the member list as a comma-joined string of the original tokens.
    pub fn members_joined(&self) -> String {
        self.members.iter().join(", ")
    }
}

/// Ordered table of cluster records, in log-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterTable {
    records: Vec<ClusterRecord>,
}

impl ClusterTable {
    pub fn new(records: Vec<ClusterRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ClusterRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up the first record carrying `cluster_id`.
    pub fn get(&self, cluster_id: u32) -> Option<&ClusterRecord> {
        self.records.iter().find(|r| r.cluster_id == cluster_id)
    }

    /// Distinct cluster ids in log-appearance order.
    pub fn cluster_ids(&self) -> Vec<u32> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.cluster_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// How clusters are ordered before truncation to the maximum cluster count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterOrder {
    /// Keep log-appearance order. This is a plain prefix, not a quality ranking.
    #[default]
    LogOrder,
    /// Larger clusters first; ties keep log order.
    LargestFirst,
    /// Lower cluster metric first; undefined metrics last; ties keep log order.
    TightestFirst,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown cluster order '{0}'. Expected 'log', 'largest' or 'tightest'.")]
pub struct ParseClusterOrderError(String);

impl FromStr for ClusterOrder {
    type Err = ParseClusterOrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" | "log-order" => Ok(ClusterOrder::LogOrder),
            "largest" | "largest-first" => Ok(ClusterOrder::LargestFirst),
            "tightest" | "tightest-first" => Ok(ClusterOrder::TightestFirst),
            _ => Err(ParseClusterOrderError(s.to_string())),
        }
    }
}

impl fmt::Display for ClusterOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterOrder::LogOrder => "log",
            ClusterOrder::LargestFirst => "largest",
            ClusterOrder::TightestFirst => "tightest",
        };
        write!(f, "{}", name)
    }
}

fn compare_metric(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Chooses at most `max_clusters` distinct cluster ids from the table.
///
/// With [`ClusterOrder::LogOrder`] this is the literal prefix of the log; callers that want
/// the "best" clusters must opt into one of the ranking orders.
pub fn select_clusters(table: &ClusterTable, max_clusters: usize, order: ClusterOrder) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<&ClusterRecord> = table
        .records()
        .iter()
        .filter(|r| seen.insert(r.cluster_id))
        .collect();

    match order {
        ClusterOrder::LogOrder => {}
        ClusterOrder::LargestFirst => {
            candidates.sort_by(|a, b| b.structure_count.cmp(&a.structure_count));
        }
        ClusterOrder::TightestFirst => {
            candidates.sort_by(|a, b| compare_metric(a.rmsd, b.rmsd));
        }
    }

    candidates
        .into_iter()
        .take(max_clusters)
        .map(|r| r.cluster_id)
        .collect()
}
