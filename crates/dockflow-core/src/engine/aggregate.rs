use crate::core::energy::STRUCTURE_COLUMN;
use crate::engine::error::{EngineError, TaskFailure};
use crate::engine::orchestrator::ClusterOutcome;
use crate::engine::tasks::refine::RepresentativeStructure;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// A representative structure with its combined score. Lower is better.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredStructure {
    pub representative: RepresentativeStructure,
    pub score: f64,
}

/// All scored representatives of a run, plus the clusters that failed.
#[derive(Debug, Default)]
pub struct PipelineResult {
    /// One row per successful cluster, in completion-list order.
    pub rows: Vec<ScoredStructure>,
    /// Energy term names across all rows, in first-seen order.
    pub terms: Vec<String>,
    pub failures: Vec<TaskFailure>,
}

impl PipelineResult {
    /// Rows sorted by ascending score; ties keep their order.
    pub fn ranked(&self) -> Vec<&ScoredStructure> {
        let mut rows: Vec<&ScoredStructure> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal));
        rows
    }

    pub fn best(&self) -> Option<&ScoredStructure> {
        self.ranked().into_iter().next()
    }
}

/// Merges per-cluster outcomes into one scored table.
///
/// Failed clusters are logged and kept aside in [`PipelineResult::failures`]. If every
/// cluster failed the aggregate fails with [`EngineError::EmptyResult`]; a surviving row
/// that lacks one of the score terms fails it with [`EngineError::MissingTerm`].
#[instrument(skip_all, name = "aggregate_results")]
pub fn aggregate(outcomes: Vec<ClusterOutcome>) -> Result<PipelineResult, EngineError> {
    let attempted = outcomes.len();
    let mut result = PipelineResult::default();
    let mut known_terms = HashSet::new();

    for (cluster_id, outcome) in outcomes {
        match outcome {
            Ok(representative) => {
                let score = representative.energy.combined_score()?;
                for (term, _) in representative.energy.terms() {
                    if known_terms.insert(term.to_string()) {
                        result.terms.push(term.to_string());
                    }
                }
                result.rows.push(ScoredStructure {
                    representative,
                    score,
                });
            }
            Err(failure) => {
                warn!(cluster_id, error = %failure.error, "Dropping failed cluster from the results.");
                result.failures.push(failure);
            }
        }
    }

    if result.rows.is_empty() {
        return Err(EngineError::EmptyResult { attempted });
    }
    info!(
        rows = result.rows.len(),
        failures = result.failures.len(),
        "Aggregated cluster results."
    );
    Ok(result)
}

/// Copies each distinct representative structure into every destination directory.
///
/// Copying is idempotent: repeated paths are copied once and existing copies are
/// overwritten. Representatives whose file does not exist are skipped with a warning.
/// Returns the paths of the copies.
pub fn stage_files(result: &PipelineResult, destinations: &[PathBuf]) -> Result<Vec<PathBuf>, EngineError> {
    let mut seen = HashSet::new();
    let mut copies = Vec::new();

    for row in &result.rows {
        let source = &row.representative.path;
        if !seen.insert(source.clone()) {
            continue;
        }
        if !source.exists() {
            warn!(path = %source.display(), "Representative structure not found; not copying it.");
            continue;
        }
        let Some(name) = source.file_name() else {
            continue;
        };
        for dir in destinations {
            std::fs::create_dir_all(dir)?;
            let target = dir.join(name);
            if target != *source {
                std::fs::copy(source, &target)?;
            }
            copies.push(target);
        }
    }
    Ok(copies)
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Writes the result table as CSV: `cluster_id`, the structure path, every energy term
/// and `score`. Undefined values are left empty.
pub fn write_csv(result: &PipelineResult, path: &Path) -> Result<(), EngineError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["cluster_id".to_string(), STRUCTURE_COLUMN.to_string()];
    header.extend(result.terms.iter().cloned());
    header.push("score".to_string());
    writer.write_record(&header)?;

    for row in &result.rows {
        let energy = &row.representative.energy;
        let mut record = vec![
            row.representative.cluster_id.to_string(),
            row.representative.path.display().to_string(),
        ];
        for term in &result.terms {
            let value = energy
                .terms()
                .find(|(name, _)| *name == term.as_str())
                .map_or(f64::NAN, |(_, v)| v);
            record.push(format_value(value));
        }
        record.push(format_value(row.score));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = result.rows.len(), "Wrote combined results.");
    Ok(())
}
