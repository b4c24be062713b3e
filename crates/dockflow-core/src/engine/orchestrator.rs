use crate::engine::error::{EngineError, TaskFailure};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::tasks::refine::{RefineContext, RepresentativeStructure, refine_cluster};
use std::any::Any;
use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Outcome of one cluster's refinement, tagged with its cluster id.
pub type ClusterOutcome = (u32, Result<RepresentativeStructure, TaskFailure>);

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn run_isolated(cluster_id: u32, ctx: &RefineContext, reporter: &ProgressReporter) -> ClusterOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| refine_cluster(cluster_id, ctx)))
        .unwrap_or_else(|payload| {
            Err(EngineError::Internal(format!(
                "refinement task panicked: {}",
                panic_message(payload)
            )))
        })
        .map_err(|error| TaskFailure::new(cluster_id, error));

    if let Err(failure) = &result {
        warn!(cluster_id, error = %failure.error, "Cluster refinement failed.");
    }
    reporter.report(Progress::TaskIncrement { amount: 1 });
    (cluster_id, result)
}

/// Refines every selected cluster, each as an isolated unit of work.
///
/// Tasks run on a bounded worker pool (`num_workers` threads, or the available
/// parallelism when `None`) and the call returns once all of them have finished. A
/// failing or panicking task yields a [`TaskFailure`] for its cluster id and never
/// affects the others. The result holds exactly one entry per distinct cluster id;
/// repeated ids are refined once since they would share a working directory.
#[instrument(skip_all, name = "refinement_orchestrator")]
pub fn run_all(
    cluster_ids: &[u32],
    ctx: &RefineContext,
    num_workers: Option<usize>,
    reporter: &ProgressReporter,
) -> Result<Vec<ClusterOutcome>, EngineError> {
    let mut seen = HashSet::new();
    let unique: Vec<u32> = cluster_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();
    if unique.len() != cluster_ids.len() {
        warn!(
            requested = cluster_ids.len(),
            distinct = unique.len(),
            "Ignoring repeated cluster ids."
        );
    }

    info!(clusters = unique.len(), "Starting per-cluster refinement.");
    reporter.report(Progress::TaskStart {
        total: unique.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<ClusterOutcome> = {
        let _ = num_workers;
        unique
            .iter()
            .map(|&id| run_isolated(id, ctx, reporter))
            .collect()
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<ClusterOutcome> = {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("dockflow-refine-{}", i));
        if let Some(n) = num_workers {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build worker pool: {}", e)))?;
        pool.install(|| {
            unique
                .par_iter()
                .map(|&id| run_isolated(id, ctx, reporter))
                .collect()
        })
    };

    reporter.report(Progress::TaskFinish);
    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
    info!(
        succeeded = outcomes.len() - failed,
        failed, "Per-cluster refinement finished."
    );
    Ok(outcomes)
}
