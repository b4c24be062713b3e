//! # Engine Module
//!
//! Execution machinery of the docking pipeline: everything that launches external tools,
//! stages working directories or runs work concurrently lives here.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Tool locations and stage parameters, built once
//! - **Error Handling** ([`error`]) - The engine error taxonomy and per-task failures
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Process Plumbing** ([`process`]) - Launching external programs with timeouts
//! - **Collaborators** ([`tools`]) - Docking, clustering and refinement tool adapters
//! - **Tasks** ([`tasks`]) - The per-cluster refinement task
//! - **Orchestration** ([`orchestrator`]) - Parallel fan-out with isolated failures
//! - **Aggregation** ([`aggregate`]) - Scoring, file staging and the results table
//!
//! Tasks share no mutable state. Every refinement task owns a working directory keyed by
//! its cluster id, and the shared results area is only written after all tasks returned.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod progress;
pub mod tasks;
pub mod tools;
