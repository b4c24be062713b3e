//! Units of work executed by the orchestrator.
//!
//! A task is a pure function of its inputs plus side effects confined to its own working
//! directory, so any number of them can run concurrently without coordination.

pub mod refine;
