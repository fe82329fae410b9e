//! File-driven batch pipeline.
//!
//! - [`BatchProcessor`] runs tokens through validate, fetch, render and deliver
//! - [`Orchestrator`] reads the identifier file, splits it into batches and
//!   reports the run summary

pub mod orchestrator;
pub mod processor;

pub use orchestrator::{NoRunReason, Orchestrator, RunReport};
pub use processor::BatchProcessor;
