//! Core domain types for the result courier.
//!
//! This module contains pure domain types with no I/O:
//! - Registration-number validation
//! - Fetch results, per-identifier outcomes and run summaries

pub mod identifier;
pub mod outcome;

pub use identifier::{IDENTIFIER_EXAMPLE, Identifier, Validation, validate};
pub use outcome::{
    BatchOutcome, FatalKind, FetchResult, IdentifierOutcome, OutcomeStatus, RunId, RunSummary,
    TransientKind,
};
