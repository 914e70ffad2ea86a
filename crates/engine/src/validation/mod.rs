//! Validator Suite: Narrative Validator and Delta Validator.

pub mod delta;
pub mod narrative;

pub use delta::{DeltaIssue, DeltaValidator};
pub use narrative::{NarrativeIssue, NarrativeValidator};
