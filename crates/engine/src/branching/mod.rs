//! Branch Generator: asks the LLM for a branch set grounded in the manifest.

pub mod generator;

pub use generator::{single_variant_branch, BranchGenerator};
