//! Context Builder and Grounding Manifest assembly.

pub mod context_builder;

pub use context_builder::{ContextBuilder, SceneContext};
