//! Intent Classifier: turns raw player input into a structured `Intent`.

pub mod classifier;

pub use classifier::IntentClassifier;
