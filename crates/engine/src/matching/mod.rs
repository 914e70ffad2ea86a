//! Action Predictor & Matcher: enumerates plausible next actions from the
//! manifest and scores classified intent against them.

pub mod matcher;
pub mod predictor;

pub use matcher::ActionMatcher;
pub use predictor::{ActionCandidate, ActionPredictor};
