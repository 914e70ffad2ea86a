//! Plain data types for the turn pipeline: Manifest, Intent, StateDelta,
//! Branch, TurnResult, and Session context.

pub mod branch;
pub mod delta;
pub mod intent;
pub mod manifest;
pub mod session;
pub mod turn_result;

pub use branch::{Branch, BranchSet};
pub use delta::StateDelta;
pub use intent::{Intent, IntentType, UntargetedVerb};
pub use manifest::{Manifest, ManifestEntity, ManifestExit, ManifestItem};
pub use session::{ProcessTurnOptions, RollMode, TurnContext};
pub use turn_result::TurnResult;
