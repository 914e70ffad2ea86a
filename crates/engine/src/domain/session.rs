//! `Session`: the top-level ownership root. The core only observes it via
//! `session_id`; lifetime and persistence are owned by the external
//! front-end.

use branchloom_domain::SessionId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessTurnOptions {
    pub roll_mode: RollMode,
    pub anticipation: bool,
    pub min_match_confidence: Option<f64>,
    pub max_actions_per_cycle: Option<usize>,
    pub ref_based: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollMode {
    #[default]
    Auto,
    Manual,
}

impl Default for ProcessTurnOptions {
    fn default() -> Self {
        Self {
            roll_mode: RollMode::Auto,
            anticipation: true,
            min_match_confidence: None,
            max_actions_per_cycle: None,
            ref_based: true,
        }
    }
}

/// Handle identifying which session and turn number a call is operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnContext {
    pub session_id: SessionId,
    pub turn_number: u64,
}
