//! `TurnResult`: the immutable outcome of `process_turn`, persisted verbatim
//! into the TurnLog.

use branchloom_domain::{LocationKey, OutcomeTier};
use serde::{Deserialize, Serialize};

use super::delta::StateDelta;
use crate::ports::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub narrative: String,
    pub new_location: Option<LocationKey>,
    pub time_advanced: i64,
    pub skill_check_result: Option<OutcomeTier>,
    pub applied_deltas: Vec<StateDelta>,
    pub errors: Vec<String>,
    pub is_ooc: bool,
}

impl TurnResult {
    pub fn builder() -> TurnResultBuilder {
        TurnResultBuilder::default()
    }

    /// Degraded turn: short generic narrative plus a non-empty error list,
    /// no applied deltas.
    pub fn degraded(error: &PipelineError) -> Self {
        Self {
            narrative: "You pause, uncertain.".to_string(),
            new_location: None,
            time_advanced: 0,
            skill_check_result: None,
            applied_deltas: Vec::new(),
            errors: vec![error.to_string()],
            is_ooc: false,
        }
    }
}

#[derive(Default)]
pub struct TurnResultBuilder {
    narrative: String,
    new_location: Option<LocationKey>,
    time_advanced: i64,
    skill_check_result: Option<OutcomeTier>,
    applied_deltas: Vec<StateDelta>,
    errors: Vec<String>,
    is_ooc: bool,
}

impl TurnResultBuilder {
    pub fn narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = narrative.into();
        self
    }

    pub fn new_location(mut self, location: LocationKey) -> Self {
        self.new_location = Some(location);
        self
    }

    pub fn time_advanced(mut self, minutes: i64) -> Self {
        self.time_advanced = minutes;
        self
    }

    pub fn skill_check_result(mut self, tier: OutcomeTier) -> Self {
        self.skill_check_result = Some(tier);
        self
    }

    pub fn applied_deltas(mut self, deltas: Vec<StateDelta>) -> Self {
        self.applied_deltas = deltas;
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    pub fn ooc(mut self, is_ooc: bool) -> Self {
        self.is_ooc = is_ooc;
        self
    }

    pub fn build(self) -> TurnResult {
        TurnResult {
            narrative: self.narrative,
            new_location: self.new_location,
            time_advanced: self.time_advanced,
            skill_check_result: self.skill_check_result,
            applied_deltas: self.applied_deltas,
            errors: self.errors,
            is_ooc: self.is_ooc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degraded_turn_has_nonempty_errors_and_no_deltas() {
        let result = TurnResult::degraded(&PipelineError::Fatal("corrupt manifest".into()));
        assert!(result.applied_deltas.is_empty());
        assert!(!result.errors.is_empty());
        assert!(!result.narrative.is_empty());
    }

    #[test]
    fn builder_sums_time_advanced_field_directly() {
        let result = TurnResult::builder()
            .narrative("You move on.")
            .time_advanced(15)
            .build();
        assert_eq!(result.time_advanced, 15);
    }
}
