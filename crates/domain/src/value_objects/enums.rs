//! Closed enumerations shared by the Manifest, StateDelta, and Branch types.
//!
//! The Design Notes call for closed enum types instead of stringly-typed
//! fields for need names, entity types, and fact categories so validators are
//! switch/match statements rather than string comparisons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a grounded entity in a turn's Manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Npc,
    Player,
    Creature,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Npc => "npc",
            Self::Player => "player",
            Self::Creature => "creature",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "npc" => Ok(Self::Npc),
            "player" | "pc" => Ok(Self::Player),
            "creature" | "monster" | "animal" => Ok(Self::Creature),
            _ => Err(()),
        }
    }
}

/// Closed set of player needs a `NeedsStore` tracks. `UPDATE_NEED` deltas
/// reference one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    Hunger,
    Thirst,
    Energy,
    Safety,
    Social,
    Hygiene,
}

impl NeedKind {
    pub const ALL: [NeedKind; 6] = [
        Self::Hunger,
        Self::Thirst,
        Self::Energy,
        Self::Safety,
        Self::Social,
        Self::Hygiene,
    ];
}

impl fmt::Display for NeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hunger => "hunger",
            Self::Thirst => "thirst",
            Self::Energy => "energy",
            Self::Safety => "safety",
            Self::Social => "social",
            Self::Hygiene => "hygiene",
        };
        write!(f, "{s}")
    }
}

impl FromStr for NeedKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hunger" | "food" => Ok(Self::Hunger),
            "thirst" | "water" => Ok(Self::Thirst),
            "energy" | "rest" | "sleep" | "fatigue" => Ok(Self::Energy),
            "safety" | "security" => Ok(Self::Safety),
            "social" | "companionship" => Ok(Self::Social),
            "hygiene" => Ok(Self::Hygiene),
            _ => Err(()),
        }
    }
}

/// Closed set of categories `RECORD_FACT` deltas file into. `Personal` is the
/// fallback when the post-processor cannot normalize an unrecognized
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    #[default]
    Personal,
    World,
    Relationship,
    Quest,
    Secret,
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Personal => "personal",
            Self::World => "world",
            Self::Relationship => "relationship",
            Self::Quest => "quest",
            Self::Secret => "secret",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FactCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "world" | "lore" => Ok(Self::World),
            "relationship" | "npc" => Ok(Self::Relationship),
            "quest" | "goal" => Ok(Self::Quest),
            "secret" | "hidden" => Ok(Self::Secret),
            _ => Err(()),
        }
    }
}

/// Closed set of dimensions an `UPDATE_ATTITUDE` delta can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttitudeDimension {
    Trust,
    Fear,
    Affection,
    Respect,
}

impl fmt::Display for AttitudeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Trust => "trust",
            Self::Fear => "fear",
            Self::Affection => "affection",
            Self::Respect => "respect",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AttitudeDimension {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trust" => Ok(Self::Trust),
            "fear" => Ok(Self::Fear),
            "affection" | "liking" => Ok(Self::Affection),
            "respect" => Ok(Self::Respect),
            _ => Err(()),
        }
    }
}

/// Discrete degree of success on a skill-check roll, returned by the
/// external `DiceRoller`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTier {
    CriticalSuccess,
    Success,
    Partial,
    Failure,
    CriticalFailure,
}

impl fmt::Display for OutcomeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CriticalSuccess => "critical_success",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
            Self::CriticalFailure => "critical_failure",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_round_trips_display_and_parse() {
        for kind in [EntityKind::Npc, EntityKind::Player, EntityKind::Creature] {
            let parsed: EntityKind = kind.to_string().parse().expect("display output parses");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn need_kind_accepts_common_aliases() {
        assert_eq!("food".parse::<NeedKind>(), Ok(NeedKind::Hunger));
        assert_eq!("sleep".parse::<NeedKind>(), Ok(NeedKind::Energy));
        assert_eq!("bogus".parse::<NeedKind>(), Err(()));
    }

    #[test]
    fn fact_category_default_is_personal() {
        assert_eq!(FactCategory::default(), FactCategory::Personal);
    }

    #[test]
    fn fact_category_unknown_string_does_not_parse() {
        assert_eq!("unknown-category".parse::<FactCategory>(), Err(()));
    }

    #[test]
    fn attitude_dimension_parses_aliases() {
        assert_eq!("liking".parse::<AttitudeDimension>(), Ok(AttitudeDimension::Affection));
    }
}
