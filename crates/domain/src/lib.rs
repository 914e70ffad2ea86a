//! Core domain types: identifiers, value objects, and errors shared by every
//! port and by the turn pipeline in `branchloom-engine`.

extern crate self as branchloom_domain;

pub mod common;
pub mod error;
pub mod game_time;
pub mod ids;
pub mod value_objects;

pub use error::DomainError;

pub use game_time::{GameTime, TimeOfDay};

pub use ids::{EntityKey, ExitKey, ItemKey, LocationKey, SessionId, TurnId};

pub use value_objects::{
    AttitudeDimension, EntityKind, FactCategory, NeedKind, OutcomeTier, QuantityChangeResult,
};
