//! Observation snapshots and the collaborator seams around the simulation.
//!
//! The core never looks inside the simulation. It receives an [`Observation`]
//! from an [`Observer`] once per tick and asks an [`Effector`] to apply
//! actions that the registry has already confirmed as legal.

use crate::action::{ActionId, ActionParams};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Numeric state identifier reported by the simulation.
///
/// A change of this value marks a new decision context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u32);

impl StateId {
    pub const SELECTING: StateId = StateId(1);
    pub const RESOLVING: StateId = StateId(2);
    pub const DRAWING: StateId = StateId(3);
    pub const GAME_OVER: StateId = StateId(4);
    pub const SHOP: StateId = StateId(5);
    pub const STAGE_SELECT: StateId = StateId(7);
    pub const ROUND_EVAL: StateId = StateId(8);
    pub const MENU: StateId = StateId(11);
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entity (card, unit, item) visible to the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub rank: String,
    #[serde(default)]
    pub suit: String,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub selected: bool,
}

/// Snapshot of the externally visible simulation state for one tick.
///
/// Every field has a documented zero value; observers report missing data
/// as that zero value rather than failing. Resource counters in particular
/// read as `0` when unknown, never as "unlimited".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub state: StateId,
    /// Progress accumulated in the current stage.
    #[serde(default)]
    pub score: i64,
    /// Score needed to clear the current stage.
    #[serde(default)]
    pub target_score: i64,
    #[serde(default)]
    pub money: i64,
    /// Stage counter, starts at 1 once an episode is running.
    #[serde(default)]
    pub stage: u32,
    #[serde(default)]
    pub hands_left: u32,
    #[serde(default)]
    pub discards_left: u32,
    /// Number of entities currently selected.
    #[serde(default)]
    pub selected_count: u32,
    #[serde(default)]
    pub hand: Vec<Entity>,
}

/// Supplies the current observation. Called every tick.
pub trait Observer {
    /// Capture the current state. Must be side-effect free and must not fail.
    fn observation(&self) -> Observation;
}

/// Applies actions to the simulation.
///
/// Only called for actions the registry has just confirmed as legal.
pub trait Effector {
    fn execute(&mut self, action: ActionId, params: &ActionParams) -> Result<(), EffectError>;
}

/// Failure reported by an [`Effector`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct EffectError {
    pub reason: String,
}

impl EffectError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_decode_as_zero() {
        let obs: Observation = serde_json::from_str(r#"{"state": 1}"#).unwrap();
        assert_eq!(obs.state, StateId::SELECTING);
        assert_eq!(obs.hands_left, 0);
        assert_eq!(obs.discards_left, 0);
        assert!(obs.hand.is_empty());
    }

    #[test]
    fn test_state_id_is_transparent_on_the_wire() {
        let json = serde_json::to_string(&StateId::MENU).unwrap();
        assert_eq!(json, "11");
    }
}
