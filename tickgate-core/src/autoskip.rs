//! Auto-skip for forced moves.
//!
//! When the only legal action is structural there is nothing for the agent to
//! decide, so the loop applies it directly instead of spending a round-trip.

use crate::action::{ActionCategory, ActionId};
use crate::observation::Observation;
use crate::registry::{self, LegalActions};

/// The action to apply without asking the agent, if any.
///
/// Fires only for a legal set of exactly one structural action.
pub fn auto_skip_action(_obs: &Observation, legal: &LegalActions) -> Option<ActionId> {
    legal
        .single()
        .filter(|&action| registry::category(action) == ActionCategory::Structural)
}

pub fn should_auto_skip(obs: &Observation, legal: &LegalActions) -> bool {
    auto_skip_action(obs, legal).is_some()
}
