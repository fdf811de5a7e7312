//! Action registry: which actions are legal right now.
//!
//! The catalog is a fixed table indexed by [`ActionId`]. Each entry pairs a
//! precondition over the [`Observation`] with a category and an "unblocks"
//! flag. On top of the preconditions the registry keeps one executed-marker
//! per action so a one-shot action cannot fire twice in the same decision
//! context.

use crate::action::{ActionCategory, ActionId};
use crate::observation::{Observation, StateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of actions that are legal for the current tick.
///
/// Backed by an ordered set, so iteration and serialization are always
/// sorted by wire code regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegalActions(BTreeSet<ActionId>);

impl LegalActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, action: ActionId) -> bool {
        self.0.contains(&action)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The only member, if the set has exactly one.
    pub fn single(&self) -> Option<ActionId> {
        if self.0.len() == 1 {
            self.0.first().copied()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<ActionId> {
        self.iter().collect()
    }
}

impl FromIterator<ActionId> for LegalActions {
    fn from_iter<I: IntoIterator<Item = ActionId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub id: ActionId,
    pub category: ActionCategory,
    /// Successful execution clears every executed-marker.
    pub unblocks: bool,
    precondition: fn(&Observation) -> bool,
}

impl ActionSpec {
    pub fn precondition_holds(&self, obs: &Observation) -> bool {
        (self.precondition)(obs)
    }
}

// Resource checks compare against zero so an unreported counter (0) blocks the action.

fn can_select(obs: &Observation) -> bool {
    obs.state == StateId::SELECTING && !obs.hand.is_empty()
}

fn can_commit(obs: &Observation) -> bool {
    obs.state == StateId::SELECTING && obs.selected_count > 0 && obs.hands_left > 0
}

fn can_discard(obs: &Observation) -> bool {
    obs.state == StateId::SELECTING && obs.selected_count > 0 && obs.discards_left > 0
}

fn at_menu(obs: &Observation) -> bool {
    obs.state == StateId::MENU
}

fn at_stage_select(obs: &Observation) -> bool {
    obs.state == StateId::STAGE_SELECT
}

fn at_game_over(obs: &Observation) -> bool {
    obs.state == StateId::GAME_OVER
}

fn at_round_eval(obs: &Observation) -> bool {
    obs.state == StateId::ROUND_EVAL
}

fn at_shop(obs: &Observation) -> bool {
    obs.state == StateId::SHOP
}

/// The catalog, in [`ActionId`] index order.
const CATALOG: [ActionSpec; ActionId::COUNT] = [
    ActionSpec {
        id: ActionId::SelectChoice,
        category: ActionCategory::CoreDecision,
        unblocks: false,
        precondition: can_select,
    },
    ActionSpec {
        id: ActionId::CommitChoice,
        category: ActionCategory::CoreDecision,
        unblocks: true,
        precondition: can_commit,
    },
    ActionSpec {
        id: ActionId::DiscardChoice,
        category: ActionCategory::CoreDecision,
        unblocks: true,
        precondition: can_discard,
    },
    ActionSpec {
        id: ActionId::StartEpisode,
        category: ActionCategory::Structural,
        unblocks: false,
        precondition: at_menu,
    },
    ActionSpec {
        id: ActionId::SelectStage,
        category: ActionCategory::Structural,
        unblocks: false,
        precondition: at_stage_select,
    },
    ActionSpec {
        id: ActionId::RestartEpisode,
        category: ActionCategory::Structural,
        unblocks: false,
        precondition: at_game_over,
    },
    ActionSpec {
        id: ActionId::CollectReward,
        category: ActionCategory::Structural,
        unblocks: false,
        precondition: at_round_eval,
    },
    ActionSpec {
        id: ActionId::LeaveShop,
        category: ActionCategory::Structural,
        unblocks: false,
        precondition: at_shop,
    },
];

/// Catalog entry for an action.
pub fn spec(action: ActionId) -> &'static ActionSpec {
    &CATALOG[action.index()]
}

pub fn category(action: ActionId) -> ActionCategory {
    spec(action).category
}

/// Computes legal-action sets and tracks executed-markers.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    executed: [bool; ActionId::COUNT],
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every action whose precondition holds and whose marker is clear.
    pub fn legal_actions(&self, obs: &Observation) -> LegalActions {
        CATALOG
            .iter()
            .filter(|entry| self.is_available(entry.id, obs))
            .map(|entry| entry.id)
            .collect()
    }

    /// Re-run the check for a single action.
    pub fn is_available(&self, action: ActionId, obs: &Observation) -> bool {
        !self.executed[action.index()] && spec(action).precondition_holds(obs)
    }

    pub fn mark_executed(&mut self, action: ActionId) {
        self.executed[action.index()] = true;
    }

    pub fn is_marked(&self, action: ActionId) -> bool {
        self.executed[action.index()]
    }

    pub fn reset_markers(&mut self) {
        self.executed = [false; ActionId::COUNT];
    }

    /// Bookkeeping after a successful execution.
    ///
    /// Unblocking actions clear all markers, everything else just marks itself.
    pub fn record_execution(&mut self, action: ActionId) {
        if spec(action).unblocks {
            log::debug!("{} unblocks registry, clearing markers", action);
            self.reset_markers();
        } else {
            self.mark_executed(action);
        }
    }
}
