//! Action identifiers and their parameters.
//!
//! Every action the agent can ask for is a variant of [`ActionId`]. The
//! discriminant is the integer the agent sees on the wire, so variants may be
//! appended but never renumbered.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Closed catalog of actions the controller can apply to the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ActionId {
    /// Select a subset of the entities in hand (params: 1-based `indices`).
    SelectChoice = 1,
    /// Commit the current selection.
    CommitChoice = 2,
    /// Throw away the current selection.
    DiscardChoice = 3,
    /// Leave the main menu and start a new episode.
    StartEpisode = 4,
    /// Accept the offered stage.
    SelectStage = 5,
    /// Start over after a terminal state.
    RestartEpisode = 6,
    /// Collect the reward screen after clearing a stage.
    CollectReward = 7,
    /// Leave the shop and move on to the next stage.
    LeaveShop = 8,
}

impl ActionId {
    pub const ALL: [ActionId; 8] = [
        ActionId::SelectChoice,
        ActionId::CommitChoice,
        ActionId::DiscardChoice,
        ActionId::StartEpisode,
        ActionId::SelectStage,
        ActionId::RestartEpisode,
        ActionId::CollectReward,
        ActionId::LeaveShop,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Wire code for this action.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up an action by wire code. Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| i64::from(a.code()) == code)
    }

    /// Dense zero-based index, used for per-action tables.
    pub(crate) const fn index(self) -> usize {
        self as usize - 1
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionId::SelectChoice => "select_choice",
            ActionId::CommitChoice => "commit_choice",
            ActionId::DiscardChoice => "discard_choice",
            ActionId::StartEpisode => "start_episode",
            ActionId::SelectStage => "select_stage",
            ActionId::RestartEpisode => "restart_episode",
            ActionId::CollectReward => "collect_reward",
            ActionId::LeaveShop => "leave_shop",
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

impl Serialize for ActionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for ActionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        ActionId::from_code(code).ok_or_else(|| D::Error::custom(format!("unknown action id {code}")))
    }
}

/// Whether an action needs the agent's judgement or is a forced continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    /// Requires agent input (selecting, committing, discarding).
    CoreDecision,
    /// Mechanically forced step with no real choice (menus, single-option screens).
    Structural,
}

/// Action-specific parameters carried in a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParams {
    /// 1-based entity indices for selection actions.
    #[serde(default, alias = "card_indices")]
    pub indices: Vec<u32>,
}

impl ActionParams {
    pub fn with_indices(indices: impl Into<Vec<u32>>) -> Self {
        Self {
            indices: indices.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
