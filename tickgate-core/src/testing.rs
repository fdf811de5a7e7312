//! Builders and scripted collaborators for tests.

use crate::action::{ActionId, ActionParams};
use crate::observation::{EffectError, Effector, Entity, Observation, Observer, StateId};
use crate::transport::{Transport, TransportError};
use crate::wire::{ActionRequest, ActionResponse, AgentReply};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

const RANKS: [&str; 13] = [
    "2", "3", "4", "5", "6", "7", "8", "9", "10", "Jack", "Queen", "King", "Ace",
];
const SUITS: [&str; 4] = ["Hearts", "Diamonds", "Spades", "Clubs"];

pub struct ObservationBuilder {
    obs: Observation,
}

impl ObservationBuilder {
    pub fn new() -> Self {
        Self {
            obs: Observation::default(),
        }
    }

    /// In the selecting state of the first stage.
    pub fn selecting() -> Self {
        Self::new().state(StateId::SELECTING).stage(1)
    }

    pub fn state(mut self, state: StateId) -> Self {
        self.obs.state = state;
        self
    }

    pub fn score(mut self, score: i64) -> Self {
        self.obs.score = score;
        self
    }

    pub fn money(mut self, money: i64) -> Self {
        self.obs.money = money;
        self
    }

    pub fn stage(mut self, stage: u32) -> Self {
        self.obs.stage = stage;
        self
    }

    pub fn hands_left(mut self, hands: u32) -> Self {
        self.obs.hands_left = hands;
        self
    }

    pub fn discards_left(mut self, discards: u32) -> Self {
        self.obs.discards_left = discards;
        self
    }

    /// Set the selection count and flag the first `count` entities.
    pub fn selected(mut self, count: u32) -> Self {
        self.obs.selected_count = count;
        for (i, entity) in self.obs.hand.iter_mut().enumerate() {
            entity.selected = (i as u32) < count;
        }
        self
    }

    /// Deal `size` entities into the hand.
    pub fn hand_size(mut self, size: usize) -> Self {
        let selected = self.obs.selected_count as usize;
        self.obs.hand = (0..size)
            .map(|i| Entity {
                rank: RANKS[i % RANKS.len()].to_string(),
                suit: SUITS[i % SUITS.len()].to_string(),
                value: (i % RANKS.len()) as i64 + 2,
                selected: i < selected,
            })
            .collect();
        self
    }

    pub fn build(self) -> Observation {
        self.obs
    }
}

impl Default for ObservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulation double: serves scripted observations and records effector calls.
#[derive(Default)]
pub struct ScriptedHost {
    current: RefCell<Observation>,
    queued: RefCell<VecDeque<Observation>>,
    transitions: HashMap<ActionId, Observation>,
    failures: VecDeque<EffectError>,
    calls: Vec<(ActionId, ActionParams)>,
}

impl ScriptedHost {
    pub fn new(obs: Observation) -> Self {
        Self {
            current: RefCell::new(obs),
            ..Default::default()
        }
    }

    /// Replace the current observation.
    pub fn set_observation(&mut self, obs: Observation) {
        *self.current.get_mut() = obs;
        self.queued.get_mut().clear();
    }

    /// Queue an observation to become current on the next `observation()` call.
    pub fn then_observe(&mut self, obs: Observation) {
        self.queued.get_mut().push_back(obs);
    }

    /// After `action` succeeds the simulation moves to `obs`.
    pub fn on_success(&mut self, action: ActionId, obs: Observation) {
        self.transitions.insert(action, obs);
    }

    /// Make the next execution fail.
    pub fn fail_next(&mut self, reason: &str) {
        self.failures.push_back(EffectError::new(reason));
    }

    /// Every effector call, including failed ones.
    pub fn calls(&self) -> &[(ActionId, ActionParams)] {
        &self.calls
    }
}

impl Observer for ScriptedHost {
    fn observation(&self) -> Observation {
        if let Some(next) = self.queued.borrow_mut().pop_front() {
            *self.current.borrow_mut() = next;
        }
        self.current.borrow().clone()
    }
}

impl Effector for ScriptedHost {
    fn execute(&mut self, action: ActionId, params: &ActionParams) -> Result<(), EffectError> {
        self.calls.push((action, params.clone()));
        if let Some(err) = self.failures.pop_front() {
            return Err(err);
        }
        if let Some(next) = self.transitions.get(&action) {
            *self.current.get_mut() = next.clone();
        }
        Ok(())
    }
}

/// Transport double: replays scripted replies and records every request.
///
/// Once the script runs out every call times out.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Result<AgentReply, TransportError>>,
    requests: Vec<ActionRequest>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(mut self) -> Self {
        self.replies.push_back(Ok(AgentReply::Ready));
        self
    }

    pub fn decision(mut self, action: ActionId, params: ActionParams) -> Self {
        self.replies
            .push_back(Ok(AgentReply::Decision(ActionResponse { action, params })));
        self
    }

    pub fn error(mut self, err: TransportError) -> Self {
        self.replies.push_back(Err(err));
        self
    }

    pub fn push_decision(&mut self, action: ActionId, params: ActionParams) {
        self.replies
            .push_back(Ok(AgentReply::Decision(ActionResponse { action, params })));
    }

    pub fn requests(&self) -> &[ActionRequest] {
        &self.requests
    }
}

impl Transport for ScriptedTransport {
    fn request_action(&mut self, request: &ActionRequest) -> Result<AgentReply, TransportError> {
        self.requests.push(request.clone());
        self.replies
            .pop_front()
            .unwrap_or(Err(TransportError::Timeout(Duration::ZERO)))
    }
}
