//! Demo card-round simulation.
//!
//! Small deterministic game used to drive the decision loop end to end:
//!
//! ```text
//! MENU → STAGE_SELECT → SELECTING ⇄ (RESOLVING | DRAWING) → ROUND_EVAL → SHOP → STAGE_SELECT …
//!                           └──────────── out of hands ──────────────→ GAME_OVER → MENU
//! ```
//!
//! A played hand scores the sum of its card values times the number of cards.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tickgate_core::{
    ActionId, ActionParams, EffectError, Effector, Entity, Observation, Observer, StateId,
};

const HAND_SIZE: usize = 8;
const MAX_SELECTION: usize = 5;
const HANDS_PER_ROUND: u32 = 4;
const DISCARDS_PER_ROUND: u32 = 3;
const TARGET_PER_STAGE: i64 = 120;

const RANKS: [(&str, i64); 13] = [
    ("2", 2),
    ("3", 3),
    ("4", 4),
    ("5", 5),
    ("6", 6),
    ("7", 7),
    ("8", 8),
    ("9", 9),
    ("10", 10),
    ("Jack", 10),
    ("Queen", 10),
    ("King", 10),
    ("Ace", 11),
];
const SUITS: [&str; 4] = ["Hearts", "Diamonds", "Spades", "Clubs"];

#[derive(Debug, Clone, Copy)]
struct Card {
    rank: usize,
    suit: usize,
}

impl Card {
    fn value(self) -> i64 {
        RANKS[self.rank].1
    }
}

pub struct DemoSim {
    rng: StdRng,
    state: StateId,
    stage: u32,
    score: i64,
    money: i64,
    hands_left: u32,
    discards_left: u32,
    deck: Vec<Card>,
    hand: Vec<Card>,
    selected: Vec<bool>,
    rounds_won: u32,
    runs_lost: u32,
}

impl DemoSim {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            state: StateId::MENU,
            stage: 0,
            score: 0,
            money: 0,
            hands_left: 0,
            discards_left: 0,
            deck: Vec::new(),
            hand: Vec::new(),
            selected: Vec::new(),
            rounds_won: 0,
            runs_lost: 0,
        }
    }

    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn rounds_won(&self) -> u32 {
        self.rounds_won
    }

    pub fn runs_lost(&self) -> u32 {
        self.runs_lost
    }

    fn target(&self) -> i64 {
        TARGET_PER_STAGE * i64::from(self.stage)
    }

    /// Settle transient states. Called once per host tick before the loop runs.
    pub fn advance(&mut self) {
        match self.state {
            StateId::RESOLVING => {
                if self.score >= self.target() {
                    log::info!("Stage {} cleared with {} points", self.stage, self.score);
                    self.rounds_won += 1;
                    self.state = StateId::ROUND_EVAL;
                } else if self.hands_left == 0 {
                    log::info!("Run over at stage {} ({}/{})", self.stage, self.score, self.target());
                    self.runs_lost += 1;
                    self.state = StateId::GAME_OVER;
                } else {
                    self.state = StateId::DRAWING;
                }
            }
            StateId::DRAWING => {
                self.refill();
                self.state = StateId::SELECTING;
            }
            _ => {}
        }
    }

    fn new_run(&mut self) {
        self.stage = 0;
        self.money = 4;
    }

    fn start_stage(&mut self) {
        self.stage += 1;
        self.score = 0;
        self.hands_left = HANDS_PER_ROUND;
        self.discards_left = DISCARDS_PER_ROUND;
        self.deck = (0..RANKS.len())
            .flat_map(|rank| (0..SUITS.len()).map(move |suit| Card { rank, suit }))
            .collect();
        self.deck.shuffle(&mut self.rng);
        self.hand.clear();
        self.selected.clear();
        self.refill();
    }

    fn refill(&mut self) {
        while self.hand.len() < HAND_SIZE {
            let Some(card) = self.deck.pop() else {
                break;
            };
            self.hand.push(card);
            self.selected.push(false);
        }
    }

    fn selected_count(&self) -> usize {
        self.selected.iter().filter(|&&s| s).count()
    }

    /// Remove the selected cards from the hand and return them.
    fn take_selected(&mut self) -> Vec<Card> {
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for (card, selected) in self.hand.drain(..).zip(self.selected.drain(..)) {
            if selected {
                taken.push(card);
            } else {
                kept.push(card);
            }
        }
        self.selected = vec![false; kept.len()];
        self.hand = kept;
        taken
    }

    fn select(&mut self, params: &ActionParams) -> Result<(), EffectError> {
        let indices = &params.indices;
        if indices.is_empty() || indices.len() > MAX_SELECTION {
            return Err(EffectError::new(format!(
                "select 1 to {} cards, got {}",
                MAX_SELECTION,
                indices.len()
            )));
        }
        let mut selected = vec![false; self.hand.len()];
        for &index in indices {
            let slot = (index as usize)
                .checked_sub(1)
                .filter(|&i| i < self.hand.len())
                .ok_or_else(|| EffectError::new(format!("card index {} out of range", index)))?;
            selected[slot] = true;
        }
        self.selected = selected;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), EffectError> {
        if self.selected_count() == 0 {
            return Err(EffectError::new("no cards selected"));
        }
        if self.hands_left == 0 {
            return Err(EffectError::new("no hands left"));
        }
        let played = self.take_selected();
        let chips: i64 = played.iter().map(|c| c.value()).sum();
        let gained = chips * played.len() as i64;
        self.score += gained;
        self.hands_left -= 1;
        log::debug!("Played {} card(s) for {} points", played.len(), gained);
        self.state = StateId::RESOLVING;
        Ok(())
    }

    fn discard(&mut self) -> Result<(), EffectError> {
        if self.selected_count() == 0 {
            return Err(EffectError::new("no cards selected"));
        }
        if self.discards_left == 0 {
            return Err(EffectError::new("no discards left"));
        }
        self.take_selected();
        self.discards_left -= 1;
        self.state = StateId::DRAWING;
        Ok(())
    }

    fn expect_state(&self, state: StateId, action: ActionId) -> Result<(), EffectError> {
        if self.state == state {
            Ok(())
        } else {
            Err(EffectError::new(format!(
                "{} not possible in state {}",
                action, self.state
            )))
        }
    }
}

impl Observer for DemoSim {
    fn observation(&self) -> Observation {
        Observation {
            state: self.state,
            score: self.score,
            target_score: self.target(),
            money: self.money,
            stage: self.stage,
            hands_left: self.hands_left,
            discards_left: self.discards_left,
            selected_count: self.selected_count() as u32,
            hand: self
                .hand
                .iter()
                .zip(&self.selected)
                .map(|(card, &selected)| Entity {
                    rank: RANKS[card.rank].0.to_string(),
                    suit: SUITS[card.suit].to_string(),
                    value: card.value(),
                    selected,
                })
                .collect(),
        }
    }
}

impl Effector for DemoSim {
    fn execute(&mut self, action: ActionId, params: &ActionParams) -> Result<(), EffectError> {
        match action {
            ActionId::StartEpisode => {
                self.expect_state(StateId::MENU, action)?;
                self.new_run();
                self.state = StateId::STAGE_SELECT;
            }
            ActionId::SelectStage => {
                self.expect_state(StateId::STAGE_SELECT, action)?;
                self.start_stage();
                self.state = StateId::SELECTING;
            }
            ActionId::SelectChoice => {
                self.expect_state(StateId::SELECTING, action)?;
                self.select(params)?;
            }
            ActionId::CommitChoice => {
                self.expect_state(StateId::SELECTING, action)?;
                self.commit()?;
            }
            ActionId::DiscardChoice => {
                self.expect_state(StateId::SELECTING, action)?;
                self.discard()?;
            }
            ActionId::CollectReward => {
                self.expect_state(StateId::ROUND_EVAL, action)?;
                self.money += 5 + i64::from(self.hands_left);
                self.state = StateId::SHOP;
            }
            ActionId::LeaveShop => {
                self.expect_state(StateId::SHOP, action)?;
                self.state = StateId::STAGE_SELECT;
            }
            ActionId::RestartEpisode => {
                self.expect_state(StateId::GAME_OVER, action)?;
                self.state = StateId::MENU;
            }
        }
        Ok(())
    }
}
