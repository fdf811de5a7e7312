//! Change detection for the control loop.
//!
//! A [`Fingerprint`] reduces an observation plus its legal-action set to the
//! fields the loop must react to. Two ticks with equal fingerprints need no
//! new decision. Entity descriptors are deliberately left out; anything the
//! agent can act on shows up in the counters or the legal set.

use crate::observation::{Observation, StateId};
use crate::registry::LegalActions;
use std::fmt;

/// Comparable summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    state: StateId,
    score: i64,
    money: i64,
    stage: u32,
    hands_left: u32,
    discards_left: u32,
    selected_count: u32,
    /// Wire codes of the legal actions, ascending.
    legal: Vec<u8>,
}

/// Compute the fingerprint for a tick. Pure and deterministic.
pub fn fingerprint(obs: &Observation, legal: &LegalActions) -> Fingerprint {
    let mut codes: Vec<u8> = legal.iter().map(|a| a.code()).collect();
    // LegalActions already iterates in order; sort anyway so the key never
    // depends on how the set was produced.
    codes.sort_unstable();

    Fingerprint {
        state: obs.state,
        score: obs.score,
        money: obs.money,
        stage: obs.stage,
        hands_left: obs.hands_left,
        discards_left: obs.discards_left,
        selected_count: obs.selected_count,
        legal: codes,
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legal = self
            .legal
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}|[{}]",
            self.state,
            self.score,
            self.money,
            self.stage,
            self.hands_left,
            self.discards_left,
            self.selected_count,
            legal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionId;
    use crate::observation::Entity;
    use crate::testing::ObservationBuilder;
    use proptest::prelude::*;

    fn legal_from_codes(codes: &[u8]) -> LegalActions {
        codes
            .iter()
            .filter_map(|&c| ActionId::from_code(i64::from(c)))
            .collect()
    }

    #[test]
    fn test_display_key() {
        let obs = ObservationBuilder::selecting()
            .score(120)
            .hands_left(3)
            .discards_left(2)
            .selected(1)
            .build();
        let legal = legal_from_codes(&[3, 2]);

        assert_eq!(fingerprint(&obs, &legal).to_string(), "1|120|0|1|3|2|1|[2,3]");
    }

    #[test]
    fn test_entity_details_are_ignored() {
        let obs = ObservationBuilder::selecting().hand_size(4).build();
        let mut other = obs.clone();
        other.hand[0] = Entity {
            rank: "Queen".into(),
            suit: "Spades".into(),
            value: 10,
            selected: false,
        };
        let legal = legal_from_codes(&[1]);

        assert_eq!(fingerprint(&obs, &legal), fingerprint(&other, &legal));
    }

    fn arb_observation() -> impl Strategy<Value = Observation> {
        (
            0u32..16,
            -1000i64..1000,
            -1000i64..1000,
            0u32..10,
            0u32..6,
            0u32..6,
            0u32..6,
        )
            .prop_map(|(state, score, money, stage, hands, discards, selected)| {
                ObservationBuilder::new()
                    .state(StateId(state))
                    .score(score)
                    .money(money)
                    .stage(stage)
                    .hands_left(hands)
                    .discards_left(discards)
                    .selected(selected)
                    .build()
            })
    }

    proptest! {
        #[test]
        fn prop_deterministic_and_order_independent(
            obs in arb_observation(),
            codes in proptest::collection::vec(1u8..=8, 0..8)
        ) {
            let forward = legal_from_codes(&codes);
            let mut reversed_codes = codes.clone();
            reversed_codes.reverse();
            let reversed = legal_from_codes(&reversed_codes);

            let a = fingerprint(&obs, &forward);
            let b = fingerprint(&obs, &forward);
            let c = fingerprint(&obs, &reversed);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(&a, &c);
        }

        #[test]
        fn prop_tracked_fields_change_the_fingerprint(
            obs in arb_observation(),
            codes in proptest::collection::vec(1u8..=8, 0..8),
            field in 0usize..7,
            delta in 1u32..5
        ) {
            let legal = legal_from_codes(&codes);
            let mut changed = obs.clone();
            match field {
                0 => changed.state = StateId(obs.state.0 + delta),
                1 => changed.score += i64::from(delta),
                2 => changed.money += i64::from(delta),
                3 => changed.stage += delta,
                4 => changed.hands_left += delta,
                5 => changed.discards_left += delta,
                _ => changed.selected_count += delta,
            }
            prop_assert_ne!(fingerprint(&obs, &legal), fingerprint(&changed, &legal));
        }

        #[test]
        fn prop_legal_membership_changes_the_fingerprint(
            obs in arb_observation(),
            codes in proptest::collection::vec(1u8..=8, 0..8),
            toggle in 1u8..=8
        ) {
            let legal = legal_from_codes(&codes);
            let action = ActionId::from_code(i64::from(toggle)).unwrap();
            let mut toggled: Vec<ActionId> = legal.iter().filter(|a| *a != action).collect();
            if !legal.contains(action) {
                toggled.push(action);
            }
            let toggled: LegalActions = toggled.into_iter().collect();

            prop_assert_ne!(fingerprint(&obs, &legal), fingerprint(&obs, &toggled));
        }
    }
}
