//! Per-variant behaviour: how a round is dealt and how intra-round actions move it forward.

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{
    assign::{
        ContentPools, SourceEmpty, deal_symbols, draw_fresh_word, partition_teams, pick_seat,
        team_size,
    },
    content::RoundContent,
    game::{Session, Variant},
    state_machine::{
        GameAction, TurnState, casino_transition, charades_guessed, charades_not_guessed,
    },
};

/// What a casino miss does to the combination when the guesser keeps the turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CasinoMissPolicy {
    /// The guesser spins again.
    #[default]
    Clear,
    /// A new combination is drawn immediately.
    Redraw,
}

/// Condition that opens a waiting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealGate {
    /// Every seat acknowledged the current round's content.
    AllObserved,
    /// Every seat is claimed.
    AllSeated,
}

/// Variant tag plus the variant's configuration, persisted with the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum GameRule {
    Impostor,
    Mafia {
        team_size: u32,
    },
    Charades,
    Casino {
        #[serde(default)]
        miss_policy: CasinoMissPolicy,
    },
    WhoAmI,
}

/// Content and initial turn pointers of a freshly dealt round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundDraw {
    pub content: RoundContent,
    pub turn: TurnState,
}

impl GameRule {
    /// Default configuration of `variant` for a table of `capacity`.
    pub fn for_variant(variant: Variant, capacity: u32, miss_policy: CasinoMissPolicy) -> Self {
        match variant {
            Variant::Impostor => GameRule::Impostor,
            Variant::Mafia => GameRule::Mafia {
                team_size: team_size(capacity),
            },
            Variant::Charades => GameRule::Charades,
            Variant::Casino => GameRule::Casino { miss_policy },
            Variant::WhoAmI => GameRule::WhoAmI,
        }
    }

    pub fn variant(&self) -> Variant {
        match self {
            GameRule::Impostor => Variant::Impostor,
            GameRule::Mafia { .. } => Variant::Mafia,
            GameRule::Charades => Variant::Charades,
            GameRule::Casino { .. } => Variant::Casino,
            GameRule::WhoAmI => Variant::WhoAmI,
        }
    }

    pub fn gate(&self) -> RevealGate {
        match self {
            GameRule::Impostor | GameRule::Mafia { .. } | GameRule::WhoAmI => {
                RevealGate::AllObserved
            }
            GameRule::Charades | GameRule::Casino { .. } => RevealGate::AllSeated,
        }
    }

    /// Whether a new round drops every seat claim, forcing devices to re-claim.
    pub fn clears_seats_each_round(&self) -> bool {
        matches!(
            self,
            GameRule::Impostor | GameRule::Mafia { .. } | GameRule::WhoAmI
        )
    }

    /// Whether claiming a seat also counts as observing its content.
    pub fn observes_on_join(&self) -> bool {
        matches!(self, GameRule::Impostor | GameRule::WhoAmI)
    }

    /// Deal a round. `previous` is the session being reset, if any; seats picked for the new round
    /// avoid the ones it used.
    pub fn assign_content<R: Rng + ?Sized>(
        &self,
        capacity: u32,
        previous: Option<&Session>,
        pools: &ContentPools,
        rng: &mut R,
    ) -> Result<RoundDraw, SourceEmpty> {
        let previous = previous.map(|session| (&session.content, &session.turn));

        let draw = match self {
            GameRule::Impostor => {
                let (last_word, last_odd) = match previous {
                    Some((RoundContent::Impostor { word, odd_seat }, _)) => {
                        (Some(word), Some(*odd_seat))
                    }
                    _ => (None, None),
                };
                let word = draw_fresh_word(&pools.impostor_words, "impostor_words", last_word, rng)?;
                RoundDraw {
                    content: RoundContent::Impostor {
                        word,
                        odd_seat: pick_seat(capacity, last_odd, rng),
                    },
                    turn: TurnState::Idle,
                }
            }
            GameRule::Mafia { team_size } => RoundDraw {
                content: RoundContent::Mafia {
                    roles: partition_teams(capacity, *team_size, rng),
                },
                turn: TurnState::Idle,
            },
            GameRule::Charades => {
                let (last_word, last_showing) = match previous {
                    Some((RoundContent::Charades { word }, TurnState::Charades { showing, .. })) => {
                        (Some(word), Some(*showing))
                    }
                    _ => (None, None),
                };
                let word = draw_fresh_word(&pools.charades_words, "charades_words", last_word, rng)?;
                let showing = pick_seat(capacity, last_showing, rng);
                RoundDraw {
                    content: RoundContent::Charades { word },
                    turn: TurnState::Charades {
                        showing,
                        guesser: (showing + 1) % capacity.max(1),
                        turn: 1,
                    },
                }
            }
            GameRule::Casino { .. } => {
                let (guesser, current_round) = match previous {
                    Some((
                        _,
                        TurnState::Casino {
                            guesser,
                            current_round,
                            ..
                        },
                    )) => (*guesser, *current_round),
                    _ => (0, 1),
                };
                RoundDraw {
                    content: RoundContent::Casino {
                        symbols: deal_symbols(capacity, &pools.casino_palette, rng)?,
                    },
                    turn: TurnState::Casino {
                        guesser,
                        current_round,
                        guesses_in_round: 0,
                        combination: Vec::new(),
                    },
                }
            }
            GameRule::WhoAmI => {
                let (last_character, last_guesser) = match previous {
                    Some((RoundContent::WhoAmI { character }, TurnState::WhoAmI { guesser })) => {
                        (Some(character), Some(*guesser))
                    }
                    _ => (None, None),
                };
                let character =
                    draw_fresh_word(&pools.characters, "characters", last_character, rng)?;
                RoundDraw {
                    content: RoundContent::WhoAmI { character },
                    turn: TurnState::WhoAmI {
                        guesser: pick_seat(capacity, last_guesser, rng),
                    },
                }
            }
        };

        Ok(draw)
    }

    /// Apply an intra-round action. `Ok(None)` means the action does not apply to this rule or
    /// state.
    pub fn transition<R: Rng + ?Sized>(
        &self,
        session: &Session,
        action: GameAction,
        pools: &ContentPools,
        rng: &mut R,
    ) -> Result<Option<(RoundContent, TurnState)>, SourceEmpty> {
        let capacity = session.capacity;

        let next = match (self, &session.content, &session.turn) {
            (
                GameRule::Charades,
                RoundContent::Charades { word },
                TurnState::Charades {
                    showing,
                    guesser,
                    turn,
                },
            ) => match action {
                GameAction::Guessed => {
                    let word =
                        draw_fresh_word(&pools.charades_words, "charades_words", Some(word), rng)?;
                    let (showing, guesser, turn) = charades_guessed(*guesser, *turn, capacity);
                    Some((
                        RoundContent::Charades { word },
                        TurnState::Charades {
                            showing,
                            guesser,
                            turn,
                        },
                    ))
                }
                GameAction::NotGuessed => Some((
                    session.content.clone(),
                    TurnState::Charades {
                        showing: *showing,
                        guesser: charades_not_guessed(*showing, *guesser, capacity),
                        turn: *turn,
                    },
                )),
                GameAction::SkipWord => {
                    let word =
                        draw_fresh_word(&pools.charades_words, "charades_words", Some(word), rng)?;
                    Some((RoundContent::Charades { word }, session.turn.clone()))
                }
                GameAction::Spin | GameAction::GuessResult { .. } => None,
            },
            (GameRule::Casino { miss_policy }, RoundContent::Casino { symbols }, turn) => {
                casino_transition(turn, action, symbols, capacity, *miss_policy, rng)
                    .map(|turn| (session.content.clone(), turn))
            }
            _ => None,
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::state::{
        content::MafiaRole,
        game::{SessionStatus, Symbol, Word},
    };

    fn pools() -> ContentPools {
        ContentPools {
            impostor_words: vec![Word::plain("harbor"), Word::plain("violin")],
            charades_words: vec![Word::plain("giraffe")],
            characters: vec![Word::plain("Cleopatra"), Word::plain("Einstein")],
            casino_palette: ["A", "B", "C"].into_iter().map(|s| Symbol(s.into())).collect(),
        }
    }

    fn session_from(rule: GameRule, capacity: u32, draw: RoundDraw) -> Session {
        Session {
            code: "ABCDEF".parse().unwrap(),
            rule,
            capacity,
            host_occupies_seat: true,
            status: SessionStatus::Waiting,
            round: 1,
            turn_seq: 0,
            content: draw.content,
            turn: draw.turn,
            starting_seat: None,
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn mafia_rule_is_sized_from_capacity() {
        assert_eq!(
            GameRule::for_variant(Variant::Mafia, 13, CasinoMissPolicy::Clear),
            GameRule::Mafia { team_size: 3 }
        );
    }

    #[test]
    fn mafia_deal_matches_team_size() {
        let mut rng = StdRng::seed_from_u64(2);
        let rule = GameRule::Mafia { team_size: 2 };
        let draw = rule.assign_content(7, None, &pools(), &mut rng).unwrap();
        match draw.content {
            RoundContent::Mafia { roles } => {
                assert_eq!(roles.len(), 7);
                assert_eq!(roles.iter().filter(|r| **r == MafiaRole::Mafia).count(), 2);
            }
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[test]
    fn impostor_odd_seat_moves_between_rounds() {
        let mut rng = StdRng::seed_from_u64(8);
        let rule = GameRule::Impostor;
        let first = rule.assign_content(6, None, &pools(), &mut rng).unwrap();
        let mut session = session_from(rule, 6, first);

        for _ in 0..20 {
            let next = rule
                .assign_content(6, Some(&session), &pools(), &mut rng)
                .unwrap();
            match (&session.content, &next.content) {
                (
                    RoundContent::Impostor {
                        odd_seat: before,
                        word: old,
                    },
                    RoundContent::Impostor {
                        odd_seat: after,
                        word: new,
                    },
                ) => {
                    assert_ne!(before, after);
                    assert_ne!(old, new);
                }
                other => panic!("unexpected content: {other:?}"),
            }
            session.content = next.content;
        }
    }

    #[test]
    fn charades_guesser_follows_the_showing_seat() {
        let mut rng = StdRng::seed_from_u64(4);
        let draw = GameRule::Charades
            .assign_content(4, None, &pools(), &mut rng)
            .unwrap();
        match draw.turn {
            TurnState::Charades {
                showing,
                guesser,
                turn,
            } => {
                assert_eq!(guesser, (showing + 1) % 4);
                assert_eq!(turn, 1);
            }
            other => panic!("unexpected turn: {other:?}"),
        }
    }

    #[test]
    fn casino_new_round_keeps_the_guesser_and_resets_misses() {
        let mut rng = StdRng::seed_from_u64(6);
        let rule = GameRule::Casino {
            miss_policy: CasinoMissPolicy::Clear,
        };
        let first = rule.assign_content(3, None, &pools(), &mut rng).unwrap();
        let mut session = session_from(rule, 3, first);
        session.turn = TurnState::Casino {
            guesser: 2,
            current_round: 4,
            guesses_in_round: 2,
            combination: vec![Symbol("A".into())],
        };

        let next = rule
            .assign_content(3, Some(&session), &pools(), &mut rng)
            .unwrap();
        assert_eq!(
            next.turn,
            TurnState::Casino {
                guesser: 2,
                current_round: 4,
                guesses_in_round: 0,
                combination: Vec::new(),
            }
        );
    }

    #[test]
    fn who_am_i_picks_a_new_guesser() {
        let mut rng = StdRng::seed_from_u64(10);
        let rule = GameRule::WhoAmI;
        let first = rule.assign_content(2, None, &pools(), &mut rng).unwrap();
        let session = session_from(rule, 2, first);
        let next = rule
            .assign_content(2, Some(&session), &pools(), &mut rng)
            .unwrap();

        match (&session.turn, &next.turn) {
            (TurnState::WhoAmI { guesser: before }, TurnState::WhoAmI { guesser: after }) => {
                assert_ne!(before, after)
            }
            other => panic!("unexpected turn: {other:?}"),
        }
    }

    #[test]
    fn empty_character_pool_fails_the_deal() {
        let mut rng = StdRng::seed_from_u64(0);
        let pools = ContentPools {
            characters: Vec::new(),
            ..pools()
        };
        assert_eq!(
            GameRule::WhoAmI.assign_content(3, None, &pools, &mut rng),
            Err(SourceEmpty("characters"))
        );
    }

    #[test]
    fn gates_and_seat_policies_per_variant() {
        assert_eq!(GameRule::Charades.gate(), RevealGate::AllSeated);
        assert_eq!(GameRule::WhoAmI.gate(), RevealGate::AllObserved);
        assert!(GameRule::Mafia { team_size: 1 }.clears_seats_each_round());
        assert!(!GameRule::Mafia { team_size: 1 }.observes_on_join());
        assert!(
            !GameRule::Casino {
                miss_policy: CasinoMissPolicy::Clear
            }
            .clears_seats_each_round()
        );
    }
}
