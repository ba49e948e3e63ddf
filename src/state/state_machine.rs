use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::{
    assign::{ContentPools, SourceEmpty, draw_combination},
    content::RoundContent,
    game::{SeatIndex, Session, Symbol, Variant},
    rules::CasinoMissPolicy,
};

/// Misses a casino guesser may accumulate before the turn rotates.
pub const CASINO_MISSES_PER_TURN: u32 = 3;

/// Round lifecycle derived from the session status and round number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// First round, waiting for the gate to open.
    Setup,
    /// Turns are being played.
    Active,
    /// A later round was dealt and is waiting for the gate again.
    RoundComplete,
}

/// Variant-specific turn pointers of the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnState {
    /// Impostor and mafia have no intra-round pointer.
    Idle,
    Charades {
        /// Seat miming the word.
        showing: SeatIndex,
        /// Seat whose guess is awaited.
        guesser: SeatIndex,
        /// Successful guesses plus one.
        turn: u32,
    },
    Casino {
        guesser: SeatIndex,
        /// Number of guesser rotations plus one.
        current_round: u32,
        /// Misses of the current guesser.
        guesses_in_round: u32,
        /// Empty until the next spin.
        combination: Vec<Symbol>,
    },
    WhoAmI {
        guesser: SeatIndex,
    },
}

impl TurnState {
    /// Seat whose action is awaited, for variants with a turn pointer that moves within a round.
    pub fn turn_holder(&self) -> Option<SeatIndex> {
        match self {
            TurnState::Charades { guesser, .. } | TurnState::Casino { guesser, .. } => {
                Some(*guesser)
            }
            TurnState::Idle | TurnState::WhoAmI { .. } => None,
        }
    }
}

/// Intra-round actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GameAction {
    /// Charades: the current guesser found the word.
    Guessed,
    /// Charades: the current guesser gave up or ran out of time.
    NotGuessed,
    /// Charades: replace the word without moving any pointer.
    SkipWord,
    /// Casino: draw a combination.
    Spin,
    /// Casino: outcome of the guesser's attempt on the current combination.
    GuessResult { correct: bool },
}

/// Error returned when an action does not apply to the session in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {action:?} cannot be applied to {variant} while {phase:?}")]
pub struct InvalidTransition {
    pub variant: Variant,
    pub phase: RoundPhase,
    pub action: GameAction,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The action was issued against an older turn sequence and must be dropped.
    Stale { expected: u64, actual: u64 },
    /// The action is not valid for the variant or phase.
    InvalidTransition(InvalidTransition),
    /// A content pool needed to complete the transition is empty.
    SourceEmpty(SourceEmpty),
}

impl From<SourceEmpty> for PlanError {
    fn from(value: SourceEmpty) -> Self {
        PlanError::SourceEmpty(value)
    }
}

/// A validated transition, ready to be written back as a single session update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub action: GameAction,
    /// Turn sequence the plan was computed from.
    pub from_seq: u64,
    /// Turn sequence to persist with the plan.
    pub seq_next: u64,
    pub content: RoundContent,
    pub turn: TurnState,
}

/// Validate `action` against `session` and compute the next round state.
pub fn plan<R: Rng + ?Sized>(
    session: &Session,
    action: GameAction,
    expected_seq: Option<u64>,
    pools: &ContentPools,
    rng: &mut R,
) -> Result<Plan, PlanError> {
    match expected_seq {
        Some(expected) if expected != session.turn_seq => {
            return Err(PlanError::Stale {
                expected,
                actual: session.turn_seq,
            });
        }
        _ => {}
    }

    let invalid = || {
        PlanError::InvalidTransition(InvalidTransition {
            variant: session.variant(),
            phase: session.phase(),
            action,
        })
    };

    if session.phase() != RoundPhase::Active {
        return Err(invalid());
    }

    let (content, turn) = session
        .rule
        .transition(session, action, pools, rng)?
        .ok_or_else(invalid)?;

    Ok(Plan {
        action,
        from_seq: session.turn_seq,
        seq_next: session.turn_seq + 1,
        content,
        turn,
    })
}

/// Charades pointers after the guesser found the word: they take over the miming.
pub fn charades_guessed(
    guesser: SeatIndex,
    turn: u32,
    capacity: u32,
) -> (SeatIndex, SeatIndex, u32) {
    let showing = guesser;
    let next_guesser = (showing + 1) % capacity;
    (showing, next_guesser, turn + 1)
}

/// Next charades guesser after a miss, skipping the showing seat.
pub fn charades_not_guessed(showing: SeatIndex, guesser: SeatIndex, capacity: u32) -> SeatIndex {
    let next = (guesser + 1) % capacity;
    if next == showing && capacity > 1 {
        (next + 1) % capacity
    } else {
        next
    }
}

/// Casino turn state after a spin or a guess outcome.
///
/// Returns `None` when the action is not legal in the current casino state (for instance a guess
/// outcome with no combination on the table).
pub fn casino_transition<R: Rng + ?Sized>(
    turn: &TurnState,
    action: GameAction,
    symbols: &[Symbol],
    capacity: u32,
    policy: CasinoMissPolicy,
    rng: &mut R,
) -> Option<TurnState> {
    let TurnState::Casino {
        guesser,
        current_round,
        guesses_in_round,
        combination,
    } = turn
    else {
        return None;
    };
    let (guesser, current_round, guesses_in_round) = (*guesser, *current_round, *guesses_in_round);

    let next = match action {
        GameAction::Spin => TurnState::Casino {
            guesser,
            current_round,
            guesses_in_round,
            combination: draw_combination(symbols, guesser, rng),
        },
        GameAction::GuessResult { .. } if combination.is_empty() => return None,
        GameAction::GuessResult { correct: true } => TurnState::Casino {
            guesser,
            current_round,
            guesses_in_round,
            combination: Vec::new(),
        },
        GameAction::GuessResult { correct: false } => {
            let misses = guesses_in_round + 1;
            if misses >= CASINO_MISSES_PER_TURN {
                TurnState::Casino {
                    guesser: (guesser + 1) % capacity,
                    current_round: current_round + 1,
                    guesses_in_round: 0,
                    combination: Vec::new(),
                }
            } else {
                let combination = match policy {
                    CasinoMissPolicy::Clear => Vec::new(),
                    CasinoMissPolicy::Redraw => draw_combination(symbols, guesser, rng),
                };
                TurnState::Casino {
                    guesser,
                    current_round,
                    guesses_in_round: misses,
                    combination,
                }
            }
        }
        GameAction::Guessed | GameAction::NotGuessed | GameAction::SkipWord => return None,
    };

    Some(next)
}
