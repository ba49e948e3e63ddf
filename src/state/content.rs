//! Secret round material and the per-seat projection of it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{
    game::{SeatIndex, Symbol, Word},
    state_machine::TurnState,
};

/// Hidden role dealt to a mafia seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MafiaRole {
    Mafia,
    Civilian,
}

/// Secret material of the current round. Replaced wholesale on every new round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundContent {
    /// Shared word; `odd_seat` does not receive it.
    Impostor { word: Word, odd_seat: SeatIndex },
    /// One role per seat, indexed by seat.
    Mafia { roles: Vec<MafiaRole> },
    /// Word mimed by the showing seat (tracked in the turn state).
    Charades { word: Word },
    /// One symbol per seat, indexed by seat.
    Casino { symbols: Vec<Symbol> },
    /// Character owned by the guesser (tracked in the turn state) and visible to everyone else.
    WhoAmI { character: Word },
}

/// What one seat is allowed to see of the round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeatView {
    /// Impostor: the shared word.
    Word { word: Word },
    /// Impostor: this seat is the odd one out.
    Impostor,
    /// Mafia: own role; mafia seats also see their teammates.
    Role {
        role: MafiaRole,
        teammates: Vec<SeatIndex>,
    },
    /// Charades: this seat mimes the word.
    Showing { word: Word },
    /// Charades: this seat guesses; `my_turn` when the guesser pointer is on it.
    Guessing { my_turn: bool },
    /// Casino: own symbol; `guessing` when this seat is the current guesser.
    Symbol { symbol: Symbol, guessing: bool },
    /// Who-am-I: this seat must guess its own character.
    Guesser,
    /// Who-am-I: the character of `guesser`.
    Character { character: Word, guesser: SeatIndex },
}

impl RoundContent {
    /// Project the round onto `seat`. Returns `None` when the seat is outside the dealt content.
    pub fn view_for(&self, seat: SeatIndex, turn: &TurnState) -> Option<SeatView> {
        match (self, turn) {
            (RoundContent::Impostor { word, odd_seat }, _) => Some(if seat == *odd_seat {
                SeatView::Impostor
            } else {
                SeatView::Word { word: word.clone() }
            }),
            (RoundContent::Mafia { roles }, _) => {
                let role = *roles.get(seat as usize)?;
                let teammates = match role {
                    MafiaRole::Mafia => mafia_seats(roles)
                        .filter(|other| *other != seat)
                        .collect(),
                    MafiaRole::Civilian => Vec::new(),
                };
                Some(SeatView::Role { role, teammates })
            }
            (RoundContent::Charades { word }, TurnState::Charades { showing, guesser, .. }) => {
                Some(if seat == *showing {
                    SeatView::Showing { word: word.clone() }
                } else {
                    SeatView::Guessing {
                        my_turn: seat == *guesser,
                    }
                })
            }
            (RoundContent::Casino { symbols }, TurnState::Casino { guesser, .. }) => {
                let symbol = symbols.get(seat as usize)?.clone();
                Some(SeatView::Symbol {
                    symbol,
                    guessing: seat == *guesser,
                })
            }
            (RoundContent::WhoAmI { character }, TurnState::WhoAmI { guesser }) => {
                Some(if seat == *guesser {
                    SeatView::Guesser
                } else {
                    SeatView::Character {
                        character: character.clone(),
                        guesser: *guesser,
                    }
                })
            }
            _ => None,
        }
    }
}

/// Seats holding the mafia role.
pub fn mafia_seats(roles: &[MafiaRole]) -> impl Iterator<Item = SeatIndex> + '_ {
    roles
        .iter()
        .enumerate()
        .filter(|(_, role)| **role == MafiaRole::Mafia)
        .map(|(index, _)| index as SeatIndex)
}
