//! Edge detection over successive session snapshots seen by one device.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    game::{SeatIndex, Session, SessionStatus},
    state_machine::RoundPhase,
};

/// One-shot notification raised by a device when a transition concerns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotifyReason {
    /// The round's gate opened; raised once per round.
    Revealed { round: u32 },
    /// The turn pointer just moved onto this device's seat.
    MyTurn { turn_seq: u64 },
}

/// Remembers what a device has already been told so every edge fires exactly once, whatever order
/// and however many times snapshots arrive.
#[derive(Debug, Clone, Default)]
pub struct ReconcileTracker {
    baseline_taken: bool,
    revealed_round: Option<u32>,
    turn_holder: Option<SeatIndex>,
}

impl ReconcileTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `session` into the tracker and return the notifications it triggers for the device on
    /// seat `me`.
    ///
    /// The first snapshot is a baseline: a round that is already revealed is recorded silently.
    pub fn absorb(&mut self, session: &Session, me: Option<SeatIndex>) -> Vec<NotifyReason> {
        let mut edges = Vec::new();
        let baseline = !self.baseline_taken;
        self.baseline_taken = true;

        if session.status == SessionStatus::Active && self.revealed_round != Some(session.round) {
            self.revealed_round = Some(session.round);
            if !baseline {
                edges.push(NotifyReason::Revealed {
                    round: session.round,
                });
            }
        }

        let holder = match session.phase() {
            RoundPhase::Active => session.turn.turn_holder(),
            RoundPhase::Setup | RoundPhase::RoundComplete => None,
        };
        if holder.is_some() && holder == me && self.turn_holder != holder {
            edges.push(NotifyReason::MyTurn {
                turn_seq: session.turn_seq,
            });
        }
        self.turn_holder = holder;

        edges
    }
}
