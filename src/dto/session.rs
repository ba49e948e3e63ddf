use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::format_system_time,
    services::turn_service::ActionOutcome,
    state::{
        content::SeatView,
        game::{Seat, SeatIndex, Session, SessionStatus, Variant},
        rules::CasinoMissPolicy,
        state_machine::{GameAction, RoundPhase, TurnState},
    },
};

/// Payload used to open a new room.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    pub variant: Variant,
    /// Number of seats, host included when it occupies one. Per-variant minimums apply.
    #[validate(range(min = 2, max = 20))]
    pub capacity: u32,
    /// Casino only: what happens to the combination after a wrong guess.
    #[serde(default)]
    pub miss_policy: Option<CasinoMissPolicy>,
    /// Defaults to `true`: the host device plays on the last seat.
    #[serde(default)]
    pub host_occupies_seat: Option<bool>,
}

/// Public description of a session, safe to show to anyone holding the code.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    #[schema(value_type = String, example = "K7QX2M")]
    pub code: String,
    pub variant: Variant,
    pub capacity: u32,
    pub host_occupies_seat: bool,
    pub status: SessionStatus,
    pub phase: RoundPhase,
    pub round: u32,
    pub turn_seq: u64,
    pub turn: TurnState,
    pub starting_seat: Option<SeatIndex>,
    pub seated: Vec<SeatIndex>,
    /// Link players open to join.
    pub join_url: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl SessionSummary {
    pub fn new(session: &Session, seats: &[Seat], join_url: String) -> Self {
        Self {
            code: session.code.to_string(),
            variant: session.variant(),
            capacity: session.capacity,
            host_occupies_seat: session.host_occupies_seat,
            status: session.status,
            phase: session.phase(),
            round: session.round,
            turn_seq: session.turn_seq,
            turn: session.turn.clone(),
            starting_seat: session.starting_seat,
            seated: seats.iter().map(|seat| seat.index).collect(),
            join_url,
            created_at: format_system_time(session.created_at),
        }
    }
}

/// Seat claim. A device that already knows its seat (from its join link) sends it back.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct ClaimSeatRequest {
    #[serde(default)]
    #[validate(range(max = 19))]
    pub seat: Option<SeatIndex>,
}

/// Seat held by the caller after a claim or an observation.
#[derive(Debug, Serialize, ToSchema)]
pub struct SeatClaimed {
    pub seat: SeatIndex,
    /// Round the seat last acknowledged.
    pub observed_round: Option<u32>,
    /// Join link carrying the seat, for reconnecting.
    pub join_url: String,
}

/// What one seat may see of the current round.
#[derive(Debug, Serialize, ToSchema)]
pub struct SeatViewResponse {
    pub seat: SeatIndex,
    pub round: u32,
    pub phase: RoundPhase,
    pub view: SeatView,
    pub starting_seat: Option<SeatIndex>,
}

/// Intra-round action, optionally stamped with the turn sequence it was issued against.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActionRequest {
    #[serde(flatten)]
    pub action: GameAction,
    #[serde(default)]
    pub expected_seq: Option<u64>,
}

/// Outcome of an action. A stale action is not an error: `applied` is false and nothing changed.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub applied: bool,
    /// Current turn sequence of the session.
    pub turn_seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<TurnState>,
}

impl From<ActionOutcome> for ActionResponse {
    fn from(outcome: ActionOutcome) -> Self {
        match outcome {
            ActionOutcome::Applied(session) => Self {
                applied: true,
                turn_seq: session.turn_seq,
                turn: Some(session.turn),
            },
            ActionOutcome::Stale { actual, .. } => Self {
                applied: false,
                turn_seq: actual,
                turn: None,
            },
        }
    }
}

/// Query of the per-device event stream.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventsQuery {
    /// Seat the device held before, taken from its join link.
    pub p: Option<SeatIndex>,
    /// Connect as the host device.
    #[serde(default)]
    pub host: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_request_accepts_a_flat_payload() {
        let request: ActionRequest = serde_json::from_str(
            r#"{ "action": "guess_result", "correct": false, "expected_seq": 4 }"#,
        )
        .unwrap();
        assert_eq!(request.action, GameAction::GuessResult { correct: false });
        assert_eq!(request.expected_seq, Some(4));

        let request: ActionRequest = serde_json::from_str(r#"{ "action": "spin" }"#).unwrap();
        assert_eq!(request.action, GameAction::Spin);
        assert_eq!(request.expected_seq, None);
    }

    #[test]
    fn capacity_above_the_hard_limit_fails_validation() {
        let request: CreateSessionRequest =
            serde_json::from_str(r#"{ "variant": "charades", "capacity": 21 }"#).unwrap();
        assert!(request.validate().is_err());

        let request: CreateSessionRequest =
            serde_json::from_str(r#"{ "variant": "who_am_i", "capacity": 2 }"#).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.host_occupies_seat, None);
    }

    #[test]
    fn stale_outcome_reports_the_current_sequence() {
        let response = ActionResponse::from(ActionOutcome::Stale {
            expected: 3,
            actual: 5,
        });
        assert!(!response.applied);
        assert_eq!(response.turn_seq, 5);
    }
}
