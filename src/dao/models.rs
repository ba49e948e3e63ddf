use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::SystemTime;

use crate::state::{
    content::RoundContent,
    game::{InvalidSessionCode, Seat, SeatIndex, Session, SessionCode, SessionStatus},
    rules::GameRule,
    state_machine::TurnState,
};

/// Key of a session record in the sessions table.
pub fn session_key(code: &SessionCode) -> String {
    code.as_str().to_string()
}

/// Key of a seat record in the seats table: `CODE/index`.
pub fn seat_key(code: &SessionCode, index: SeatIndex) -> String {
    format!("{code}/{index}")
}

/// Session record as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    pub code: String,
    pub rule: GameRule,
    pub capacity: u32,
    pub host_occupies_seat: bool,
    pub status: SessionStatus,
    pub round: u32,
    pub turn_seq: u64,
    pub content: RoundContent,
    pub turn: TurnState,
    pub starting_seat: Option<SeatIndex>,
    pub created_at: SystemTime,
}

/// Partial update of a session record; absent fields are left untouched.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub round: Option<u32>,
    pub turn_seq: Option<u64>,
    pub content: Option<RoundContent>,
    pub turn: Option<TurnState>,
    /// `Some(None)` clears the starting seat.
    pub starting_seat: Option<Option<SeatIndex>>,
}

/// Field values a session record must still hold for a guarded update to land.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SessionGuard {
    pub status: Option<SessionStatus>,
    pub round: Option<u32>,
    pub turn_seq: Option<u64>,
}

impl SessionGuard {
    /// The record is still at `round` and has not moved past `turn_seq`.
    pub fn at(round: u32, turn_seq: u64) -> Self {
        Self {
            round: Some(round),
            turn_seq: Some(turn_seq),
            ..Self::default()
        }
    }

    /// The record is still at `round`.
    pub fn round(round: u32) -> Self {
        Self {
            round: Some(round),
            ..Self::default()
        }
    }

    /// The record is still waiting on `round`.
    pub fn waiting(round: u32) -> Self {
        Self {
            status: Some(SessionStatus::Waiting),
            round: Some(round),
            ..Self::default()
        }
    }
}

/// Seat claim as persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatEntity {
    pub index: SeatIndex,
    pub claimed_at: SystemTime,
    #[serde(default)]
    pub observed_round: Option<u32>,
    #[serde(default)]
    pub observed_at: Option<SystemTime>,
}

/// Partial update of a seat record.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SeatPatch {
    pub observed_round: Option<Option<u32>>,
    pub observed_at: Option<Option<SystemTime>>,
}

impl SeatPatch {
    /// Mark the seat as having observed `round` now.
    pub fn observed(round: u32) -> Self {
        Self {
            observed_round: Some(Some(round)),
            observed_at: Some(Some(SystemTime::now())),
        }
    }

    /// Forget any observation.
    pub fn cleared() -> Self {
        Self {
            observed_round: Some(None),
            observed_at: Some(None),
        }
    }
}

impl From<&Session> for SessionEntity {
    fn from(session: &Session) -> Self {
        Self {
            code: session.code.to_string(),
            rule: session.rule,
            capacity: session.capacity,
            host_occupies_seat: session.host_occupies_seat,
            status: session.status,
            round: session.round,
            turn_seq: session.turn_seq,
            content: session.content.clone(),
            turn: session.turn.clone(),
            starting_seat: session.starting_seat,
            created_at: session.created_at,
        }
    }
}

impl TryFrom<SessionEntity> for Session {
    type Error = InvalidSessionCode;

    fn try_from(entity: SessionEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            code: entity.code.parse()?,
            rule: entity.rule,
            capacity: entity.capacity,
            host_occupies_seat: entity.host_occupies_seat,
            status: entity.status,
            round: entity.round,
            turn_seq: entity.turn_seq,
            content: entity.content,
            turn: entity.turn,
            starting_seat: entity.starting_seat,
            created_at: entity.created_at,
        })
    }
}

impl From<SeatEntity> for Seat {
    fn from(entity: SeatEntity) -> Self {
        Self {
            index: entity.index,
            claimed_at: entity.claimed_at,
            observed_round: entity.observed_round,
            observed_at: entity.observed_at,
        }
    }
}

impl SeatEntity {
    /// Fresh claim on `index`, optionally already observing `round`.
    pub fn claim(index: SeatIndex, observed_round: Option<u32>) -> Self {
        let now = SystemTime::now();
        Self {
            index,
            claimed_at: now,
            observed_round,
            observed_at: observed_round.map(|_| now),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn patches_only_serialize_present_fields() {
        let patch = SessionPatch {
            status: Some(SessionStatus::Active),
            starting_seat: Some(Some(2)),
            ..SessionPatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "status": "active", "starting_seat": 2 })
        );

        assert_eq!(
            serde_json::to_value(SeatPatch::cleared()).unwrap(),
            json!({ "observed_round": null, "observed_at": null })
        );
    }

    #[test]
    fn guards_only_carry_the_checked_fields() {
        assert_eq!(
            serde_json::to_value(SessionGuard::waiting(3)).unwrap(),
            json!({ "status": "waiting", "round": 3 })
        );
        assert_eq!(
            serde_json::to_value(SessionGuard::at(2, 9)).unwrap(),
            json!({ "round": 2, "turn_seq": 9 })
        );
    }

    #[test]
    fn seat_keys_are_scoped_by_code() {
        let code: SessionCode = "ABCDEF".parse().unwrap();
        assert_eq!(seat_key(&code, 4), "ABCDEF/4");
        assert_eq!(session_key(&code), "ABCDEF");
    }
}
