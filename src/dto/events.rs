use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{
    content::SeatView,
    game::{Seat, SeatIndex, Session, SessionStatus, Variant},
    state_machine::{RoundPhase, TurnState},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Everything one device may render about its session, recomputed on every reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeviceView {
    #[schema(value_type = String, example = "K7QX2M")]
    pub code: String,
    pub variant: Variant,
    pub capacity: u32,
    pub round: u32,
    pub status: SessionStatus,
    pub phase: RoundPhase,
    /// Seat held by this device, if any.
    pub seat: Option<SeatIndex>,
    pub host: bool,
    /// This seat's share of the round's secret content.
    pub view: Option<SeatView>,
    pub turn: TurnState,
    pub turn_seq: u64,
    /// Impostor only: seat that opens the discussion.
    pub starting_seat: Option<SeatIndex>,
    /// Claimed seat indices.
    pub seated: Vec<SeatIndex>,
    /// Seats that acknowledged the current round.
    pub observed: Vec<SeatIndex>,
}

impl DeviceView {
    /// Derive the view of the device on `seat` from a session snapshot.
    pub fn new(session: &Session, seats: &[Seat], seat: Option<SeatIndex>, host: bool) -> Self {
        Self {
            code: session.code.to_string(),
            variant: session.variant(),
            capacity: session.capacity,
            round: session.round,
            status: session.status,
            phase: session.phase(),
            seat,
            host,
            view: seat.and_then(|seat| session.content.view_for(seat, &session.turn)),
            turn: session.turn.clone(),
            turn_seq: session.turn_seq,
            starting_seat: session.starting_seat,
            seated: seats.iter().map(|seat| seat.index).collect(),
            observed: seats
                .iter()
                .filter(|seat| seat.has_observed(session.round))
                .map(|seat| seat.index)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Why a device's event stream ended.
pub enum Termination {
    /// The session no longer exists.
    NotFound,
    /// No seat could be claimed for the device.
    SeatingFull,
}

#[derive(Debug, Serialize, ToSchema)]
/// Last event of a stream.
pub struct TerminatedEvent {
    pub reason: Termination,
}
