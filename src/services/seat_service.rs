use tracing::{debug, info};

use crate::{
    dao::models::{SeatEntity, SeatPatch},
    error::ServiceError,
    services::session_service::load_session,
    state::{
        SharedState,
        content::SeatView,
        game::{Seat, SeatIndex, Session, SessionCode},
    },
};

/// Read-then-insert attempts before a contended claim gives up.
const CLAIM_ATTEMPTS: usize = 3;

/// Claim a seat for a joining device.
///
/// With `requested`, the device already knows its seat: an existing claim is returned as is, a
/// missing one is re-claimed, and if someone else took the index meanwhile the device falls back to
/// the lowest free seat. Without it, or when it names the host's reserved seat, the lowest free seat
/// is claimed.
pub async fn claim_seat(
    state: &SharedState,
    code: &SessionCode,
    requested: Option<SeatIndex>,
) -> Result<Seat, ServiceError> {
    let session = load_session(state, code).await?;
    let repository = state.repository();

    if let Some(index) = requested {
        if !session.contains(index) {
            return Err(ServiceError::InvalidInput(format!(
                "seat {index} is outside a table of {}",
                session.capacity
            )));
        }
        if let Some(seat) = claim_requested(state, &session, index).await? {
            return Ok(seat);
        }
    }

    for attempt in 1..=CLAIM_ATTEMPTS {
        let seats = repository.seats(code).await?;
        let Some(index) = lowest_available(&session, &seats) else {
            return Err(ServiceError::SeatingFull(code.clone()));
        };

        match insert_claim(state, &session, index).await {
            Ok(seat) => return Ok(seat),
            Err(ServiceError::WriteConflict(_)) => {
                debug!(%code, seat = index, attempt, "seat claim lost a race; retrying");
            }
            Err(err) => return Err(err),
        }
    }

    Err(ServiceError::SeatingFull(code.clone()))
}

/// Hand back or re-claim a seat the device held before. `None` sends it to the lowest free seat:
/// the index belongs to the host, or someone else took it meanwhile.
async fn claim_requested(
    state: &SharedState,
    session: &Session,
    index: SeatIndex,
) -> Result<Option<Seat>, ServiceError> {
    let code = &session.code;
    if session.host_seat() == Some(index) {
        debug!(%code, seat = index, "requested seat is reserved for the host; claiming another");
        return Ok(None);
    }
    if let Some(seat) = state.repository().find_seat(code, index).await? {
        return Ok(Some(seat));
    }
    match insert_claim(state, session, index).await {
        Ok(seat) => Ok(Some(seat)),
        Err(ServiceError::WriteConflict(_)) => {
            debug!(%code, seat = index, "requested seat taken meanwhile; claiming another");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Claim the seat reserved for the host. A conflict means the host already holds it.
pub async fn claim_host_seat(state: &SharedState, code: &SessionCode) -> Result<Seat, ServiceError> {
    let session = load_session(state, code).await?;
    let Some(index) = session.host_seat() else {
        return Err(ServiceError::InvalidState(format!(
            "the host of `{code}` does not occupy a seat"
        )));
    };

    for _ in 0..CLAIM_ATTEMPTS {
        match insert_claim(state, &session, index).await {
            Ok(seat) => return Ok(seat),
            Err(ServiceError::WriteConflict(_)) => {
                if let Some(seat) = state.repository().find_seat(code, index).await? {
                    return Ok(seat);
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(ServiceError::WriteConflict(format!("{code}/{index}")))
}

/// Record that the device on `seat` has seen the current round's content.
pub async fn observe(
    state: &SharedState,
    code: &SessionCode,
    seat: SeatIndex,
) -> Result<Seat, ServiceError> {
    let session = load_session(state, code).await?;
    let repository = state.repository();
    let Some(mut claimed) = repository.find_seat(code, seat).await? else {
        return Err(ServiceError::InvalidState(format!(
            "seat {seat} of `{code}` is not claimed"
        )));
    };

    if !claimed.has_observed(session.round) {
        let patch = SeatPatch::observed(session.round);
        repository.update_seat(code, seat, &patch).await?;
        claimed.observed_round = Some(session.round);
        claimed.observed_at = patch.observed_at.flatten();
        debug!(%code, seat, round = session.round, "seat observed round");
    }

    Ok(claimed)
}

/// What `seat` is allowed to see of the current round.
pub async fn seat_view(
    state: &SharedState,
    code: &SessionCode,
    seat: SeatIndex,
) -> Result<(Session, SeatView), ServiceError> {
    let session = load_session(state, code).await?;
    if !session.contains(seat) {
        return Err(ServiceError::InvalidInput(format!(
            "seat {seat} is outside a table of {}",
            session.capacity
        )));
    }
    let view = session
        .content
        .view_for(seat, &session.turn)
        .ok_or_else(|| ServiceError::InvalidState(format!("no content dealt for seat {seat}")))?;
    Ok((session, view))
}

/// Lowest unclaimed index a player may take, keeping the host's seat free.
pub fn lowest_available(session: &Session, seats: &[Seat]) -> Option<SeatIndex> {
    if seats.len() >= session.capacity as usize {
        return None;
    }
    let reserved = session.host_seat();
    (0..session.capacity)
        .filter(|index| Some(*index) != reserved)
        .find(|index| seats.iter().all(|seat| seat.index != *index))
}

async fn insert_claim(
    state: &SharedState,
    session: &Session,
    index: SeatIndex,
) -> Result<Seat, ServiceError> {
    let observed = session.rule.observes_on_join().then_some(session.round);
    let seat = state
        .repository()
        .insert_seat(&session.code, SeatEntity::claim(index, observed))
        .await?;
    info!(code = %session.code, seat = index, "seat claimed");
    Ok(seat)
}
