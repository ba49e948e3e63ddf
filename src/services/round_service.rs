use tracing::{debug, info};

use crate::{
    dao::models::{SeatPatch, SessionGuard, SessionPatch},
    error::ServiceError,
    services::session_service::load_session,
    state::{
        SharedState,
        assign::pick_seat,
        content::RoundContent,
        game::{Seat, Session, SessionCode, SessionStatus},
        rules::RevealGate,
    },
};

/// Deal a new round and put the session back to waiting.
///
/// Seat claims (or their observations) are dropped before the session record moves to the new
/// round, so a reader never counts an old observation toward the new round. The session write
/// only lands on the round that was read; when a concurrent reset got there first, the round it
/// dealt is returned instead.
pub async fn new_round(state: &SharedState, code: &SessionCode) -> Result<Session, ServiceError> {
    let session = load_session(state, code).await?;
    let draw = session.rule.assign_content(
        session.capacity,
        Some(&session),
        state.config().pools(),
        &mut rand::rng(),
    )?;

    let repository = state.repository();
    if session.rule.clears_seats_each_round() {
        repository.delete_seats(code).await?;
    } else {
        let cleared = SeatPatch::cleared();
        for seat in repository.seats(code).await? {
            repository.update_seat(code, seat.index, &cleared).await?;
        }
    }

    let next = Session {
        status: SessionStatus::Waiting,
        round: session.round + 1,
        turn_seq: session.turn_seq + 1,
        content: draw.content,
        turn: draw.turn,
        starting_seat: None,
        ..session
    };
    let written = repository
        .update_session_if(
            code,
            &SessionGuard::round(session.round),
            &SessionPatch {
                status: Some(next.status),
                round: Some(next.round),
                turn_seq: Some(next.turn_seq),
                content: Some(next.content.clone()),
                turn: Some(next.turn.clone()),
                starting_seat: Some(None),
            },
        )
        .await?;
    if !written {
        debug!(%code, round = session.round, "round already reset by another writer");
        return load_session(state, code).await;
    }

    info!(%code, round = next.round, "new round dealt");
    Ok(next)
}

/// Whether the reveal gate of the session's current round is open for `seats`.
pub fn gate_open(session: &Session, seats: &[Seat]) -> bool {
    let claimed = |index| seats.iter().find(|seat| seat.index == index);
    match session.rule.gate() {
        RevealGate::AllSeated => (0..session.capacity).all(|index| claimed(index).is_some()),
        RevealGate::AllObserved => (0..session.capacity).all(|index| {
            claimed(index).is_some_and(|seat| seat.has_observed(session.round))
        }),
    }
}

/// Open the current round if it is still waiting and its gate is open.
///
/// Any device may call this. The write is guarded on the round `session` was read at still
/// waiting, so an opener racing a round reset or another opener changes nothing. Returns the
/// opened session, or `None` when nothing changed.
pub async fn try_open_round(
    state: &SharedState,
    session: &Session,
    seats: &[Seat],
) -> Result<Option<Session>, ServiceError> {
    if session.status != SessionStatus::Waiting || !gate_open(session, seats) {
        return Ok(None);
    }

    let starting_seat = match &session.content {
        RoundContent::Impostor { odd_seat, .. } => Some(pick_seat(
            session.capacity,
            Some(*odd_seat),
            &mut rand::rng(),
        )),
        _ => None,
    };

    let opened = state
        .repository()
        .update_session_if(
            &session.code,
            &SessionGuard::waiting(session.round),
            &SessionPatch {
                status: Some(SessionStatus::Active),
                starting_seat: Some(starting_seat),
                ..SessionPatch::default()
            },
        )
        .await?;
    if !opened {
        debug!(code = %session.code, round = session.round, "round moved on before it opened");
        return Ok(None);
    }

    debug!(code = %session.code, round = session.round, ?starting_seat, "round opened");
    Ok(Some(Session {
        status: SessionStatus::Active,
        starting_seat,
        ..session.clone()
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::MemoryStore,
        dto::session::CreateSessionRequest,
        services::{
            seat_service::{claim_host_seat, claim_seat, observe},
            session_service::{create_session, snapshot},
        },
        state::{AppState, game::Variant, state_machine::RoundPhase},
    };

    async fn setup(variant: Variant, capacity: u32) -> (SharedState, SessionCode) {
        let state = AppState::new(Arc::new(MemoryStore::new()), AppConfig::default());
        let session = create_session(
            &state,
            CreateSessionRequest {
                variant,
                capacity,
                miss_policy: None,
                host_occupies_seat: None,
            },
        )
        .await
        .unwrap();
        (state, session.code)
    }

    async fn open(state: &SharedState, code: &SessionCode) -> Option<Session> {
        let (session, seats) = snapshot(state, code).await.unwrap();
        try_open_round(state, &session, &seats).await.unwrap()
    }

    #[tokio::test]
    async fn charades_opens_once_every_seat_is_taken() {
        let (state, code) = setup(Variant::Charades, 3).await;
        claim_seat(&state, &code, None).await.unwrap();
        claim_seat(&state, &code, None).await.unwrap();
        assert!(open(&state, &code).await.is_none());

        claim_host_seat(&state, &code).await.unwrap();
        let opened = open(&state, &code).await.unwrap();
        assert_eq!(opened.phase(), RoundPhase::Active);
        assert_eq!(opened.starting_seat, None);

        // Already active: a second opener changes nothing.
        assert!(open(&state, &code).await.is_none());
    }

    #[tokio::test]
    async fn mafia_waits_for_every_observation() {
        let (state, code) = setup(Variant::Mafia, 4).await;
        for _ in 0..3 {
            claim_seat(&state, &code, None).await.unwrap();
        }
        claim_host_seat(&state, &code).await.unwrap();
        assert!(open(&state, &code).await.is_none());

        for seat in 0..4 {
            observe(&state, &code, seat).await.unwrap();
        }
        assert!(open(&state, &code).await.is_some());
    }

    #[tokio::test]
    async fn impostor_starting_seat_is_never_the_odd_seat() {
        for _ in 0..10 {
            let (state, code) = setup(Variant::Impostor, 3).await;
            claim_seat(&state, &code, None).await.unwrap();
            claim_seat(&state, &code, None).await.unwrap();
            claim_host_seat(&state, &code).await.unwrap();

            let opened = open(&state, &code).await.unwrap();
            let RoundContent::Impostor { odd_seat, .. } = opened.content else {
                panic!("unexpected content: {:?}", opened.content);
            };
            let starting = opened.starting_seat.unwrap();
            assert_ne!(starting, odd_seat);

            let stored = snapshot(&state, &code).await.unwrap().0;
            assert_eq!(stored.starting_seat, Some(starting));
        }
    }

    #[tokio::test]
    async fn opener_reading_the_previous_round_leaves_the_reset_waiting() {
        let (state, code) = setup(Variant::Impostor, 3).await;
        claim_seat(&state, &code, None).await.unwrap();
        claim_seat(&state, &code, None).await.unwrap();
        claim_host_seat(&state, &code).await.unwrap();
        let (stale, stale_seats) = snapshot(&state, &code).await.unwrap();
        assert!(gate_open(&stale, &stale_seats));

        new_round(&state, &code).await.unwrap();
        let opened = try_open_round(&state, &stale, &stale_seats).await.unwrap();
        assert!(opened.is_none());

        let (stored, seats) = snapshot(&state, &code).await.unwrap();
        assert_eq!(stored.round, 2);
        assert_eq!(stored.status, SessionStatus::Waiting);
        assert_eq!(stored.starting_seat, None);
        assert!(seats.is_empty());
    }

    #[tokio::test]
    async fn second_opener_keeps_the_first_starting_seat() {
        let (state, code) = setup(Variant::Impostor, 4).await;
        for _ in 0..3 {
            claim_seat(&state, &code, None).await.unwrap();
        }
        claim_host_seat(&state, &code).await.unwrap();
        let (session, seats) = snapshot(&state, &code).await.unwrap();

        let first = try_open_round(&state, &session, &seats)
            .await
            .unwrap()
            .unwrap();
        assert!(try_open_round(&state, &session, &seats).await.unwrap().is_none());

        let (stored, _) = snapshot(&state, &code).await.unwrap();
        assert_eq!(stored.starting_seat, first.starting_seat);
    }

    #[tokio::test]
    async fn new_round_drops_seats_for_clearing_variants() {
        let (state, code) = setup(Variant::Impostor, 3).await;
        claim_seat(&state, &code, None).await.unwrap();
        claim_seat(&state, &code, None).await.unwrap();
        claim_host_seat(&state, &code).await.unwrap();
        open(&state, &code).await.unwrap();

        let next = new_round(&state, &code).await.unwrap();
        assert_eq!(next.round, 2);
        assert_eq!(next.phase(), RoundPhase::RoundComplete);
        assert_eq!(next.starting_seat, None);

        let (stored, seats) = snapshot(&state, &code).await.unwrap();
        assert_eq!(stored, next);
        assert!(seats.is_empty());
    }

    #[tokio::test]
    async fn new_round_clears_observations_for_seated_variants() {
        let (state, code) = setup(Variant::Casino, 3).await;
        claim_seat(&state, &code, None).await.unwrap();
        observe(&state, &code, 0).await.unwrap();

        let next = new_round(&state, &code).await.unwrap();
        let (_, seats) = snapshot(&state, &code).await.unwrap();
        assert_eq!(seats.len(), 1);
        assert_eq!(seats[0].observed_round, None);
        assert_eq!(next.turn_seq, 1);
    }
}
