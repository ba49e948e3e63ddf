use std::time::SystemTime;

use tracing::{debug, info};

use crate::{
    dto::session::CreateSessionRequest,
    error::ServiceError,
    state::{
        SharedState,
        game::{Seat, Session, SessionCode, SessionStatus},
        rules::GameRule,
    },
};

/// Attempts at drawing an unused session code before giving up.
const CODE_ATTEMPTS: usize = 5;

/// Create a session and deal its first round.
///
/// The first round is dealt before anything is written, so an empty content pool leaves no
/// half-created session behind.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<Session, ServiceError> {
    let CreateSessionRequest {
        variant,
        capacity,
        miss_policy,
        host_occupies_seat,
    } = request;

    let range = variant.capacity_range();
    if !range.contains(&capacity) {
        return Err(ServiceError::InvalidInput(format!(
            "{variant} needs between {} and {} seats, got {capacity}",
            range.start(),
            range.end()
        )));
    }

    let rule = GameRule::for_variant(variant, capacity, miss_policy.unwrap_or_default());
    let draw = rule.assign_content(capacity, None, state.config().pools(), &mut rand::rng())?;

    let repository = state.repository();
    for attempt in 1..=CODE_ATTEMPTS {
        let session = Session {
            code: SessionCode::generate(&mut rand::rng()),
            rule,
            capacity,
            host_occupies_seat: host_occupies_seat.unwrap_or(true),
            status: SessionStatus::Waiting,
            round: 1,
            turn_seq: 0,
            content: draw.content.clone(),
            turn: draw.turn.clone(),
            starting_seat: None,
            created_at: SystemTime::now(),
        };

        match repository.insert_session(&session).await {
            Ok(()) => {
                info!(code = %session.code, %variant, capacity, "session created");
                return Ok(session);
            }
            Err(err) if err.is_conflict() => {
                debug!(code = %session.code, attempt, "session code already taken");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::WriteConflict("session code".into()))
}

/// Load the session identified by `code`.
pub async fn load_session(state: &SharedState, code: &SessionCode) -> Result<Session, ServiceError> {
    state
        .repository()
        .find_session(code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(code.clone()))
}

/// Load the session and its claimed seats.
pub async fn snapshot(
    state: &SharedState,
    code: &SessionCode,
) -> Result<(Session, Vec<Seat>), ServiceError> {
    let session = load_session(state, code).await?;
    let seats = state.repository().seats(code).await?;
    Ok((session, seats))
}
