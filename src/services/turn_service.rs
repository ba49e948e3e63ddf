use tracing::{debug, info};

use crate::{
    dao::models::{SessionGuard, SessionPatch},
    error::ServiceError,
    services::session_service::load_session,
    state::{
        PlanError, SharedState,
        game::{Session, SessionCode},
        state_machine::{self, GameAction},
    },
};

/// Result of submitting a turn action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The transition was written; carries the updated session.
    Applied(Session),
    /// The action was issued against an older turn sequence and was dropped.
    Stale { expected: u64, actual: u64 },
}

/// Apply an intra-round action to the session identified by `code`.
///
/// When `expected_seq` is set and the session has already moved past it, nothing is written and
/// [`ActionOutcome::Stale`] is returned. This is how late timer expiries and double taps resolve.
/// The write itself is guarded on the round and turn sequence the plan was made from, so an
/// action racing another transition or a round reset is dropped the same way.
pub async fn apply_action(
    state: &SharedState,
    code: &SessionCode,
    action: GameAction,
    expected_seq: Option<u64>,
) -> Result<ActionOutcome, ServiceError> {
    let session = load_session(state, code).await?;

    let planned = state_machine::plan(
        &session,
        action,
        expected_seq,
        state.config().pools(),
        &mut rand::rng(),
    );
    let plan = match planned {
        Ok(plan) => plan,
        Err(PlanError::Stale { expected, actual }) => {
            debug!(%code, ?action, expected, actual, "stale action dropped");
            return Ok(ActionOutcome::Stale { expected, actual });
        }
        Err(err) => return Err(err.into()),
    };

    let written = state
        .repository()
        .update_session_if(
            code,
            &SessionGuard::at(session.round, plan.from_seq),
            &SessionPatch {
                turn_seq: Some(plan.seq_next),
                content: Some(plan.content.clone()),
                turn: Some(plan.turn.clone()),
                ..SessionPatch::default()
            },
        )
        .await?;
    if !written {
        let actual = load_session(state, code).await?.turn_seq;
        debug!(%code, ?action, planned_from = plan.from_seq, actual, "action lost a race");
        return Ok(ActionOutcome::Stale {
            expected: plan.from_seq,
            actual,
        });
    }

    info!(%code, ?action, turn_seq = plan.seq_next, "turn action applied");
    Ok(ActionOutcome::Applied(Session {
        turn_seq: plan.seq_next,
        content: plan.content,
        turn: plan.turn,
        ..session
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
            round_service::try_open_round,
            seat_service::{claim_host_seat, claim_seat},
            session_service::{create_session, snapshot},
        },
        state::{AppState, game::Variant, state_machine::TurnState},
    };

    async fn active_charades(capacity: u32) -> (SharedState, Session) {
        let state = AppState::new(Arc::new(MemoryStore::new()), AppConfig::default());
        let session = create_session(
            &state,
            CreateSessionRequest {
                variant: Variant::Charades,
                capacity,
                miss_policy: None,
                host_occupies_seat: None,
            },
        )
        .await
        .unwrap();
        for _ in 1..capacity {
            claim_seat(&state, &session.code, None).await.unwrap();
        }
        claim_host_seat(&state, &session.code).await.unwrap();
        let (session, seats) = snapshot(&state, &session.code).await.unwrap();
        let opened = try_open_round(&state, &session, &seats)
            .await
            .unwrap()
            .unwrap();
        (state, opened)
    }

    #[tokio::test]
    async fn not_guessed_moves_the_guesser_and_bumps_the_sequence() {
        let (state, session) = active_charades(4).await;
        let TurnState::Charades {
            showing, guesser, ..
        } = session.turn
        else {
            panic!("unexpected turn: {:?}", session.turn);
        };

        let outcome = apply_action(
            &state,
            &session.code,
            GameAction::NotGuessed,
            Some(session.turn_seq),
        )
        .await
        .unwrap();

        let ActionOutcome::Applied(next) = outcome else {
            panic!("expected the action to be applied");
        };
        assert_eq!(next.turn_seq, session.turn_seq + 1);
        let expected = if (guesser + 1) % 4 == showing {
            (guesser + 2) % 4
        } else {
            (guesser + 1) % 4
        };
        assert_eq!(next.turn.turn_holder(), Some(expected));

        let (stored, _) = snapshot(&state, &session.code).await.unwrap();
        assert_eq!(stored, next);
    }

    #[tokio::test]
    async fn replayed_action_is_a_stale_no_op() {
        let (state, session) = active_charades(3).await;
        let seq = session.turn_seq;

        apply_action(&state, &session.code, GameAction::NotGuessed, Some(seq))
            .await
            .unwrap();
        let replay = apply_action(&state, &session.code, GameAction::NotGuessed, Some(seq))
            .await
            .unwrap();

        assert_eq!(
            replay,
            ActionOutcome::Stale {
                expected: seq,
                actual: seq + 1
            }
        );
        let (stored, _) = snapshot(&state, &session.code).await.unwrap();
        assert_eq!(stored.turn_seq, seq + 1);
    }

    #[tokio::test]
    async fn actions_before_the_round_opens_are_rejected() {
        let state = AppState::new(Arc::new(MemoryStore::new()), AppConfig::default());
        let session = create_session(
            &state,
            CreateSessionRequest {
                variant: Variant::Charades,
                capacity: 3,
                miss_policy: None,
                host_occupies_seat: None,
            },
        )
        .await
        .unwrap();

        let err = apply_action(&state, &session.code, GameAction::Guessed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }
}
