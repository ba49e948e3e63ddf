use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::session::{
        ActionRequest, ActionResponse, ClaimSeatRequest, CreateSessionRequest, SeatClaimed,
        SeatViewResponse, SessionSummary,
    },
    error::{AppError, ServiceError},
    services::{round_service, seat_service, session_service, turn_service},
    state::{
        SharedState,
        game::{InvalidSessionCode, Seat, SeatIndex, Session, SessionCode},
    },
};

/// Routes handling sessions, seats, turn actions and rounds.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{code}", get(get_session))
        .route("/sessions/{code}/seats", post(claim_seat))
        .route("/sessions/{code}/host", post(claim_host_seat))
        .route("/sessions/{code}/seats/{seat}/observe", post(observe))
        .route("/sessions/{code}/seats/{seat}/view", get(seat_view))
        .route("/sessions/{code}/actions", post(apply_action))
        .route("/sessions/{code}/rounds", post(new_round))
}

/// Parse a session code taken from the path.
pub fn parse_code(raw: &str) -> Result<SessionCode, AppError> {
    raw.parse()
        .map_err(|err: InvalidSessionCode| AppError::BadRequest(err.to_string()))
}

fn summary(state: &SharedState, session: &Session, seats: &[Seat]) -> SessionSummary {
    let join_url = state
        .config()
        .join_url(session.variant(), &session.code, None);
    SessionSummary::new(session, seats, join_url)
}

fn claimed(state: &SharedState, session: &Session, seat: &Seat) -> SeatClaimed {
    SeatClaimed {
        seat: seat.index,
        observed_round: seat.observed_round,
        join_url: state
            .config()
            .join_url(session.variant(), &session.code, Some(seat.index)),
    }
}

/// Open a new room and deal its first round.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session created", body = SessionSummary),
        (status = 400, description = "Capacity outside the variant's range")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    payload.validate()?;
    let session = session_service::create_session(&state, payload).await?;
    Ok(Json(summary(&state, &session, &[])))
}

/// Public description of a session.
#[utoipa::path(
    get,
    path = "/sessions/{code}",
    tag = "sessions",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Session found", body = SessionSummary),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let code = parse_code(&code)?;
    let (session, seats) = session_service::snapshot(&state, &code).await?;
    Ok(Json(summary(&state, &session, &seats)))
}

/// Claim a player seat, optionally the one the device held before.
#[utoipa::path(
    post,
    path = "/sessions/{code}/seats",
    tag = "seats",
    params(("code" = String, Path, description = "Session code")),
    request_body = ClaimSeatRequest,
    responses(
        (status = 200, description = "Seat claimed", body = SeatClaimed),
        (status = 409, description = "Every seat is taken")
    )
)]
pub async fn claim_seat(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<ClaimSeatRequest>,
) -> Result<Json<SeatClaimed>, AppError> {
    payload.validate()?;
    let code = parse_code(&code)?;
    let seat = seat_service::claim_seat(&state, &code, payload.seat).await?;
    let session = session_service::load_session(&state, &code).await?;
    Ok(Json(claimed(&state, &session, &seat)))
}

/// Claim the seat reserved for the host device.
#[utoipa::path(
    post,
    path = "/sessions/{code}/host",
    tag = "seats",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "Host seat held", body = SeatClaimed),
        (status = 409, description = "The host does not occupy a seat")
    )
)]
pub async fn claim_host_seat(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SeatClaimed>, AppError> {
    let code = parse_code(&code)?;
    let seat = seat_service::claim_host_seat(&state, &code).await?;
    let session = session_service::load_session(&state, &code).await?;
    Ok(Json(claimed(&state, &session, &seat)))
}

/// Acknowledge the current round's content for a seat.
#[utoipa::path(
    post,
    path = "/sessions/{code}/seats/{seat}/observe",
    tag = "seats",
    params(
        ("code" = String, Path, description = "Session code"),
        ("seat" = u32, Path, description = "Seat index")
    ),
    responses(
        (status = 200, description = "Round observed", body = SeatClaimed),
        (status = 409, description = "Seat not claimed")
    )
)]
pub async fn observe(
    State(state): State<SharedState>,
    Path((code, seat)): Path<(String, SeatIndex)>,
) -> Result<Json<SeatClaimed>, AppError> {
    let code = parse_code(&code)?;
    let seat = seat_service::observe(&state, &code, seat).await?;
    let session = session_service::load_session(&state, &code).await?;
    Ok(Json(claimed(&state, &session, &seat)))
}

/// What a seat is allowed to see of the current round.
#[utoipa::path(
    get,
    path = "/sessions/{code}/seats/{seat}/view",
    tag = "seats",
    params(
        ("code" = String, Path, description = "Session code"),
        ("seat" = u32, Path, description = "Seat index")
    ),
    responses(
        (status = 200, description = "Seat view", body = SeatViewResponse),
        (status = 400, description = "Seat outside the table")
    )
)]
pub async fn seat_view(
    State(state): State<SharedState>,
    Path((code, seat)): Path<(String, SeatIndex)>,
) -> Result<Json<SeatViewResponse>, AppError> {
    let code = parse_code(&code)?;
    let (session, view) = seat_service::seat_view(&state, &code, seat).await?;
    Ok(Json(SeatViewResponse {
        seat,
        round: session.round,
        phase: session.phase(),
        view,
        starting_seat: session.starting_seat,
    }))
}

/// Submit an intra-round action.
#[utoipa::path(
    post,
    path = "/sessions/{code}/actions",
    tag = "turns",
    params(("code" = String, Path, description = "Session code")),
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action applied or dropped as stale", body = ActionResponse),
        (status = 409, description = "Action illegal in the current phase or variant")
    )
)]
pub async fn apply_action(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(payload): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_code(&code)?;
    let outcome =
        turn_service::apply_action(&state, &code, payload.action, payload.expected_seq).await?;
    Ok(Json(outcome.into()))
}

/// Deal a new round.
#[utoipa::path(
    post,
    path = "/sessions/{code}/rounds",
    tag = "turns",
    params(("code" = String, Path, description = "Session code")),
    responses(
        (status = 200, description = "New round dealt", body = SessionSummary),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn new_round(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let code = parse_code(&code)?;
    let session = round_service::new_round(&state, &code).await?;
    let seats = state
        .repository()
        .seats(&code)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(summary(&state, &session, &seats)))
}
