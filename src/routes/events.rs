use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    dto::session::EventsQuery,
    error::AppError,
    routes::sessions::parse_code,
    services::sse_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sessions/{code}/events",
    tag = "sessions",
    params(
        ("code" = String, Path, description = "Session code"),
        EventsQuery
    ),
    responses(
        (status = 200, description = "Device event stream (`view`, `notify`, `not_found`, `seating_full`)", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "No seat left")
    )
)]
/// Attach a device to a session and stream what it should show.
pub async fn device_events(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let code = parse_code(&code)?;
    info!(%code, seat = ?query.p, host = query.host, "new device event stream");
    let stream = sse_service::device_stream(state, code, query.p, query.host).await?;
    Ok(stream)
}

/// Configure the event stream endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sessions/{code}/events", get(device_events))
}
