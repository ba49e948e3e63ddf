use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the party-sync server.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session,
        crate::routes::sessions::claim_seat,
        crate::routes::sessions::claim_host_seat,
        crate::routes::sessions::observe,
        crate::routes::sessions::seat_view,
        crate::routes::sessions::apply_action,
        crate::routes::sessions::new_round,
        crate::routes::events::device_events,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionSummary,
            crate::dto::session::ClaimSeatRequest,
            crate::dto::session::SeatClaimed,
            crate::dto::session::SeatViewResponse,
            crate::dto::session::ActionRequest,
            crate::dto::session::ActionResponse,
            crate::dto::events::DeviceView,
            crate::dto::events::TerminatedEvent,
            crate::services::reconcile::NotifyReason,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle and device event streams"),
        (name = "seats", description = "Seat claims and observations"),
        (name = "turns", description = "Turn actions and round resets"),
    )
)]
pub struct ApiDoc;
