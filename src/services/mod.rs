/// Per-device reconciliation loop and its event sink.
pub mod device;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Edge detection for reveal and turn notifications.
pub mod reconcile;
/// Round reset and reveal gate.
pub mod round_service;
/// Seat allocation and observation.
pub mod seat_service;
/// Session creation and lookup.
pub mod session_service;
/// Server-Sent Events streaming of device events.
pub mod sse_service;
/// Intra-round turn actions.
pub mod turn_service;
