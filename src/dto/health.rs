use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Devices currently attached through an event stream.
    pub connected_devices: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(connected_devices: usize) -> Self {
        Self {
            status: "ok".to_string(),
            connected_devices,
        }
    }

    /// Create a health response indicating the store could not be reached.
    pub fn degraded(connected_devices: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            connected_devices,
        }
    }
}
