use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the session store and report how many devices are attached.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let devices = state.devices().len();
    match state.repository().ping().await {
        Ok(()) => HealthResponse::ok(devices),
        Err(err) => {
            warn!(error = %err, "session store health check failed");
            HealthResponse::degraded(devices)
        }
    }
}
