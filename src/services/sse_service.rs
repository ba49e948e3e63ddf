use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

use crate::{
    dto::events::ServerEvent,
    error::ServiceError,
    services::device::DeviceSession,
    state::{
        ConnectedDevice, SharedState,
        game::{SeatIndex, SessionCode},
    },
};

/// Attach a device to `code` and stream its events.
///
/// The device's reconciliation loop runs on its own task for as long as the client keeps the
/// stream open, and is unregistered once it ends. The returned stream owns everything it needs,
/// so it outlives the request that built it.
pub async fn device_stream(
    state: SharedState,
    code: SessionCode,
    requested: Option<SeatIndex>,
    host: bool,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();
    let closed = tx.clone();
    let device = DeviceSession::connect(Arc::clone(&state), code, requested, host, tx).await?;

    let id = device.id();
    state.devices().insert(
        id,
        ConnectedDevice {
            code: device.code().clone(),
            seat: device.seat(),
            host,
        },
    );

    tokio::spawn(async move {
        // The receiver is dropped by axum when the client goes away.
        device.run(async move { closed.closed().await }).await;
        state.devices().remove(&id);
        info!(%id, "device stream closed");
    });

    let stream = UnboundedReceiverStream::new(rx).map(|payload| {
        let mut event = Event::default().data(payload.data);
        if let Some(name) = payload.event {
            event = event.event(name);
        }
        Ok::<_, Infallible>(event)
    });
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
