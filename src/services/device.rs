//! Per-device reconciliation loop.
//!
//! A device never receives pushed state from other devices: it wakes on store change
//! notifications, on a fixed poll interval and on its own timer, then re-reads the session and
//! re-derives everything it shows from that snapshot.

use std::future::Future;

use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::events::{DeviceView, ServerEvent, TerminatedEvent, Termination},
    error::ServiceError,
    services::{
        reconcile::{NotifyReason, ReconcileTracker},
        round_service::try_open_round,
        seat_service::{claim_host_seat, claim_seat, observe},
        session_service::load_session,
        turn_service::{ActionOutcome, apply_action},
    },
    state::{
        SharedState,
        game::{Seat, SeatIndex, Session, SessionCode},
        state_machine::{GameAction, RoundPhase, TurnState},
        timer::TurnTimer,
    },
};

/// Receives everything a device has to surface to its user.
pub trait DeviceSink: Send + 'static {
    /// The derived view changed.
    fn view(&self, view: &DeviceView);
    /// A one-shot transition concerns this device.
    fn notify(&self, reason: NotifyReason);
    /// The loop is ending for good.
    fn terminated(&self, reason: Termination);
}

impl DeviceSink for mpsc::UnboundedSender<ServerEvent> {
    fn view(&self, view: &DeviceView) {
        forward(self, "view", view);
    }

    fn notify(&self, reason: NotifyReason) {
        forward(self, "notify", &reason);
    }

    fn terminated(&self, reason: Termination) {
        let name = match reason {
            Termination::NotFound => "not_found",
            Termination::SeatingFull => "seating_full",
        };
        forward(self, name, &TerminatedEvent { reason });
    }
}

fn forward<T: serde::Serialize>(tx: &mpsc::UnboundedSender<ServerEvent>, name: &str, payload: &T) {
    match ServerEvent::json(Some(name.to_string()), payload) {
        Ok(event) => {
            // A closed receiver means the stream is going away; the loop notices on its own.
            let _ = tx.send(event);
        }
        Err(err) => warn!(event = name, error = %err, "failed to serialise device event"),
    }
}

/// Whether the loop keeps running after a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

enum Wake {
    Reconcile,
    Expired(u64),
    Shutdown,
}

/// One connected device: its seat, what it already told its user and its guess countdown.
pub struct DeviceSession<S: DeviceSink> {
    id: Uuid,
    state: SharedState,
    code: SessionCode,
    seat: Option<SeatIndex>,
    host: bool,
    sink: S,
    tracker: ReconcileTracker,
    timer: TurnTimer,
    /// Turn sequence the countdown was last armed for.
    armed_for: Option<u64>,
    last_view: Option<DeviceView>,
    expiry_tx: mpsc::UnboundedSender<u64>,
    expiry_rx: mpsc::UnboundedReceiver<u64>,
}

impl<S: DeviceSink> DeviceSession<S> {
    /// Attach a device to the session, claiming its seat.
    ///
    /// The host takes its reserved seat when it occupies one and otherwise stays seatless. Players
    /// claim `requested` (a seat they held before) or the lowest free seat.
    pub async fn connect(
        state: SharedState,
        code: SessionCode,
        requested: Option<SeatIndex>,
        host: bool,
        sink: S,
    ) -> Result<Self, ServiceError> {
        let session = load_session(&state, &code).await?;
        let seat = if host && session.host_occupies_seat {
            Some(claim_host_seat(&state, &code).await?.index)
        } else if host {
            None
        } else {
            Some(claim_seat(&state, &code, requested).await?.index)
        };

        let id = Uuid::new_v4();
        info!(%id, %code, ?seat, host, "device connected");
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Ok(Self {
            id,
            state,
            code,
            seat,
            host,
            sink,
            tracker: ReconcileTracker::new(),
            timer: TurnTimer::new(),
            armed_for: None,
            last_view: None,
            expiry_tx,
            expiry_rx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Seat currently held by the device.
    pub fn seat(&self) -> Option<SeatIndex> {
        self.seat
    }

    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// Reconcile until the session disappears, the device loses its seat for good or `shutdown`
    /// resolves. The countdown is cancelled on the way out.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let repository = self.state.repository();
        let mut session_feed = repository.watch_session(&self.code);
        let mut seat_feed = repository.watch_seats(&self.code);
        let (mut session_open, mut seats_open) = (true, true);

        let mut poll = time::interval(self.state.config().poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            let wake = tokio::select! {
                _ = &mut shutdown => Wake::Shutdown,
                notice = session_feed.next(), if session_open => {
                    session_open = notice.is_some();
                    Wake::Reconcile
                }
                notice = seat_feed.next(), if seats_open => {
                    seats_open = notice.is_some();
                    Wake::Reconcile
                }
                Some(seq) = self.expiry_rx.recv() => Wake::Expired(seq),
                _ = poll.tick() => Wake::Reconcile,
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Expired(seq) => forfeit(&self.state, &self.code, self.id, seq).await,
                Wake::Reconcile => {}
            }

            match self.reconcile_once().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(err) => {
                    warn!(id = %self.id, code = %self.code, error = %err, "reconciliation failed");
                }
            }
        }

        self.timer.cancel();
        info!(id = %self.id, code = %self.code, "device disconnected");
    }

    /// Re-read the session and bring the device in line with it.
    pub async fn reconcile_once(&mut self) -> Result<Flow, ServiceError> {
        let session = match load_session(&self.state, &self.code).await {
            Ok(session) => session,
            Err(ServiceError::NotFound(_)) => return Ok(self.terminate(Termination::NotFound)),
            Err(err) => return Err(err),
        };
        let mut seats = self.state.repository().seats(&self.code).await?;

        match self.restore_seat(&session, &mut seats).await {
            Ok(()) => {}
            Err(ServiceError::NotFound(_)) => return Ok(self.terminate(Termination::NotFound)),
            Err(ServiceError::SeatingFull(_)) => {
                return Ok(self.terminate(Termination::SeatingFull));
            }
            Err(err) => return Err(err),
        }

        let session = match try_open_round(&self.state, &session, &seats).await? {
            Some(opened) => opened,
            None => session,
        };

        for reason in self.tracker.absorb(&session, self.seat) {
            debug!(id = %self.id, ?reason, "notifying device");
            self.sink.notify(reason);
        }
        self.sync_timer(&session);

        let view = DeviceView::new(&session, &seats, self.seat, self.host);
        if self.last_view.as_ref() != Some(&view) {
            self.sink.view(&view);
            self.last_view = Some(view);
        }

        Ok(Flow::Continue)
    }

    /// Re-claim the device's seat after a per-round reset and acknowledge the round when the
    /// variant counts joining as observing.
    async fn restore_seat(
        &mut self,
        session: &Session,
        seats: &mut Vec<Seat>,
    ) -> Result<(), ServiceError> {
        let Some(me) = self.seat else {
            return Ok(());
        };

        let position = seats.iter().position(|seat| seat.index == me);
        let restored = match position {
            None if self.host => claim_host_seat(&self.state, &self.code).await?,
            None => claim_seat(&self.state, &self.code, Some(me)).await?,
            Some(position)
                if session.rule.observes_on_join() && !seats[position].has_observed(session.round) =>
            {
                observe(&self.state, &self.code, me).await?
            }
            Some(_) => return Ok(()),
        };

        if restored.index != me {
            info!(id = %self.id, from = me, to = restored.index, "device moved to another seat");
            self.seat = Some(restored.index);
        }
        seats.retain(|seat| seat.index != restored.index);
        seats.push(restored);
        seats.sort_by_key(|seat| seat.index);
        Ok(())
    }

    /// Arm the guess countdown while this device is the charades guesser, cancel it otherwise.
    fn sync_timer(&mut self, session: &Session) {
        let wanted = match (session.phase(), &session.turn, self.seat) {
            (RoundPhase::Active, TurnState::Charades { showing, guesser, .. }, Some(me))
                if *guesser == me && *showing != me =>
            {
                Some(session.turn_seq)
            }
            _ => None,
        };
        if wanted == self.armed_for {
            return;
        }

        self.armed_for = wanted;
        match wanted {
            Some(seq) => {
                let tx = self.expiry_tx.clone();
                self.timer
                    .start(self.state.config().guess_timer(), seq, move || async move {
                        let _ = tx.send(seq);
                    });
                debug!(id = %self.id, turn_seq = seq, "guess countdown armed");
            }
            None => self.timer.cancel(),
        }
    }

    fn terminate(&mut self, reason: Termination) -> Flow {
        info!(id = %self.id, code = %self.code, ?reason, "device loop terminated");
        self.timer.cancel();
        self.armed_for = None;
        self.sink.terminated(reason);
        Flow::Stop
    }
}

/// The countdown ran out: record a miss for the turn it was armed at.
async fn forfeit(state: &SharedState, code: &SessionCode, id: Uuid, seq: u64) {
    match apply_action(state, code, GameAction::NotGuessed, Some(seq)).await {
        Ok(ActionOutcome::Applied(session)) => {
            info!(%id, %code, turn_seq = session.turn_seq, "guess timed out");
        }
        Ok(ActionOutcome::Stale { .. }) => {}
        Err(err) => warn!(%id, %code, error = %err, "failed to forfeit guess"),
    }
}
