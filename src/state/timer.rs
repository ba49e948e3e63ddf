//! Cancellable countdown used to forfeit a charades guess.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::debug;

/// One-shot countdown that can be re-armed or cancelled.
///
/// Each `start` bumps a generation counter; an expiry only runs its callback when its generation is
/// still current, so a cancelled or replaced countdown never fires. Dropping the timer cancels it.
#[derive(Default)]
pub struct TurnTimer {
    slot: Arc<Mutex<TimerSlot>>,
}

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    armed: Option<Armed>,
}

struct Armed {
    key: u64,
    handle: JoinHandle<()>,
}

impl TurnTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the countdown, replacing any pending one. `key` identifies what the countdown is for
    /// (the turn sequence it was armed at).
    pub fn start<F, Fut>(&self, duration: Duration, key: u64, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        slot.disarm();
        let generation = slot.generation;

        let shared = Arc::clone(&self.slot);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            {
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                // Detached: a cancel from here on no longer aborts the callback.
                slot.armed = None;
            }
            debug!(key, "turn timer expired");
            on_expire().await;
        });

        slot.armed = Some(Armed { key, handle });
    }

    /// Stop the pending countdown, if any. A cancelled countdown never fires.
    pub fn cancel(&self) {
        lock(&self.slot).disarm();
    }

    /// Key of the pending countdown.
    #[cfg(test)]
    pub(crate) fn armed_key(&self) -> Option<u64> {
        lock(&self.slot).armed.as_ref().map(|armed| armed.key)
    }
}

impl TimerSlot {
    fn disarm(&mut self) {
        self.generation += 1;
        if let Some(armed) = self.armed.take() {
            debug!(key = armed.key, "turn timer disarmed");
            armed.handle.abort();
        }
    }
}

impl Drop for TurnTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(slot: &Mutex<TimerSlot>) -> MutexGuard<'_, TimerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(fired: Arc<AtomicUsize>) -> impl FnOnce() -> futures::future::Ready<()> {
        move || {
            fired.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn uncancelled_countdown_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = TurnTimer::new();
        timer.start(Duration::from_secs(10), 7, counting(Arc::clone(&fired)));
        assert_eq!(timer.armed_key(), Some(7));

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.armed_key(), None);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_halfway_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = TurnTimer::new();
        timer.start(Duration::from_secs(10), 1, counting(Arc::clone(&fired)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(timer.armed_key(), Some(1));
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.armed_key(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_replaces_the_pending_countdown() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = TurnTimer::new();
        timer.start(Duration::from_secs(10), 1, counting(Arc::clone(&fired)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        timer.start(Duration::from_secs(10), 2, counting(Arc::clone(&fired)));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_timer_cancels_it() {
        let fired = Arc::new(AtomicUsize::new(0));
        let timer = TurnTimer::new();
        timer.start(Duration::from_secs(1), 1, counting(Arc::clone(&fired)));
        drop(timer);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
