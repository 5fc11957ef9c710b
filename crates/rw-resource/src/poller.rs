use futures::FutureExt;
use rw_api_client::ApiResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::slot::Slot;
use crate::{ApiState, Fetcher};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

type TerminalCheck<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Recurring status check that stops itself on a terminal value.
///
/// Failed ticks are recorded in `error` and polling carries on; only a
/// terminal value, `stop_polling`, `clear`, or a restart ends the loop.
pub struct Poller<Req, T> {
    slot: Arc<Slot<T>>,
    fetcher: Fetcher<Req, T>,
    is_terminal: TerminalCheck<T>,
}

impl<Req, T> Clone for Poller<Req, T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            fetcher: Arc::clone(&self.fetcher),
            is_terminal: Arc::clone(&self.is_terminal),
        }
    }
}

/// Handle to one polling loop. Stopping is idempotent and never touches a
/// loop started after this one.
pub struct PollHandle<T> {
    slot: Arc<Slot<T>>,
    generation: u64,
}

impl<T> Clone for PollHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            generation: self.generation,
        }
    }
}

impl<T> PollHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn stop(&self) {
        if self.slot.cancel_generation(self.generation) {
            debug!(resource = self.slot.name, "polling stopped through handle");
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_current(self.generation) && self.slot.is_running()
    }
}

impl<Req, T> Poller<Req, T>
where
    Req: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut, P>(name: &'static str, is_terminal: P, fetch: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let fetcher: Fetcher<Req, T> = Arc::new(move |req| fetch(req).boxed());
        Self {
            slot: Arc::new(Slot::new(name)),
            fetcher,
            is_terminal: Arc::new(is_terminal),
        }
    }

    pub fn name(&self) -> &'static str {
        self.slot.name
    }

    pub fn state(&self) -> ApiState<T> {
        self.slot.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApiState<T>> {
        self.slot.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        self.slot.is_running()
    }

    /// Checks immediately, then every `interval`.
    ///
    /// Any loop already running for this poller is stopped first, and the
    /// previous loop's observations are discarded.
    pub fn start_polling(&self, req: Req, interval: Duration) -> PollHandle<T> {
        let slot = Arc::clone(&self.slot);
        let fetcher = Arc::clone(&self.fetcher);
        let is_terminal = Arc::clone(&self.is_terminal);
        let period = interval.max(Duration::from_millis(1));

        let generation = self.slot.replace_task(
            |state| {
                *state = ApiState::default();
                state.loading = true;
            },
            move |generation| async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    ticker.tick().await;
                    match fetcher(req.clone()).await {
                        Ok(value) => {
                            let terminal = is_terminal(&value);
                            if !slot.commit(generation, |state| state.succeed(value)) {
                                return;
                            }
                            if terminal {
                                debug!(
                                    resource = slot.name,
                                    "terminal status observed, polling stopped"
                                );
                                return;
                            }
                        }
                        Err(err) => {
                            warn!(
                                resource = slot.name,
                                error = %err,
                                "status check failed, polling continues"
                            );
                            let committed = slot.commit(generation, |state| {
                                state.loading = false;
                                state.error = Some(err);
                            });
                            if !committed {
                                return;
                            }
                        }
                    }
                }
            },
        );

        PollHandle {
            slot: Arc::clone(&self.slot),
            generation,
        }
    }

    /// Safe to call when nothing is polling.
    pub fn stop_polling(&self) {
        if self.slot.cancel() {
            debug!(resource = self.slot.name, "polling stopped");
        }
    }

    pub fn clear(&self) {
        self.slot.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_api_client::{ApiError, ErrorCode};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::sleep;

    const TERMINAL: u32 = 99;

    fn scripted(script: Vec<ApiResult<u32>>) -> (Poller<String, u32>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let poller = Poller::new(
            "status",
            |value: &u32| *value == TERMINAL,
            move |_id: String| {
                counter.fetch_add(1, Ordering::SeqCst);
                let next = script.lock().unwrap().pop_front().unwrap_or(Ok(1));
                async move { next }
            },
        );
        (poller, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_value_stops_the_loop() {
        let (poller, calls) = scripted(vec![Ok(1), Ok(2), Ok(TERMINAL)]);

        let handle = poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_secs(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.state().data, Some(TERMINAL));
        assert!(!poller.is_polling());
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_ticks_do_not_stop_polling() {
        let service_error = || Err(ApiError::new(ErrorCode::StatusCheckError, "flaky"));
        let (poller, calls) = scripted(vec![service_error(), service_error(), Ok(TERMINAL)]);

        poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            poller.state().error.map(|e| e.code),
            Some(ErrorCode::StatusCheckError)
        );

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.state().data, Some(TERMINAL));
        assert!(poller.state().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_final() {
        let (poller, calls) = scripted(Vec::new());
        poller.stop_polling();

        poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(4500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        poller.stop_polling();
        poller.stop_polling();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_replaces_the_running_loop() {
        let (poller, calls) = scripted(Vec::new());

        poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(1000)).await;
        poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(4500)).await;

        // one tick from the first loop, three from the second
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_stop_ends_polling() {
        let (poller, calls) = scripted(Vec::new());
        let handle = poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(100)).await;

        handle.stop();
        handle.stop();
        assert!(!poller.state().loading);
        assert!(!poller.is_polling());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_handle_leaves_the_newer_loop_running() {
        let (poller, calls) = scripted(Vec::new());
        let first = poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(100)).await;
        let second = poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);

        first.stop();
        assert!(!first.is_active());
        assert!(second.is_active());

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_discards_previous_observations() {
        let (poller, _) = scripted(vec![Ok(TERMINAL)]);
        poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(poller.state().data, Some(TERMINAL));

        poller.start_polling("tx".to_owned(), DEFAULT_POLL_INTERVAL);
        let state = poller.state();
        assert!(state.loading);
        assert!(state.data.is_none());
    }
}
