use futures::FutureExt;
use rw_api_client::{ApiError, ApiResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::debug;

use crate::slot::Slot;
use crate::{ApiState, Fetcher, RetryPolicy, with_retry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceOptions {
    /// Collapses `trigger` calls arriving within this window into one request.
    pub debounce: Option<Duration>,
    pub retry: RetryPolicy,
}

impl ResourceOptions {
    pub fn debounced(window: Duration) -> Self {
        Self {
            debounce: Some(window),
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// One backend operation with last-caller-wins request handling.
pub struct Resource<Req, T> {
    slot: Arc<Slot<T>>,
    fetcher: Fetcher<Req, T>,
    options: ResourceOptions,
}

impl<Req, T> Clone for Resource<Req, T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            fetcher: Arc::clone(&self.fetcher),
            options: self.options,
        }
    }
}

impl<Req, T> Resource<Req, T>
where
    Req: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, options: ResourceOptions, fetch: F) -> Self
    where
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let fetcher: Fetcher<Req, T> = Arc::new(move |req| fetch(req).boxed());
        Self {
            slot: Arc::new(Slot::new(name)),
            fetcher,
            options,
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

    /// A request is scheduled, waiting out its debounce window, or in flight.
    pub fn is_pending(&self) -> bool {
        self.slot.is_running()
    }

    /// Fire-and-forget request, debounced when the resource is configured so.
    pub fn trigger(&self, req: Req)
    where
        Req: Clone,
    {
        let delay = self.options.debounce.unwrap_or(Duration::ZERO);
        self.start(req, delay, None);
    }

    /// Immediate request whose outcome is also returned to the caller.
    ///
    /// Resolves to a `REQUEST_CANCELLED` error when a later request or
    /// `clear` supersedes it.
    pub async fn fetch(&self, req: Req) -> ApiResult<T>
    where
        Req: Clone,
    {
        let (reply, outcome) = oneshot::channel();
        self.start(req, Duration::ZERO, Some(reply));
        outcome
            .await
            .unwrap_or_else(|_| Err(ApiError::cancelled(self.slot.name)))
    }

    /// Cancels any scheduled or in-flight request and resets the state.
    pub fn clear(&self) {
        self.slot.reset();
    }

    fn start(&self, req: Req, delay: Duration, reply: Option<oneshot::Sender<ApiResult<T>>>)
    where
        Req: Clone,
    {
        let slot = Arc::clone(&self.slot);
        let fetcher = Arc::clone(&self.fetcher);
        let retry = self.options.retry;

        if self.slot.is_running() && !delay.is_zero() {
            debug!(resource = slot.name, "debounced request replaced");
        }

        self.slot.replace_task(
            |_| {},
            move |generation| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if !slot.commit(generation, ApiState::begin) {
                    return;
                }

                let result = with_retry(slot.name, retry, move || fetcher(req.clone())).await;

                match &result {
                    Ok(data) => {
                        let data = data.clone();
                        slot.commit(generation, |state| state.succeed(data));
                    }
                    Err(err) => {
                        let err = err.clone();
                        slot.commit(generation, |state| state.fail(err));
                    }
                }

                if slot.is_current(generation) {
                    if let Some(reply) = reply {
                        let _ = reply.send(result);
                    }
                }
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_api_client::ErrorCode;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{Instant, sleep};

    fn echo_after_delay() -> Resource<u64, u64> {
        Resource::new("echo", ResourceOptions::default(), |delay_ms: u64| async move {
            sleep(Duration::from_millis(delay_ms)).await;
            Ok(delay_ms)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_triggers_collapse_to_the_last_request() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let resource = Resource::new(
            "quote",
            ResourceOptions::debounced(Duration::from_millis(500)),
            move |amount: u32| {
                recorder.lock().unwrap().push(amount);
                async move { Ok(amount * 2) }
            },
        );

        for amount in 1..=5 {
            resource.trigger(amount);
            sleep(Duration::from_millis(100)).await;
        }
        assert!(seen.lock().unwrap().is_empty());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert_eq!(resource.state().data, Some(10));
        assert!(!resource.state().loading);
    }

    #[tokio::test(start_paused = true)]
    async fn later_request_wins_even_when_earlier_resolves_last() {
        let resource = echo_after_delay();

        resource.trigger(300);
        sleep(Duration::from_millis(10)).await;
        resource.trigger(20);

        sleep(Duration::from_secs(1)).await;
        let state = resource.state();
        assert_eq!(state.data, Some(20));
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_reports_cancellation() {
        let resource = echo_after_delay();

        let (first, _) = tokio::join!(resource.fetch(300), async {
            sleep(Duration::from_millis(50)).await;
            resource.trigger(20);
        });

        assert_eq!(first.unwrap_err().code, ErrorCode::RequestCancelled);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(resource.state().data, Some(20));
    }

    #[tokio::test(start_paused = true)]
    async fn new_request_keeps_previous_data_while_loading() {
        let resource = echo_after_delay();
        assert_eq!(resource.fetch(10).await, Ok(10));

        resource.trigger(200);
        sleep(Duration::from_millis(50)).await;
        let state = resource.state();
        assert!(state.loading);
        assert_eq!(state.data, Some(10));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(resource.state().data, Some(200));
        assert!(resource.state().last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_service_error_exhausts_retries_with_backoff() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&calls);
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let resource: Resource<(), u32> = Resource::new(
            "bank-details",
            ResourceOptions::default().with_retry(policy),
            move |_| {
                recorder.lock().unwrap().push(Instant::now());
                async { Err(ApiError::new(ErrorCode::BankServiceError, "unavailable")) }
            },
        );

        let err = resource.fetch(()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BankServiceError);

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<Duration> = calls.windows(2).map(|pair| pair[1] - pair[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );

        let state = resource.state();
        assert!(!state.loading);
        assert!(state.data.is_none());
        assert_eq!(state.error.map(|e| e.code), Some(ErrorCode::BankServiceError));
    }

    #[tokio::test(start_paused = true)]
    async fn validation_errors_are_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let resource: Resource<f64, u32> =
            Resource::new("quote", ResourceOptions::default(), move |amount| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(ApiError::new(
                        ErrorCode::MinAmountError,
                        format!("Minimum amount is 10, got {amount}"),
                    ))
                }
            });

        let err = resource.fetch(5.0).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MinAmountError);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_debounce_and_resets_state() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let resource = Resource::new(
            "quote",
            ResourceOptions::debounced(Duration::from_millis(500)),
            move |amount: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(amount) }
            },
        );

        resource.fetch(7).await.unwrap();
        resource.trigger(8);
        assert!(resource.is_pending());
        resource.clear();

        sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(resource.state().is_idle());
        assert!(!resource.is_pending());
    }
}
