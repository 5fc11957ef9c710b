//! Injectable test harness.
//!
//! A [`FlowHarness`] is handed to a flow builder and shared with the test.
//! It records every step transition and can force the outcome of the next
//! settlement wait (deposit verification, withdrawal status). Builds without
//! `cfg(test)` or the `test-harness` feature carry only an inert link.

use std::fmt;

/// Settlement result injected by a test instead of waiting for a timer or poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ForcedOutcome {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransition {
    pub flow: &'static str,
    pub from: String,
    pub to: String,
}

#[cfg(any(test, feature = "test-harness"))]
pub use enabled::FlowHarness;

#[cfg(any(test, feature = "test-harness"))]
mod enabled {
    use super::{ForcedOutcome, RecordedTransition};
    use std::sync::{Arc, Mutex, MutexGuard};
    use tokio::sync::watch;

    #[derive(Clone)]
    pub struct FlowHarness {
        inner: Arc<Inner>,
    }

    struct Inner {
        transitions: Mutex<Vec<RecordedTransition>>,
        forced: watch::Sender<Option<ForcedOutcome>>,
    }

    impl Default for FlowHarness {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FlowHarness {
        pub fn new() -> Self {
            let (forced, _) = watch::channel(None);
            Self {
                inner: Arc::new(Inner {
                    transitions: Mutex::new(Vec::new()),
                    forced,
                }),
            }
        }

        pub fn transitions(&self) -> Vec<RecordedTransition> {
            self.lock().clone()
        }

        /// Steps entered so far, in order.
        pub fn visited(&self) -> Vec<String> {
            self.lock().iter().map(|t| t.to.clone()).collect()
        }

        pub fn force_success(&self) {
            self.inner.forced.send_replace(Some(ForcedOutcome::Success));
        }

        pub fn force_failure(&self, reason: impl Into<String>) {
            self.inner
                .forced
                .send_replace(Some(ForcedOutcome::Failure(reason.into())));
        }

        /// An outcome that no settlement wait has consumed yet.
        pub fn pending_outcome(&self) -> Option<ForcedOutcome> {
            self.inner.forced.borrow().clone()
        }

        pub(crate) fn record(&self, transition: RecordedTransition) {
            self.lock().push(transition);
        }

        /// Waits for a forced outcome and consumes it.
        pub(crate) async fn take_forced(&self) -> ForcedOutcome {
            let mut rx = self.inner.forced.subscribe();
            loop {
                let forced = rx.borrow_and_update().clone();
                if let Some(outcome) = forced {
                    self.inner.forced.send_replace(None);
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    return std::future::pending().await;
                }
            }
        }

        fn lock(&self) -> MutexGuard<'_, Vec<RecordedTransition>> {
            self.inner
                .transitions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }
}

/// What a flow holds on to; inert unless a harness was injected.
#[derive(Clone, Default)]
pub(crate) struct HarnessLink {
    #[cfg(any(test, feature = "test-harness"))]
    harness: Option<FlowHarness>,
}

#[cfg(any(test, feature = "test-harness"))]
impl HarnessLink {
    pub(crate) fn attached(harness: FlowHarness) -> Self {
        Self {
            harness: Some(harness),
        }
    }

    pub(crate) fn record(
        &self,
        flow: &'static str,
        from: &dyn fmt::Display,
        to: &dyn fmt::Display,
    ) {
        if let Some(harness) = &self.harness {
            harness.record(RecordedTransition {
                flow,
                from: from.to_string(),
                to: to.to_string(),
            });
        }
    }

    pub(crate) async fn forced_outcome(&self) -> ForcedOutcome {
        match &self.harness {
            Some(harness) => harness.take_forced().await,
            None => std::future::pending().await,
        }
    }
}

#[cfg(not(any(test, feature = "test-harness")))]
impl HarnessLink {
    pub(crate) fn record(
        &self,
        _flow: &'static str,
        _from: &dyn fmt::Display,
        _to: &dyn fmt::Display,
    ) {
    }

    pub(crate) async fn forced_outcome(&self) -> ForcedOutcome {
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn forced_outcome_is_consumed_once() {
        let harness = FlowHarness::new();
        let link = HarnessLink::attached(harness.clone());

        harness.force_failure("reference mismatch");
        assert_eq!(
            link.forced_outcome().await,
            ForcedOutcome::Failure("reference mismatch".to_owned())
        );
        assert_eq!(harness.pending_outcome(), None);

        let waiting = tokio::time::timeout(Duration::from_secs(5), link.forced_outcome()).await;
        assert!(waiting.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_an_outcome_forced_later() {
        let harness = FlowHarness::new();
        let link = HarnessLink::attached(harness.clone());

        let waiter = tokio::spawn(async move { link.forced_outcome().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.force_success();

        assert_eq!(waiter.await.unwrap(), ForcedOutcome::Success);
    }

    #[tokio::test]
    async fn detached_link_never_resolves() {
        let link = HarnessLink::default();
        link.record("deposit", &"amount", &"bank-details");
        let waiting = tokio::time::timeout(Duration::from_millis(10), link.forced_outcome()).await;
        assert!(waiting.is_err());
    }

    #[test]
    fn records_transitions_in_order() {
        let harness = FlowHarness::new();
        let link = HarnessLink::attached(harness.clone());
        link.record("deposit", &"amount", &"bank-details");
        link.record("deposit", &"bank-details", &"verification");

        assert_eq!(harness.visited(), vec!["bank-details", "verification"]);
        assert_eq!(harness.transitions()[0].from, "amount");
    }
}
