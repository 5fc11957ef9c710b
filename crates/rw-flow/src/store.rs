use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::harness::HarnessLink;

/// A wizard's state record and the pure reducer that evolves it.
pub(crate) trait FlowModel: Send + Sync + 'static {
    type State: Clone + PartialEq + Send + Sync + 'static;
    type Action;
    type Step: Copy + PartialEq + fmt::Display;

    const FLOW: &'static str;

    fn step(state: &Self::State) -> Self::Step;
    fn reduce(state: Self::State, action: Self::Action) -> Self::State;
}

/// Single writer for one flow's state.
///
/// Reductions run inside the channel's write lock, so check-and-set actions
/// (starting an operation only when none is running) are atomic.
pub(crate) struct Store<M: FlowModel> {
    inner: Arc<Inner<M>>,
}

struct Inner<M: FlowModel> {
    state: watch::Sender<M::State>,
    harness: HarnessLink,
}

impl<M: FlowModel> Clone for Store<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: FlowModel> Store<M> {
    pub(crate) fn new(initial: M::State, harness: HarnessLink) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner { state, harness }),
        }
    }

    pub(crate) fn snapshot(&self) -> M::State {
        self.inner.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<M::State> {
        self.inner.state.subscribe()
    }

    pub(crate) fn harness(&self) -> &HarnessLink {
        &self.inner.harness
    }

    /// Applies `action`; returns whether the state changed.
    pub(crate) fn dispatch(&self, action: M::Action) -> bool {
        let mut transition = None;
        let changed = self.inner.state.send_if_modified(|state| {
            let next = M::reduce(state.clone(), action);
            if next == *state {
                return false;
            }
            let (from, to) = (M::step(state), M::step(&next));
            if from != to {
                transition = Some((from, to));
            }
            *state = next;
            true
        });

        if let Some((from, to)) = transition {
            info!(flow = M::FLOW, %from, %to, "step transition");
            self.inner.harness.record(M::FLOW, &from, &to);
        }
        changed
    }
}
