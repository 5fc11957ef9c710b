use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::ApiState;

/// State cell plus the single task allowed to write to it.
pub(crate) struct Slot<T> {
    pub(crate) name: &'static str,
    state: watch::Sender<ApiState<T>>,
    generation: AtomicU64,
    task: Mutex<Option<AbortHandle>>,
}

impl<T> Slot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(ApiState::default());
        Self {
            name,
            state,
            generation: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    pub(crate) fn snapshot(&self) -> ApiState<T> {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ApiState<T>> {
        self.state.subscribe()
    }

    /// Supersedes the running task with a new one and returns its generation.
    ///
    /// `prepare` runs against the state before the new task can observe it.
    pub(crate) fn replace_task<P, F, Fut>(&self, prepare: P, make: F) -> u64
    where
        P: FnOnce(&mut ApiState<T>),
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut task = lock(&self.task);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = task.take() {
            previous.abort();
        }
        self.state.send_modify(prepare);
        *task = Some(tokio::spawn(make(generation)).abort_handle());
        generation
    }

    /// Aborts the running task and invalidates anything it might still commit.
    pub(crate) fn cancel(&self) -> bool {
        let mut task = lock(&self.task);
        self.halt(&mut task)
    }

    /// Like [`Slot::cancel`], but only while `generation` is still the latest.
    pub(crate) fn cancel_generation(&self, generation: u64) -> bool {
        let mut task = lock(&self.task);
        if !self.is_current(generation) {
            return false;
        }
        self.halt(&mut task)
    }

    fn halt(&self, task: &mut Option<AbortHandle>) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
        match task.take() {
            Some(previous) => {
                let was_running = !previous.is_finished();
                previous.abort();
                was_running
            }
            None => false,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub(crate) fn reset(&self) {
        self.cancel();
        self.state.send_replace(ApiState::default());
    }

    /// Applies `update` only if `generation` is still the latest request.
    pub(crate) fn commit(&self, generation: u64, update: impl FnOnce(&mut ApiState<T>)) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            true
        })
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
