//! Async resource state containers.
//!
//! A [`Resource`] wraps one backend operation and publishes its outcome as an
//! [`ApiState`] snapshot. Requests are last-caller-wins: starting a request
//! aborts the previous one and bumps a generation counter that every commit
//! is checked against, so a superseded response can never reach the state.
//! A [`Poller`] applies the same rules to a recurring status check that ends
//! on its own once a terminal value is observed.
//!
//! Everything here spawns onto the ambient Tokio runtime.

mod poller;
mod resource;
mod retry;
mod slot;
mod state;

pub use poller::{DEFAULT_POLL_INTERVAL, PollHandle, Poller};
pub use resource::{Resource, ResourceOptions};
pub use retry::{RetryPolicy, with_retry};
pub use state::ApiState;

use futures::future::BoxFuture;
use rw_api_client::ApiResult;
use std::sync::Arc;

/// Type-erased backend call shared by resources and pollers.
pub type Fetcher<Req, T> = Arc<dyn Fn(Req) -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;
