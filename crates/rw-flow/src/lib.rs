//! Deposit and withdrawal wizards.
//!
//! Each flow owns one state record behind a single-writer [`store`]. Every
//! change goes through a pure reducer that recomputes the derived fields
//! (`progress`, `can_go_back`, `can_proceed`) before the new snapshot is
//! published. Background work (debounced quotes, status polls, settlement
//! timers) lives in child resources and cancellable tasks owned by the flow;
//! dropping or shutting down a flow cancels all of it.

pub mod config;
pub mod deposit;
mod error;
mod harness;
mod store;
pub mod validation;
pub mod withdrawal;

pub use config::{DepositConfig, WithdrawalConfig};
pub use deposit::{
    DepositFlow, DepositPatch, DepositReceipt, DepositState, DepositStep, PricedQuote,
};
pub use error::FlowError;
#[cfg(any(test, feature = "test-harness"))]
pub use harness::FlowHarness;
pub use harness::{ForcedOutcome, RecordedTransition};
pub use withdrawal::{
    WithdrawalFlow, WithdrawalPatch, WithdrawalReceipt, WithdrawalState, WithdrawalStep,
};

use serde::Serialize;
use std::sync::Arc;

/// Caller-supplied hook invoked when a wizard finishes or is abandoned.
pub type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Quote together with the request it prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Priced<R, Q> {
    pub request: R,
    pub quote: Q,
}
