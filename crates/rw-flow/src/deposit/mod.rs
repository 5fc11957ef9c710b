//! Fiat-to-crypto wizard: `amount -> bank-details -> verification -> success`.
//!
//! The verification step settles on whichever arrives first: the terminal
//! status from the verification poll, the fixed confirmation delay, or an
//! outcome forced through an injected harness. All three race inside one
//! task, so only one of them can ever commit.

mod state;

pub use state::{AmountLimits, DepositPatch, DepositState, DepositStep};

use rw_api_client::{ApiError, ApiResult, DepositApi, ErrorKind};
use rw_api_types::{
    BankDetails, BankDetailsRequest, DepositQuote, DepositQuoteRequest,
    InitiateVerificationRequest, InitiateVerificationResponse, VerificationStatus,
    VerificationStatusResponse, catalog,
};
use rw_resource::{ApiState, Poller, Resource, ResourceOptions};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;
use uuid::Uuid;

#[cfg(any(test, feature = "test-harness"))]
use crate::FlowHarness;
use crate::harness::{ForcedOutcome, HarnessLink};
use crate::store::Store;
use crate::validation::AMOUNT_FIELD;
use crate::{Callback, DepositConfig, FlowError, Priced};
use state::{DepositAction, DepositModel, Settlement};

const DEFAULT_FAILURE_REASON: &str = "Payment could not be verified";

pub type PricedQuote = Priced<DepositQuoteRequest, DepositQuote>;

/// Handed to the completion callback when the user leaves the success step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositReceipt {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub token: String,
    pub token_amount: Option<f64>,
}

pub struct DepositFlowBuilder {
    api: Arc<dyn DepositApi>,
    config: DepositConfig,
    on_complete: Option<Callback<DepositReceipt>>,
    harness: HarnessLink,
}

impl DepositFlowBuilder {
    pub fn config(mut self, config: DepositConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_complete(
        mut self,
        callback: impl Fn(DepositReceipt) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    #[cfg(any(test, feature = "test-harness"))]
    pub fn harness(mut self, harness: FlowHarness) -> Self {
        self.harness = HarnessLink::attached(harness);
        self
    }

    pub fn build(self) -> DepositFlow {
        let Self {
            api,
            config,
            on_complete,
            harness,
        } = self;
        let retry = ResourceOptions::default().with_retry(config.retry);

        let quote = {
            let api = Arc::clone(&api);
            Resource::new(
                "deposit-quote",
                ResourceOptions::debounced(config.quote_debounce).with_retry(config.retry),
                move |request: DepositQuoteRequest| {
                    let api = Arc::clone(&api);
                    async move {
                        let quote = api.get_quote(request.clone()).await?;
                        Ok(PricedQuote { request, quote })
                    }
                },
            )
        };
        let bank_details = {
            let api = Arc::clone(&api);
            Resource::new("bank-details", retry, move |request| {
                let api = Arc::clone(&api);
                async move { api.get_bank_details(request).await }
            })
        };
        let verification = {
            let api = Arc::clone(&api);
            Resource::new("initiate-verification", retry, move |request| {
                let api = Arc::clone(&api);
                async move { api.initiate_verification(request).await }
            })
        };
        let status = {
            let api = Arc::clone(&api);
            Poller::new(
                "verification-status",
                |response: &VerificationStatusResponse| response.status.is_terminal(),
                move |transaction_id: String| {
                    let api = Arc::clone(&api);
                    async move { api.check_verification_status(&transaction_id).await }
                },
            )
        };

        let limits = AmountLimits {
            min: config.min_amount,
            max: config.max_amount,
        };
        DepositFlow {
            inner: Arc::new(Inner {
                store: Store::new(DepositState::new(limits), harness),
                config,
                quote,
                bank_details,
                verification,
                status,
                settlement: Mutex::new(None),
                on_complete,
            }),
        }
    }
}

/// Deposit wizard instance. Dropping it cancels every timer, poll and
/// request it started.
pub struct DepositFlow {
    inner: Arc<Inner>,
}

struct Inner {
    config: DepositConfig,
    store: Store<DepositModel>,
    quote: Resource<DepositQuoteRequest, PricedQuote>,
    bank_details: Resource<BankDetailsRequest, BankDetails>,
    verification: Resource<InitiateVerificationRequest, InitiateVerificationResponse>,
    status: Poller<String, VerificationStatusResponse>,
    settlement: Mutex<Option<AbortHandle>>,
    on_complete: Option<Callback<DepositReceipt>>,
}

impl DepositFlow {
    pub fn new(api: Arc<dyn DepositApi>, config: DepositConfig) -> Self {
        Self::builder(api).config(config).build()
    }

    pub fn builder(api: Arc<dyn DepositApi>) -> DepositFlowBuilder {
        DepositFlowBuilder {
            api,
            config: DepositConfig::default(),
            on_complete: None,
            harness: HarnessLink::default(),
        }
    }

    pub fn state(&self) -> DepositState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<DepositState> {
        self.inner.store.subscribe()
    }

    pub fn quote_state(&self) -> ApiState<PricedQuote> {
        self.inner.quote.state()
    }

    pub fn bank_details_state(&self) -> ApiState<BankDetails> {
        self.inner.bank_details.state()
    }

    pub fn verification_state(&self) -> ApiState<VerificationStatusResponse> {
        self.inner.status.state()
    }

    /// Applies edits on the amount step and re-prices through the debounced quote.
    pub fn update_state(&self, patch: DepositPatch) {
        let inner = &self.inner;
        if !inner.store.dispatch(DepositAction::Update(patch)) {
            return;
        }
        let state = inner.store.snapshot();
        match state.amount_value {
            Some(amount) => inner.quote.trigger(quote_request(&state, amount)),
            None => inner.quote.clear(),
        }
    }

    pub async fn go_to_next_step(&self) {
        let state = self.inner.store.snapshot();
        match state.step {
            DepositStep::Amount => self.inner.submit_amount().await,
            DepositStep::BankDetails => self.inner.start_verification(None).await,
            DepositStep::Verification => {
                debug!(flow = "deposit", "verification advances on its own");
            }
            DepositStep::Success => self.inner.finish(state),
        }
    }

    pub fn go_to_previous_step(&self) {
        let inner = &self.inner;
        match inner.store.snapshot().step {
            DepositStep::Amount => {}
            DepositStep::BankDetails => {
                if inner.store.dispatch(DepositAction::Back) {
                    inner.bank_details.clear();
                }
            }
            DepositStep::Verification => {
                debug!(flow = "deposit", "back navigation is locked during verification");
            }
            DepositStep::Success => {
                inner.release();
                inner.store.dispatch(DepositAction::Back);
            }
        }
    }

    /// Re-issues the operation behind the current step without moving it.
    pub async fn retry_current_operation(&self) {
        let inner = &self.inner;
        let state = inner.store.snapshot();
        if state.is_loading {
            debug!(flow = "deposit", "retry ignored while an operation is in flight");
            return;
        }
        inner.store.dispatch(DepositAction::ClearError);

        match state.step {
            DepositStep::Amount => inner.refresh_quote().await,
            DepositStep::BankDetails => inner.refresh_bank_details().await,
            DepositStep::Verification => {
                if state.verification_status != Some(VerificationStatus::Failed) {
                    debug!(flow = "deposit", "verification still pending, retry ignored");
                    return;
                }
                inner.halt_settlement();
                inner.start_verification(state.transaction_id).await;
            }
            DepositStep::Success => {}
        }
    }

    /// Cancels all background work; the state snapshot stays readable.
    pub fn shutdown(&self) {
        self.inner.release();
    }
}

impl Drop for DepositFlow {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl Inner {
    async fn submit_amount(&self) {
        let state = self.store.snapshot();
        let amount = match state.validate_amount() {
            Ok(amount) => amount,
            Err(err) => {
                self.store.dispatch(DepositAction::Rejected(err));
                return;
            }
        };
        if !self.begin() {
            return;
        }

        let quote = match self.obtain_quote(&quote_request(&state, amount)).await {
            Ok(quote) => quote,
            Err(err) => return self.fail(AMOUNT_FIELD, err),
        };
        let request = BankDetailsRequest {
            amount,
            currency: state.currency.clone(),
            token_id: state.token.clone(),
            quote_id: quote.quote_id.clone(),
        };
        match self.bank_details.fetch(request).await {
            Ok(details) => {
                self.store.dispatch(DepositAction::BankDetailsReady {
                    quote: Some(quote),
                    details,
                });
            }
            Err(err) => self.fail(AMOUNT_FIELD, err),
        }
    }

    /// Registers the transfer for verification and opens the settlement race.
    ///
    /// A retry passes the existing transaction id so the poll stays bound to it.
    async fn start_verification(&self, existing: Option<String>) {
        let state = self.store.snapshot();
        let (Some(details), Some(amount)) = (state.bank_details.as_ref(), state.amount_value) else {
            self.store.dispatch(DepositAction::Rejected(FlowError::validation(
                "bankDetails",
                "Bank details are not available yet",
            )));
            return;
        };
        if !self.begin() {
            return;
        }

        let transaction_id =
            existing.unwrap_or_else(|| format!("dep_{}", Uuid::new_v4().simple()));
        let request = InitiateVerificationRequest {
            transaction_id,
            amount,
            currency: state.currency.clone(),
            reference: details.reference.clone(),
        };
        match self.verification.fetch(request).await {
            Ok(response) => {
                let transaction_id = response.transaction_id;
                self.store.dispatch(DepositAction::VerificationStarted {
                    transaction_id: transaction_id.clone(),
                });
                let state = self.store.snapshot();
                let waiting = state.step == DepositStep::Verification
                    && state.verification_status == Some(VerificationStatus::Pending)
                    && state.transaction_id.as_deref() == Some(transaction_id.as_str());
                if waiting {
                    self.open_settlement(transaction_id);
                }
            }
            Err(err) => self.fail(AMOUNT_FIELD, err),
        }
    }

    fn open_settlement(&self, transaction_id: String) {
        let store = self.store.clone();
        let status = self.status.clone();
        let harness = self.store.harness().clone();
        let delay = self.config.confirmation_delay;

        status.start_polling(transaction_id.clone(), self.config.poll_interval);
        let mut updates = status.subscribe();

        let mut slot = lock(&self.settlement);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = tokio::time::sleep(delay) => Settlement::Confirmed {
                    received_amount: None,
                    token_amount: None,
                },
                observed = terminal_status(&mut updates) => settlement_from_status(observed),
                forced = harness.forced_outcome() => match forced {
                    ForcedOutcome::Success => Settlement::Confirmed {
                        received_amount: None,
                        token_amount: None,
                    },
                    ForcedOutcome::Failure(reason) => Settlement::Failed { reason },
                },
            };
            status.stop_polling();
            store.dispatch(DepositAction::Settled {
                transaction_id,
                outcome,
            });
        });
        *slot = Some(task.abort_handle());
    }

    async fn refresh_quote(&self) {
        let state = self.store.snapshot();
        let amount = match state.validate_amount() {
            Ok(amount) => amount,
            Err(err) => {
                self.store.dispatch(DepositAction::Rejected(err));
                return;
            }
        };
        if !self.begin() {
            return;
        }
        match self.quote.fetch(quote_request(&state, amount)).await {
            Ok(priced) => {
                self.store.dispatch(DepositAction::QuoteReady(priced.quote));
            }
            Err(err) => self.fail(AMOUNT_FIELD, err),
        }
    }

    async fn refresh_bank_details(&self) {
        let state = self.store.snapshot();
        let Some(amount) = state.amount_value else {
            return;
        };
        if !self.begin() {
            return;
        }
        let quote = match &state.quote {
            Some(quote) => quote.clone(),
            None => match self.obtain_quote(&quote_request(&state, amount)).await {
                Ok(quote) => quote,
                Err(err) => return self.fail(AMOUNT_FIELD, err),
            },
        };
        let request = BankDetailsRequest {
            amount,
            currency: state.currency.clone(),
            token_id: state.token.clone(),
            quote_id: quote.quote_id.clone(),
        };
        match self.bank_details.fetch(request).await {
            Ok(details) => {
                self.store.dispatch(DepositAction::BankDetailsReady {
                    quote: Some(quote),
                    details,
                });
            }
            Err(err) => self.fail(AMOUNT_FIELD, err),
        }
    }

    /// Reuses the settled quote for `request`, fetching a fresh one otherwise.
    async fn obtain_quote(&self, request: &DepositQuoteRequest) -> ApiResult<DepositQuote> {
        if !self.quote.is_pending() {
            if let Some(priced) = self.quote.state().data {
                if priced.request == *request {
                    return Ok(priced.quote);
                }
            }
        }
        self.quote.fetch(request.clone()).await.map(|priced| priced.quote)
    }

    fn finish(&self, state: DepositState) {
        if let (Some(callback), Some(transaction_id)) = (&self.on_complete, state.transaction_id) {
            callback(DepositReceipt {
                transaction_id,
                amount: state.received_amount.or(state.amount_value).unwrap_or_default(),
                currency: state.currency,
                token: state.token,
                token_amount: state.token_amount,
            });
        }
        self.release();
        self.store.dispatch(DepositAction::Reset);
    }

    fn begin(&self) -> bool {
        let started = self.store.dispatch(DepositAction::Begin);
        if !started {
            debug!(flow = "deposit", "operation already in flight");
        }
        started
    }

    fn fail(&self, field: &str, err: ApiError) {
        if err.kind() == ErrorKind::Cancelled {
            debug!(flow = "deposit", error = %err, "superseded request dropped");
            self.store.dispatch(DepositAction::Cancelled);
            return;
        }
        self.store
            .dispatch(DepositAction::Failed(FlowError::from_api(field, err)));
    }

    /// Ends the settlement race and its poll without touching the flow state.
    fn halt_settlement(&self) {
        if let Some(task) = lock(&self.settlement).take() {
            task.abort();
        }
        self.status.stop_polling();
    }

    fn release(&self) {
        self.halt_settlement();
        self.status.clear();
        self.quote.clear();
        self.bank_details.clear();
        self.verification.clear();
    }
}

fn quote_request(state: &DepositState, amount: f64) -> DepositQuoteRequest {
    let to_currency = catalog::token_by_id(&state.token)
        .map(|token| token.symbol)
        .unwrap_or_else(|| state.token.to_ascii_uppercase());
    DepositQuoteRequest {
        amount,
        from_currency: state.currency.clone(),
        to_currency,
        token_id: state.token.clone(),
    }
}

async fn terminal_status(
    updates: &mut watch::Receiver<ApiState<VerificationStatusResponse>>,
) -> VerificationStatusResponse {
    let observed = updates
        .wait_for(|state| {
            state
                .data
                .as_ref()
                .is_some_and(|response| response.status.is_terminal())
        })
        .await
        .ok()
        .and_then(|state| state.data.clone());
    match observed {
        Some(response) => response,
        None => std::future::pending().await,
    }
}

fn settlement_from_status(response: VerificationStatusResponse) -> Settlement {
    match response.status {
        VerificationStatus::Failed => Settlement::Failed {
            reason: response
                .failure_reason
                .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_owned()),
        },
        VerificationStatus::Success | VerificationStatus::Pending => Settlement::Confirmed {
            received_amount: response.received_amount,
            token_amount: response.token_amount,
        },
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
