//! Crypto-to-fiat wizard: `token-selection -> qr-send -> success`.
//!
//! Entering `qr-send` opens a settlement wait over the withdrawal status
//! poll, the QR countdown and an optional injected harness. The poller owns
//! terminal detection (`completed` or `failed`); the wait only interprets
//! the terminal value it observes.

mod state;

pub use state::{WithdrawalPatch, WithdrawalState, WithdrawalStep};

use rw_api_client::{ApiError, ErrorKind, WithdrawalApi};
use rw_api_types::{
    BankAccount, Currency, Token, WalletAddressRequest, WalletAddressResponse, WithdrawalQuote,
    WithdrawalQuoteRequest, WithdrawalStatus, WithdrawalStatusRequest, WithdrawalStatusResponse,
};
use rw_resource::{ApiState, Poller, Resource, ResourceOptions};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::debug;

#[cfg(any(test, feature = "test-harness"))]
use crate::FlowHarness;
use crate::harness::{ForcedOutcome, HarnessLink};
use crate::store::Store;
use crate::validation::{BANK_ACCOUNT_FIELD, TOKEN_AMOUNT_FIELD, TOKEN_FIELD};
use crate::{Callback, FlowError, Priced, WithdrawalConfig};
use state::{Settlement, WithdrawalAction, WithdrawalModel};

/// Quote id sent with a wallet-address request when no quote has settled.
pub const PLACEHOLDER_QUOTE_ID: &str = "quote_placeholder";

const DEFAULT_FAILURE_REASON: &str = "Withdrawal could not be completed";

pub type PricedWithdrawalQuote = Priced<WithdrawalQuoteRequest, WithdrawalQuote>;

/// Handed to the completion callback when the user leaves the success step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalReceipt {
    pub transaction_id: String,
    pub token: String,
    pub token_amount: Option<f64>,
    pub currency: String,
    pub fiat_amount: f64,
    pub bank_account_id: Option<String>,
}

pub struct WithdrawalFlowBuilder {
    api: Arc<dyn WithdrawalApi>,
    config: WithdrawalConfig,
    on_complete: Option<Callback<WithdrawalReceipt>>,
    on_exit: Option<Callback<()>>,
    harness: HarnessLink,
}

impl WithdrawalFlowBuilder {
    pub fn config(mut self, config: WithdrawalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_complete(
        mut self,
        callback: impl Fn(WithdrawalReceipt) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Called when the user backs out of the first step.
    pub fn on_exit(mut self, callback: impl Fn(()) + Send + Sync + 'static) -> Self {
        self.on_exit = Some(Arc::new(callback));
        self
    }

    #[cfg(any(test, feature = "test-harness"))]
    pub fn harness(mut self, harness: FlowHarness) -> Self {
        self.harness = HarnessLink::attached(harness);
        self
    }

    pub fn build(self) -> WithdrawalFlow {
        let Self {
            api,
            config,
            on_complete,
            on_exit,
            harness,
        } = self;
        let retry = ResourceOptions::default().with_retry(config.retry);

        let quote = {
            let api = Arc::clone(&api);
            Resource::new(
                "withdrawal-quote",
                ResourceOptions::debounced(config.quote_debounce).with_retry(config.retry),
                move |request: WithdrawalQuoteRequest| {
                    let api = Arc::clone(&api);
                    async move {
                        let quote = api.get_quote(request.clone()).await?;
                        Ok(Priced { request, quote })
                    }
                },
            )
        };
        let tokens = {
            let api = Arc::clone(&api);
            Resource::new("tokens", retry, move |()| {
                let api = Arc::clone(&api);
                async move { api.get_available_tokens().await }
            })
        };
        let currencies = {
            let api = Arc::clone(&api);
            Resource::new("currencies", retry, move |()| {
                let api = Arc::clone(&api);
                async move { api.get_available_currencies().await }
            })
        };
        let bank_accounts = {
            let api = Arc::clone(&api);
            Resource::new("bank-accounts", retry, move |()| {
                let api = Arc::clone(&api);
                async move { api.get_bank_accounts().await }
            })
        };
        let wallet = {
            let api = Arc::clone(&api);
            Resource::new("wallet-address", retry, move |request| {
                let api = Arc::clone(&api);
                async move { api.generate_wallet_address(request).await }
            })
        };
        let status = {
            let api = Arc::clone(&api);
            Poller::new(
                "withdrawal-status",
                |response: &WithdrawalStatusResponse| response.status.is_terminal(),
                move |request: WithdrawalStatusRequest| {
                    let api = Arc::clone(&api);
                    async move { api.check_withdrawal_status(request).await }
                },
            )
        };

        WithdrawalFlow {
            inner: Arc::new(Inner {
                store: Store::new(WithdrawalState::default(), harness),
                config,
                quote,
                tokens,
                currencies,
                bank_accounts,
                wallet,
                status,
                settlement: Mutex::new(None),
                on_complete,
                on_exit,
            }),
        }
    }
}

/// Withdrawal wizard instance. Dropping it cancels every timer, poll and
/// request it started.
pub struct WithdrawalFlow {
    inner: Arc<Inner>,
}

struct Inner {
    config: WithdrawalConfig,
    store: Store<WithdrawalModel>,
    quote: Resource<WithdrawalQuoteRequest, PricedWithdrawalQuote>,
    tokens: Resource<(), Vec<Token>>,
    currencies: Resource<(), Vec<Currency>>,
    bank_accounts: Resource<(), Vec<BankAccount>>,
    wallet: Resource<WalletAddressRequest, WalletAddressResponse>,
    status: Poller<WithdrawalStatusRequest, WithdrawalStatusResponse>,
    settlement: Mutex<Option<AbortHandle>>,
    on_complete: Option<Callback<WithdrawalReceipt>>,
    on_exit: Option<Callback<()>>,
}

enum Signal {
    Observed(WithdrawalStatusResponse),
    CountdownElapsed,
    Forced(ForcedOutcome),
}

impl WithdrawalFlow {
    pub fn new(api: Arc<dyn WithdrawalApi>, config: WithdrawalConfig) -> Self {
        Self::builder(api).config(config).build()
    }

    pub fn builder(api: Arc<dyn WithdrawalApi>) -> WithdrawalFlowBuilder {
        WithdrawalFlowBuilder {
            api,
            config: WithdrawalConfig::default(),
            on_complete: None,
            on_exit: None,
            harness: HarnessLink::default(),
        }
    }

    /// Loads the catalog and bank accounts; token and currency default to
    /// the first entries, the bank account to the first account.
    pub async fn start(&self) {
        self.inner.load_catalog().await;
    }

    pub async fn refresh_bank_accounts(&self) {
        let inner = &self.inner;
        match inner.bank_accounts.fetch(()).await {
            Ok(accounts) => {
                inner.store.dispatch(WithdrawalAction::BankAccountsLoaded(accounts));
            }
            Err(err) => inner.fail(BANK_ACCOUNT_FIELD, err),
        }
    }

    pub fn state(&self) -> WithdrawalState {
        self.inner.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<WithdrawalState> {
        self.inner.store.subscribe()
    }

    pub fn quote_state(&self) -> ApiState<PricedWithdrawalQuote> {
        self.inner.quote.state()
    }

    pub fn wallet_address_state(&self) -> ApiState<WalletAddressResponse> {
        self.inner.wallet.state()
    }

    pub fn status_state(&self) -> ApiState<WithdrawalStatusResponse> {
        self.inner.status.state()
    }

    pub fn bank_accounts_state(&self) -> ApiState<Vec<BankAccount>> {
        self.inner.bank_accounts.state()
    }

    pub fn is_polling(&self) -> bool {
        self.inner.status.is_polling()
    }

    /// Applies edits on `token-selection` and re-prices through the debounced quote.
    pub fn update_state(&self, patch: WithdrawalPatch) {
        let inner = &self.inner;
        if !inner.store.dispatch(WithdrawalAction::Update(patch)) {
            return;
        }
        match quote_request(&inner.store.snapshot()) {
            Some(request) => inner.quote.trigger(request),
            None => inner.quote.clear(),
        }
    }

    pub async fn go_to_next_step(&self) {
        let state = self.inner.store.snapshot();
        match state.step {
            WithdrawalStep::TokenSelection => self.inner.submit_selection().await,
            WithdrawalStep::QrSend => self.complete_qr_send(),
            WithdrawalStep::Success => self.inner.finish(state),
        }
    }

    pub fn go_to_previous_step(&self) {
        let inner = &self.inner;
        let state = inner.store.snapshot();
        match state.step {
            WithdrawalStep::TokenSelection => {
                if state.is_loading {
                    return;
                }
                inner.release();
                inner.store.dispatch(WithdrawalAction::Reset);
                if let Some(callback) = &inner.on_exit {
                    callback(());
                }
            }
            WithdrawalStep::QrSend => {
                if inner.store.dispatch(WithdrawalAction::Back) {
                    inner.close_settlement();
                    inner.status.clear();
                    inner.wallet.clear();
                }
            }
            WithdrawalStep::Success => {
                if inner.store.dispatch(WithdrawalAction::Back) {
                    inner.resume_settlement();
                }
            }
        }
    }

    /// Completion path of the QR display, independent of the status poll.
    pub fn complete_qr_send(&self) {
        let inner = &self.inner;
        let state = inner.store.snapshot();
        let Some(transaction_id) = state.transaction_id else {
            return;
        };
        if state.step != WithdrawalStep::QrSend {
            return;
        }
        let fiat_amount = inner.latest_fiat_amount();
        inner.close_settlement();
        inner.store.dispatch(WithdrawalAction::Settled {
            transaction_id,
            outcome: Settlement::Completed { fiat_amount },
        });
    }

    /// Re-issues the operation behind the current step without moving it.
    pub async fn retry_current_operation(&self) {
        let inner = &self.inner;
        let state = inner.store.snapshot();
        if state.is_loading {
            debug!(flow = "withdrawal", "retry ignored while an operation is in flight");
            return;
        }
        inner.store.dispatch(WithdrawalAction::ClearError);

        match state.step {
            WithdrawalStep::TokenSelection => inner.load_catalog().await,
            WithdrawalStep::QrSend => {
                if inner.store.dispatch(WithdrawalAction::Resumed) || !inner.status.is_polling() {
                    inner.resume_settlement();
                }
            }
            WithdrawalStep::Success => {}
        }
    }

    pub fn shutdown(&self) {
        self.inner.release();
    }
}

impl Drop for WithdrawalFlow {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl Inner {
    async fn load_catalog(&self) {
        if !self.begin() {
            return;
        }
        let (tokens, currencies, accounts) = tokio::join!(
            self.tokens.fetch(()),
            self.currencies.fetch(()),
            self.bank_accounts.fetch(()),
        );
        let accounts_error = match accounts {
            Ok(accounts) => {
                self.store
                    .dispatch(WithdrawalAction::BankAccountsLoaded(accounts));
                None
            }
            Err(err) => Some(err),
        };
        // CatalogLoaded ends the operation started above.
        match (tokens, currencies) {
            (Ok(tokens), Ok(currencies)) => {
                self.store
                    .dispatch(WithdrawalAction::CatalogLoaded { tokens, currencies });
            }
            (Err(err), _) | (_, Err(err)) => self.fail(TOKEN_FIELD, err),
        }
        if let Some(err) = accounts_error {
            self.fail(BANK_ACCOUNT_FIELD, err);
        }
    }

    async fn submit_selection(&self) {
        let state = self.store.snapshot();
        if let Err(err) = state.validate_selection() {
            self.store.dispatch(WithdrawalAction::Rejected(err));
            return;
        }
        let (Some(token), Some(currency)) = (&state.token, &state.currency) else {
            return;
        };
        if !self.begin() {
            return;
        }

        let amount = match state.token_amount_value {
            Some(amount) => amount,
            None => {
                debug!(
                    flow = "withdrawal",
                    fallback = self.config.fallback_token_amount,
                    "no token amount entered, requesting address for fallback amount"
                );
                self.config.fallback_token_amount
            }
        };
        let request = WalletAddressRequest {
            token_id: token.id.clone(),
            currency: currency.code.clone(),
            amount,
            quote_id: self.settled_quote_id(&state),
            bank_account_id: state.bank_account.as_ref().map(|account| account.id.clone()),
        };

        match self.wallet.fetch(request).await {
            Ok(address) => {
                if self.store.dispatch(WithdrawalAction::AddressReady(address)) {
                    self.resume_settlement();
                }
            }
            Err(err) => self.fail(TOKEN_AMOUNT_FIELD, err),
        }
    }

    /// Quote id of a settled quote for the current selection, if any.
    fn settled_quote_id(&self, state: &WithdrawalState) -> String {
        let current = quote_request(state);
        self.quote
            .state()
            .data
            .filter(|priced| Some(&priced.request) == current.as_ref())
            .map(|priced| priced.quote.quote_id)
            .unwrap_or_else(|| PLACEHOLDER_QUOTE_ID.to_owned())
    }

    /// Starts the status poll and settlement wait for the current address.
    fn resume_settlement(&self) {
        let state = self.store.snapshot();
        let (Some(transaction_id), Some(wallet_address)) =
            (state.transaction_id, state.wallet_address)
        else {
            return;
        };
        if state.step != WithdrawalStep::QrSend {
            return;
        }

        let store = self.store.clone();
        let status = self.status.clone();
        let harness = self.store.harness().clone();
        let countdown = self.config.qr_countdown;
        let fallback = self.config.fallback_fiat_amount;

        status.start_polling(
            WithdrawalStatusRequest {
                transaction_id: transaction_id.clone(),
                wallet_address,
            },
            self.config.poll_interval,
        );
        let mut updates = status.subscribe();

        let mut slot = lock(&self.settlement);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let task = tokio::spawn(async move {
            let signal = tokio::select! {
                observed = terminal_status(&mut updates) => Signal::Observed(observed),
                _ = countdown_elapsed(countdown) => Signal::CountdownElapsed,
                forced = harness.forced_outcome() => Signal::Forced(forced),
            };
            status.stop_polling();

            let outcome = match signal {
                Signal::Observed(response) => match response.status {
                    WithdrawalStatus::Failed => Settlement::Failed {
                        reason: response
                            .failure_reason
                            .unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_owned()),
                    },
                    _ => Settlement::Completed {
                        fiat_amount: response.fiat_amount.unwrap_or(fallback),
                    },
                },
                Signal::CountdownElapsed => {
                    debug!(flow = "withdrawal", "qr countdown elapsed");
                    let reported = updates.borrow().data.as_ref().and_then(|r| r.fiat_amount);
                    Settlement::Completed {
                        fiat_amount: reported.unwrap_or(fallback),
                    }
                }
                Signal::Forced(ForcedOutcome::Success) => Settlement::Completed {
                    fiat_amount: fallback,
                },
                Signal::Forced(ForcedOutcome::Failure(reason)) => Settlement::Failed { reason },
            };
            store.dispatch(WithdrawalAction::Settled {
                transaction_id,
                outcome,
            });
        });
        *slot = Some(task.abort_handle());
    }

    fn close_settlement(&self) {
        if let Some(task) = lock(&self.settlement).take() {
            task.abort();
        }
        self.status.stop_polling();
    }

    fn latest_fiat_amount(&self) -> f64 {
        self.status
            .state()
            .data
            .and_then(|response| response.fiat_amount)
            .unwrap_or(self.config.fallback_fiat_amount)
    }

    /// Reports the receipt and starts over on the catalog already loaded.
    fn finish(&self, state: WithdrawalState) {
        let tokens = state.tokens.clone();
        let currencies = state.currencies.clone();
        let accounts = state.bank_accounts.clone();
        if let (Some(callback), Some(transaction_id)) = (&self.on_complete, state.transaction_id) {
            callback(WithdrawalReceipt {
                transaction_id,
                token: state.token.map(|token| token.symbol).unwrap_or_default(),
                token_amount: state.token_amount_value,
                currency: state.currency.map(|currency| currency.code).unwrap_or_default(),
                fiat_amount: state.fiat_amount.unwrap_or(self.config.fallback_fiat_amount),
                bank_account_id: state.bank_account.map(|account| account.id),
            });
        }
        self.release();
        self.store.dispatch(WithdrawalAction::Reset);
        self.store
            .dispatch(WithdrawalAction::CatalogLoaded { tokens, currencies });
        self.store
            .dispatch(WithdrawalAction::BankAccountsLoaded(accounts));
    }

    fn begin(&self) -> bool {
        let started = self.store.dispatch(WithdrawalAction::Begin);
        if !started {
            debug!(flow = "withdrawal", "operation already in flight");
        }
        started
    }

    fn fail(&self, field: &str, err: ApiError) {
        if err.kind() == ErrorKind::Cancelled {
            debug!(flow = "withdrawal", error = %err, "superseded request dropped");
            self.store.dispatch(WithdrawalAction::Cancelled);
            return;
        }
        self.store
            .dispatch(WithdrawalAction::Failed(FlowError::from_api(field, err)));
    }

    fn release(&self) {
        self.close_settlement();
        self.status.clear();
        self.quote.clear();
        self.tokens.clear();
        self.currencies.clear();
        self.bank_accounts.clear();
        self.wallet.clear();
    }
}

fn quote_request(state: &WithdrawalState) -> Option<WithdrawalQuoteRequest> {
    let (Some(token), Some(currency), Some(amount)) =
        (&state.token, &state.currency, state.token_amount_value)
    else {
        return None;
    };
    Some(WithdrawalQuoteRequest {
        token_amount: amount,
        from_token: token.symbol.clone(),
        to_currency: currency.code.clone(),
        token_id: token.id.clone(),
    })
}

async fn countdown_elapsed(countdown: Option<Duration>) {
    match countdown {
        Some(countdown) => tokio::time::sleep(countdown).await,
        None => std::future::pending().await,
    }
}

async fn terminal_status(
    updates: &mut watch::Receiver<ApiState<WithdrawalStatusResponse>>,
) -> WithdrawalStatusResponse {
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

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
