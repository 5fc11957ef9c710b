use rw_api_types::{
    BankAccount, Currency, Token, WalletAddressResponse, WithdrawalStatus, catalog,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FlowError;
use crate::store::FlowModel;
use crate::validation::{
    BANK_ACCOUNT_FIELD, CURRENCY_FIELD, TOKEN_FIELD, validate_token_amount,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawalStep {
    TokenSelection,
    QrSend,
    Success,
}

impl WithdrawalStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenSelection => "token-selection",
            Self::QrSend => "qr-send",
            Self::Success => "success",
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            Self::TokenSelection => 33,
            Self::QrSend => 66,
            Self::Success => 100,
        }
    }
}

impl fmt::Display for WithdrawalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalState {
    pub step: WithdrawalStep,
    pub tokens: Vec<Token>,
    pub currencies: Vec<Currency>,
    pub bank_accounts: Vec<BankAccount>,
    pub token: Option<Token>,
    pub currency: Option<Currency>,
    pub bank_account: Option<BankAccount>,
    pub token_amount: String,
    /// Parsed `token_amount`, set only while it is within the token's limits.
    pub token_amount_value: Option<f64>,
    pub wallet_address: Option<String>,
    pub qr_code_url: Option<String>,
    pub transaction_id: Option<String>,
    pub expires_at: Option<u128>,
    pub estimated_processing_time: Option<String>,
    pub status: Option<WithdrawalStatus>,
    /// Fiat paid out, known once the flow reaches `success`.
    pub fiat_amount: Option<f64>,
    pub is_loading: bool,
    pub error: Option<FlowError>,
    pub can_go_back: bool,
    pub can_proceed: bool,
    pub progress: u8,
    #[serde(skip)]
    pub(crate) bank_account_auto_filled: bool,
}

impl Default for WithdrawalState {
    fn default() -> Self {
        derive(Self {
            step: WithdrawalStep::TokenSelection,
            tokens: Vec::new(),
            currencies: Vec::new(),
            bank_accounts: Vec::new(),
            token: None,
            currency: None,
            bank_account: None,
            token_amount: String::new(),
            token_amount_value: None,
            wallet_address: None,
            qr_code_url: None,
            transaction_id: None,
            expires_at: None,
            estimated_processing_time: None,
            status: None,
            fiat_amount: None,
            is_loading: false,
            error: None,
            can_go_back: false,
            can_proceed: false,
            progress: 0,
            bank_account_auto_filled: false,
        })
    }
}

impl WithdrawalState {
    /// Step-local guard for leaving `token-selection`.
    pub fn validate_selection(&self) -> Result<(), FlowError> {
        let Some(token) = &self.token else {
            return Err(FlowError::validation(TOKEN_FIELD, "Select a token"));
        };
        if self.currency.is_none() {
            return Err(FlowError::validation(CURRENCY_FIELD, "Select a currency"));
        }
        if self.bank_account.is_none() {
            return Err(FlowError::validation(BANK_ACCOUNT_FIELD, "Select a bank account"));
        }
        validate_token_amount(&self.token_amount, token).map(|_| ())
    }

    fn find_token(&self, id: &str) -> Option<Token> {
        let matches = |token: &Token| {
            token.id.eq_ignore_ascii_case(id) || token.symbol.eq_ignore_ascii_case(id)
        };
        if self.tokens.is_empty() {
            catalog::tokens().into_iter().find(|token| matches(token))
        } else {
            self.tokens.iter().find(|token| matches(token)).cloned()
        }
    }

    fn find_currency(&self, code: &str) -> Option<Currency> {
        if self.currencies.is_empty() {
            catalog::currency_by_code(code)
        } else {
            self.currencies
                .iter()
                .find(|currency| currency.code.eq_ignore_ascii_case(code))
                .cloned()
        }
    }
}

/// Caller edits on `token-selection`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPatch {
    pub token_id: Option<String>,
    pub currency: Option<String>,
    pub bank_account_id: Option<String>,
    pub token_amount: Option<String>,
}

impl WithdrawalPatch {
    pub fn token(id: impl Into<String>) -> Self {
        Self {
            token_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn currency(code: impl Into<String>) -> Self {
        Self {
            currency: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn bank_account(id: impl Into<String>) -> Self {
        Self {
            bank_account_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn token_amount(amount: impl Into<String>) -> Self {
        Self {
            token_amount: Some(amount.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Settlement {
    Completed { fiat_amount: f64 },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub(crate) enum WithdrawalAction {
    CatalogLoaded {
        tokens: Vec<Token>,
        currencies: Vec<Currency>,
    },
    BankAccountsLoaded(Vec<BankAccount>),
    Update(WithdrawalPatch),
    Begin,
    Cancelled,
    Failed(FlowError),
    Rejected(FlowError),
    ClearError,
    AddressReady(WalletAddressResponse),
    /// Settlement wait restarted for the current address.
    Resumed,
    Settled {
        transaction_id: String,
        outcome: Settlement,
    },
    Back,
    Reset,
}

pub(crate) struct WithdrawalModel;

impl FlowModel for WithdrawalModel {
    type State = WithdrawalState;
    type Action = WithdrawalAction;
    type Step = WithdrawalStep;

    const FLOW: &'static str = "withdrawal";

    fn step(state: &WithdrawalState) -> WithdrawalStep {
        state.step
    }

    fn reduce(state: WithdrawalState, action: WithdrawalAction) -> WithdrawalState {
        reduce(state, action)
    }
}

pub(crate) fn reduce(mut state: WithdrawalState, action: WithdrawalAction) -> WithdrawalState {
    use WithdrawalAction as A;

    match action {
        A::CatalogLoaded { tokens, currencies } => {
            state.is_loading = false;
            if state.token.is_none() {
                state.token = tokens.first().cloned();
            }
            if state.currency.is_none() {
                state.currency = currencies.first().cloned();
            }
            state.tokens = tokens;
            state.currencies = currencies;
        }
        A::BankAccountsLoaded(accounts) => state.bank_accounts = accounts,
        A::Update(patch) => {
            if state.step != WithdrawalStep::TokenSelection || state.is_loading {
                return state;
            }
            if let Err(err) = apply_patch(&mut state, patch) {
                state.error = Some(err);
                return derive(state);
            }
            if state.error.as_ref().is_some_and(FlowError::is_validation) {
                state.error = None;
            }
        }
        A::Begin => {
            if state.is_loading {
                return state;
            }
            state.is_loading = true;
            state.error = None;
        }
        A::Cancelled => state.is_loading = false,
        A::Failed(error) => {
            state.is_loading = false;
            state.error = Some(error);
        }
        A::Rejected(error) => state.error = Some(error),
        A::ClearError => state.error = None,
        A::AddressReady(address) => {
            state.is_loading = false;
            if state.step == WithdrawalStep::TokenSelection {
                state.step = WithdrawalStep::QrSend;
                state.wallet_address = Some(address.wallet_address);
                state.qr_code_url = Some(address.qr_code_url);
                state.transaction_id = Some(address.transaction_id);
                state.expires_at = Some(address.expires_at);
                state.estimated_processing_time = Some(address.estimated_processing_time);
                state.status = Some(WithdrawalStatus::Pending);
                state.error = None;
            }
        }
        A::Resumed => {
            if state.step == WithdrawalStep::QrSend && state.wallet_address.is_some() {
                state.status = Some(WithdrawalStatus::Pending);
                state.error = None;
            }
        }
        A::Settled {
            transaction_id,
            outcome,
        } => {
            let waiting = state.step == WithdrawalStep::QrSend
                && state.status == Some(WithdrawalStatus::Pending)
                && state.transaction_id.as_deref() == Some(transaction_id.as_str());
            if !waiting {
                return state;
            }
            match outcome {
                Settlement::Completed { fiat_amount } => {
                    state.step = WithdrawalStep::Success;
                    state.status = Some(WithdrawalStatus::Completed);
                    state.fiat_amount = Some(fiat_amount);
                    state.error = None;
                }
                Settlement::Failed { reason } => {
                    state.status = Some(WithdrawalStatus::Failed);
                    state.error = Some(FlowError::VerificationFailed { reason });
                }
            }
        }
        A::Back => match state.step {
            WithdrawalStep::QrSend if !state.is_loading => {
                state.step = WithdrawalStep::TokenSelection;
                state.wallet_address = None;
                state.qr_code_url = None;
                state.transaction_id = None;
                state.expires_at = None;
                state.estimated_processing_time = None;
                state.status = None;
                state.error = None;
            }
            WithdrawalStep::Success => {
                state.step = WithdrawalStep::QrSend;
                state.status = Some(WithdrawalStatus::Pending);
                state.fiat_amount = None;
            }
            _ => return state,
        },
        A::Reset => state = WithdrawalState::default(),
    }

    derive(state)
}

fn apply_patch(state: &mut WithdrawalState, patch: WithdrawalPatch) -> Result<(), FlowError> {
    if let Some(id) = patch.token_id {
        let token = state
            .find_token(&id)
            .ok_or_else(|| FlowError::validation(TOKEN_FIELD, format!("Unknown token {id}")))?;
        state.token = Some(token);
    }
    if let Some(code) = patch.currency {
        let currency = state.find_currency(&code).ok_or_else(|| {
            FlowError::validation(CURRENCY_FIELD, format!("Unsupported currency {code}"))
        })?;
        state.currency = Some(currency);
    }
    if let Some(id) = patch.bank_account_id {
        let account = state
            .bank_accounts
            .iter()
            .find(|account| account.id == id)
            .cloned()
            .ok_or_else(|| {
                FlowError::validation(BANK_ACCOUNT_FIELD, format!("Unknown bank account {id}"))
            })?;
        state.bank_account = Some(account);
    }
    if let Some(amount) = patch.token_amount {
        state.token_amount = amount;
    }
    Ok(())
}

/// First fetched account once token and currency are chosen; never again
/// after that, so a later manual choice survives list refreshes.
fn auto_fill_bank_account(state: &mut WithdrawalState) {
    if state.bank_account_auto_filled
        || state.bank_account.is_some()
        || state.token.is_none()
        || state.currency.is_none()
    {
        return;
    }
    if let Some(first) = state.bank_accounts.first() {
        state.bank_account = Some(first.clone());
        state.bank_account_auto_filled = true;
    }
}

fn derive(mut state: WithdrawalState) -> WithdrawalState {
    if state.step == WithdrawalStep::TokenSelection {
        auto_fill_bank_account(&mut state);
    }
    state.token_amount_value = state
        .token
        .as_ref()
        .and_then(|token| validate_token_amount(&state.token_amount, token).ok())
        .flatten();
    state.progress = state.step.progress();
    state.can_go_back = !state.is_loading;
    state.can_proceed = !state.is_loading
        && match state.step {
            WithdrawalStep::TokenSelection => state.validate_selection().is_ok(),
            WithdrawalStep::QrSend => {
                state.wallet_address.is_some() && state.status == Some(WithdrawalStatus::Pending)
            }
            WithdrawalStep::Success => true,
        };
    state
}
