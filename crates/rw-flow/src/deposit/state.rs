use rw_api_types::catalog::{DEFAULT_CURRENCY_CODE, DEFAULT_TOKEN_ID};
use rw_api_types::{BankDetails, DepositQuote, VerificationStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::FlowError;
use crate::store::FlowModel;
use crate::validation::validate_deposit_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DepositStep {
    Amount,
    BankDetails,
    Verification,
    Success,
}

impl DepositStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::BankDetails => "bank-details",
            Self::Verification => "verification",
            Self::Success => "success",
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            Self::Amount => 25,
            Self::BankDetails => 50,
            Self::Verification => 75,
            Self::Success => 100,
        }
    }
}

impl fmt::Display for DepositStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deposit amount bounds carried on the state so the reducer stays pure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountLimits {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositState {
    pub step: DepositStep,
    pub amount: String,
    /// Parsed `amount`, set only while it is within limits.
    pub amount_value: Option<f64>,
    pub currency: String,
    pub token: String,
    pub quote: Option<DepositQuote>,
    pub bank_details: Option<BankDetails>,
    pub transaction_id: Option<String>,
    pub verification_status: Option<VerificationStatus>,
    pub received_amount: Option<f64>,
    pub token_amount: Option<f64>,
    pub is_loading: bool,
    pub error: Option<FlowError>,
    pub can_go_back: bool,
    pub can_proceed: bool,
    pub progress: u8,
    #[serde(skip)]
    pub(crate) limits: AmountLimits,
}

impl DepositState {
    pub(crate) fn new(limits: AmountLimits) -> Self {
        derive(Self {
            step: DepositStep::Amount,
            amount: String::new(),
            amount_value: None,
            currency: DEFAULT_CURRENCY_CODE.to_owned(),
            token: DEFAULT_TOKEN_ID.to_owned(),
            quote: None,
            bank_details: None,
            transaction_id: None,
            verification_status: None,
            received_amount: None,
            token_amount: None,
            is_loading: false,
            error: None,
            can_go_back: false,
            can_proceed: false,
            progress: 0,
            limits,
        })
    }

    pub fn validate_amount(&self) -> Result<f64, FlowError> {
        validate_deposit_amount(&self.amount, self.limits.min, self.limits.max, &self.currency)
    }
}

/// Caller edits; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositPatch {
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub token: Option<String>,
}

impl DepositPatch {
    pub fn amount(value: impl Into<String>) -> Self {
        Self {
            amount: Some(value.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Settlement {
    Confirmed {
        received_amount: Option<f64>,
        token_amount: Option<f64>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum DepositAction {
    Update(DepositPatch),
    /// Marks an operation in flight; no-op while another one runs.
    Begin,
    Cancelled,
    Failed(FlowError),
    Rejected(FlowError),
    ClearError,
    QuoteReady(DepositQuote),
    BankDetailsReady {
        quote: Option<DepositQuote>,
        details: BankDetails,
    },
    VerificationStarted {
        transaction_id: String,
    },
    Settled {
        transaction_id: String,
        outcome: Settlement,
    },
    Back,
    Reset,
}

pub(crate) struct DepositModel;

impl FlowModel for DepositModel {
    type State = DepositState;
    type Action = DepositAction;
    type Step = DepositStep;

    const FLOW: &'static str = "deposit";

    fn step(state: &DepositState) -> DepositStep {
        state.step
    }

    fn reduce(state: DepositState, action: DepositAction) -> DepositState {
        reduce(state, action)
    }
}

pub(crate) fn reduce(mut state: DepositState, action: DepositAction) -> DepositState {
    use DepositAction as A;

    match action {
        A::Update(patch) => {
            if state.step != DepositStep::Amount || state.is_loading {
                return state;
            }
            if let Some(amount) = patch.amount {
                state.amount = amount;
            }
            if let Some(currency) = patch.currency {
                state.currency = currency.to_ascii_uppercase();
            }
            if let Some(token) = patch.token {
                state.token = token.to_ascii_lowercase();
            }
            state.quote = None;
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
        A::QuoteReady(quote) => {
            state.is_loading = false;
            if state.step == DepositStep::Amount {
                state.quote = Some(quote);
            }
        }
        A::BankDetailsReady { quote, details } => {
            state.is_loading = false;
            match state.step {
                DepositStep::Amount => {
                    if quote.is_some() {
                        state.quote = quote;
                    }
                    state.bank_details = Some(details);
                    state.step = DepositStep::BankDetails;
                }
                DepositStep::BankDetails => state.bank_details = Some(details),
                _ => {}
            }
        }
        A::VerificationStarted { transaction_id } => {
            state.is_loading = false;
            if matches!(state.step, DepositStep::BankDetails | DepositStep::Verification) {
                state.step = DepositStep::Verification;
                state.transaction_id = Some(transaction_id);
                state.verification_status = Some(VerificationStatus::Pending);
                state.error = None;
            }
        }
        A::Settled {
            transaction_id,
            outcome,
        } => {
            let waiting = state.step == DepositStep::Verification
                && state.verification_status == Some(VerificationStatus::Pending)
                && state.transaction_id.as_deref() == Some(transaction_id.as_str());
            if !waiting {
                return state;
            }
            match outcome {
                Settlement::Confirmed {
                    received_amount,
                    token_amount,
                } => {
                    state.step = DepositStep::Success;
                    state.verification_status = Some(VerificationStatus::Success);
                    state.received_amount = received_amount.or(state.amount_value);
                    state.token_amount = token_amount
                        .or_else(|| state.quote.as_ref().map(|quote| quote.estimated_amount));
                    state.error = None;
                }
                Settlement::Failed { reason } => {
                    state.verification_status = Some(VerificationStatus::Failed);
                    state.error = Some(FlowError::VerificationFailed { reason });
                }
            }
        }
        A::Back => match state.step {
            DepositStep::BankDetails if !state.is_loading => {
                state.step = DepositStep::Amount;
                state.bank_details = None;
                state.error = None;
            }
            DepositStep::Success => {
                let (amount, currency, token) = (
                    std::mem::take(&mut state.amount),
                    std::mem::take(&mut state.currency),
                    std::mem::take(&mut state.token),
                );
                state = DepositState {
                    amount,
                    currency,
                    token,
                    ..DepositState::new(state.limits)
                };
            }
            _ => return state,
        },
        A::Reset => state = DepositState::new(state.limits),
    }

    derive(state)
}

/// Recomputes every derived field from `step` and the inputs.
fn derive(mut state: DepositState) -> DepositState {
    state.amount_value = state.validate_amount().ok();
    state.progress = state.step.progress();
    state.can_go_back = !state.is_loading
        && matches!(state.step, DepositStep::BankDetails | DepositStep::Success);
    state.can_proceed = !state.is_loading
        && match state.step {
            DepositStep::Amount => state.amount_value.is_some(),
            DepositStep::BankDetails => state.bank_details.is_some(),
            DepositStep::Verification => false,
            DepositStep::Success => true,
        };
    state
}
