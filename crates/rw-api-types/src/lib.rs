use serde::{Deserialize, Serialize};

pub mod catalog;

pub use catalog::{BankAccount, Currency, Token};

// ── Errors ──

/// Machine-readable error code carried by every failed API call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MinAmountError,
    MaxAmountError,
    QuoteServiceError,
    BankServiceError,
    VerificationServiceError,
    StatusCheckError,
    WalletServiceError,
    StatusServiceError,
    BankAccountsError,
    NetworkError,
    RequestCancelled,
    UnexpectedError,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Service,
    Network,
    Cancelled,
    Unexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MinAmountError => "MIN_AMOUNT_ERROR",
            ErrorCode::MaxAmountError => "MAX_AMOUNT_ERROR",
            ErrorCode::QuoteServiceError => "QUOTE_SERVICE_ERROR",
            ErrorCode::BankServiceError => "BANK_SERVICE_ERROR",
            ErrorCode::VerificationServiceError => "VERIFICATION_SERVICE_ERROR",
            ErrorCode::StatusCheckError => "STATUS_CHECK_ERROR",
            ErrorCode::WalletServiceError => "WALLET_SERVICE_ERROR",
            ErrorCode::StatusServiceError => "STATUS_SERVICE_ERROR",
            ErrorCode::BankAccountsError => "BANK_ACCOUNTS_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::RequestCancelled => "REQUEST_CANCELLED",
            ErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::MinAmountError | ErrorCode::MaxAmountError => ErrorKind::Validation,
            ErrorCode::NetworkError => ErrorKind::Network,
            ErrorCode::RequestCancelled => ErrorKind::Cancelled,
            ErrorCode::UnexpectedError => ErrorKind::Unexpected,
            _ => ErrorKind::Service,
        }
    }

    /// HTTP-like status associated with the code. Zero means no response was received.
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Service => 503,
            ErrorKind::Unexpected => 500,
            ErrorKind::Network | ErrorKind::Cancelled => 0,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

// ── Deposit (fiat -> crypto) ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
    pub transaction_fee: f64,
    pub network_fee: f64,
    pub total_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepositQuoteRequest {
    pub amount: f64,
    pub from_currency: String,
    pub to_currency: String,
    pub token_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepositQuote {
    pub rate: f64,
    pub estimated_amount: f64,
    pub fees: Fees,
    /// Epoch milliseconds.
    pub expires_at: u128,
    pub quote_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BankDetailsRequest {
    pub amount: f64,
    pub currency: String,
    pub token_id: String,
    pub quote_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub bank_name: String,
    pub beneficiary_name: String,
    pub iban: String,
    pub bank_address: String,
    pub bank_country: String,
    pub wallet_address: String,
    pub reference: String,
    pub expires_at: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitiateVerificationRequest {
    pub transaction_id: String,
    pub amount: f64,
    pub currency: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitiateVerificationResponse {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Success,
    Failed,
}

impl VerificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerificationStatus::Success | VerificationStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatusResponse {
    pub transaction_id: String,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

// ── Withdrawal (crypto -> fiat) ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalQuoteRequest {
    pub token_amount: f64,
    pub from_token: String,
    pub to_currency: String,
    pub token_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalQuote {
    pub rate: f64,
    /// Fiat amount net of fees.
    pub estimated_amount: f64,
    pub fees: Fees,
    pub expires_at: u128,
    pub quote_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddressRequest {
    pub token_id: String,
    pub currency: String,
    pub amount: f64,
    pub quote_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_account_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddressResponse {
    pub wallet_address: String,
    pub qr_code_url: String,
    pub expires_at: u128,
    pub transaction_id: String,
    pub estimated_processing_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStatusRequest {
    pub transaction_id: String,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Received,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStatusResponse {
    pub transaction_id: String,
    pub status: WithdrawalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_token_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion_time: Option<u128>,
}

// ── Login ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpChallengeResponse {
    pub challenge: String,
    pub email: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub challenge: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyResponse {
    pub verified: bool,
    pub email: String,
    pub verified_at_epoch_ms: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub active: bool,
    pub email: Option<String>,
    pub started_at_epoch_ms: Option<u128>,
}
