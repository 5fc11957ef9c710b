use async_trait::async_trait;
use rw_api_types::{
    BankAccount, BankDetails, BankDetailsRequest, Currency, DepositQuote, DepositQuoteRequest,
    ErrorBody, InitiateVerificationRequest, InitiateVerificationResponse, Token,
    VerificationStatusResponse, WalletAddressRequest, WalletAddressResponse, WithdrawalQuote,
    WithdrawalQuoteRequest, WithdrawalStatusRequest, WithdrawalStatusResponse,
};
use std::sync::Arc;

pub use rw_api_types::{ErrorCode, ErrorKind};

/// Categorized failure of a backend operation.
///
/// The code is assigned where the failure originates; retry decisions and
/// user-facing rendering are derived from it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status: code.status(),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnexpectedError, message)
    }

    pub fn cancelled(resource: &str) -> Self {
        Self::new(
            ErrorCode::RequestCancelled,
            format!("{resource} request was superseded or cleared"),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Service and transport failures may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Service | ErrorKind::Network)
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code,
            message: self.message.clone(),
        }
    }
}

impl From<ErrorBody> for ApiError {
    fn from(body: ErrorBody) -> Self {
        Self::new(body.code, body.message)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
pub trait DepositApi: Send + Sync {
    async fn get_quote(&self, req: DepositQuoteRequest) -> ApiResult<DepositQuote>;
    async fn get_bank_details(&self, req: BankDetailsRequest) -> ApiResult<BankDetails>;
    async fn initiate_verification(
        &self,
        req: InitiateVerificationRequest,
    ) -> ApiResult<InitiateVerificationResponse>;
    async fn check_verification_status(
        &self,
        transaction_id: &str,
    ) -> ApiResult<VerificationStatusResponse>;
}

#[async_trait]
pub trait WithdrawalApi: Send + Sync {
    async fn get_quote(&self, req: WithdrawalQuoteRequest) -> ApiResult<WithdrawalQuote>;
    async fn generate_wallet_address(
        &self,
        req: WalletAddressRequest,
    ) -> ApiResult<WalletAddressResponse>;
    async fn check_withdrawal_status(
        &self,
        req: WithdrawalStatusRequest,
    ) -> ApiResult<WithdrawalStatusResponse>;
    async fn get_bank_accounts(&self) -> ApiResult<Vec<BankAccount>>;
    async fn get_available_tokens(&self) -> ApiResult<Vec<Token>>;
    async fn get_available_currencies(&self) -> ApiResult<Vec<Currency>>;
}

/// Both client families, shared by every flow created from it.
#[derive(Clone)]
pub struct ApiClients {
    pub deposit: Arc<dyn DepositApi>,
    pub withdrawal: Arc<dyn WithdrawalApi>,
}

impl ApiClients {
    pub fn new(deposit: Arc<dyn DepositApi>, withdrawal: Arc<dyn WithdrawalApi>) -> Self {
        Self { deposit, withdrawal }
    }
}
