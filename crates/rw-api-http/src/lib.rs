use async_trait::async_trait;
use rw_api_client::{ApiClients, ApiError, ApiResult, DepositApi, WithdrawalApi};
use rw_api_types::{
    BankAccount, BankDetails, BankDetailsRequest, Currency, DepositQuote, DepositQuoteRequest,
    ErrorBody, InitiateVerificationRequest, InitiateVerificationResponse, Token,
    VerificationStatusResponse, WalletAddressRequest, WalletAddressResponse, WithdrawalQuote,
    WithdrawalQuoteRequest, WithdrawalStatusRequest, WithdrawalStatusResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Location of the mock backend.
///
/// Reads `RW_API_URL` when no endpoint is given (default: `http://localhost:8080`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpApiConfig {
    pub endpoint: String,
}

impl Default for HttpApiConfig {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpApiConfig {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("RW_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

/// Both client families over one shared connection pool.
pub fn http_clients(config: HttpApiConfig) -> ApiClients {
    let transport = Transport::new(config);
    ApiClients::new(
        Arc::new(HttpDepositApi {
            transport: transport.clone(),
        }),
        Arc::new(HttpWithdrawalApi { transport }),
    )
}

#[derive(Clone)]
struct Transport {
    endpoint: String,
    http: reqwest::Client,
}

impl Transport {
    fn new(config: HttpApiConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            http: reqwest::Client::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = format!("{}{path}", self.endpoint);
        let response = self.http.get(&url).send().await.map_err(|err| {
            warn!(url = %url, error = %err, "backend unreachable");
            ApiError::network(format!("GET {path} failed: {err}"))
        })?;
        decode(path, response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let url = format!("{}{path}", self.endpoint);
        let response = self.http.post(&url).json(body).send().await.map_err(|err| {
            warn!(url = %url, error = %err, "backend unreachable");
            ApiError::network(format!("POST {path} failed: {err}"))
        })?;
        decode(path, response).await
    }
}

/// Successful bodies decode into `T`; error bodies carry the backend's code.
async fn decode<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| ApiError::network(format!("{path} body read failed: {err}")))?;

    if status.is_success() {
        return serde_json::from_str(&text)
            .map_err(|err| ApiError::unexpected(format!("{path} returned malformed body: {err}")));
    }
    if let Ok(body) = serde_json::from_str::<ErrorBody>(&text) {
        return Err(ApiError::from(body));
    }
    if status.is_server_error() {
        Err(ApiError::network(format!("{path} HTTP {status}: {text}")))
    } else {
        Err(ApiError::unexpected(format!("{path} HTTP {status}: {text}")))
    }
}

pub struct HttpDepositApi {
    transport: Transport,
}

impl HttpDepositApi {
    pub fn new(config: HttpApiConfig) -> Self {
        Self {
            transport: Transport::new(config),
        }
    }
}

#[async_trait]
impl DepositApi for HttpDepositApi {
    async fn get_quote(&self, req: DepositQuoteRequest) -> ApiResult<DepositQuote> {
        self.transport.post("/deposit/quote", &req).await
    }

    async fn get_bank_details(&self, req: BankDetailsRequest) -> ApiResult<BankDetails> {
        self.transport.post("/deposit/bank-details", &req).await
    }

    async fn initiate_verification(
        &self,
        req: InitiateVerificationRequest,
    ) -> ApiResult<InitiateVerificationResponse> {
        self.transport.post("/deposit/verification", &req).await
    }

    async fn check_verification_status(
        &self,
        transaction_id: &str,
    ) -> ApiResult<VerificationStatusResponse> {
        self.transport
            .get(&format!("/deposit/verification/{transaction_id}"))
            .await
    }
}

pub struct HttpWithdrawalApi {
    transport: Transport,
}

impl HttpWithdrawalApi {
    pub fn new(config: HttpApiConfig) -> Self {
        Self {
            transport: Transport::new(config),
        }
    }
}

#[async_trait]
impl WithdrawalApi for HttpWithdrawalApi {
    async fn get_quote(&self, req: WithdrawalQuoteRequest) -> ApiResult<WithdrawalQuote> {
        self.transport.post("/withdrawal/quote", &req).await
    }

    async fn generate_wallet_address(
        &self,
        req: WalletAddressRequest,
    ) -> ApiResult<WalletAddressResponse> {
        self.transport.post("/withdrawal/wallet-address", &req).await
    }

    async fn check_withdrawal_status(
        &self,
        req: WithdrawalStatusRequest,
    ) -> ApiResult<WithdrawalStatusResponse> {
        self.transport.post("/withdrawal/status", &req).await
    }

    async fn get_bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        self.transport.get("/withdrawal/bank-accounts").await
    }

    async fn get_available_tokens(&self) -> ApiResult<Vec<Token>> {
        self.transport.get("/catalog/tokens").await
    }

    async fn get_available_currencies(&self) -> ApiResult<Vec<Currency>> {
        self.transport.get("/catalog/currencies").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_api_client::ErrorCode;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let config = HttpApiConfig::new(Some("http://127.0.0.1:9000/".to_owned()));
        assert_eq!(config.endpoint, "http://127.0.0.1:9000");
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let api = HttpDepositApi::new(HttpApiConfig::new(Some("http://127.0.0.1:1".to_owned())));
        let err = api
            .check_verification_status("dep_1")
            .await
            .expect_err("nothing listens on port 1");
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.is_retryable());
    }
}
