#![allow(dead_code)]

use async_trait::async_trait;
use rw_api_client::{ApiError, ApiResult, DepositApi, ErrorCode, WithdrawalApi};
use rw_api_types::{
    BankAccount, BankDetails, BankDetailsRequest, Currency, DepositQuote, DepositQuoteRequest,
    Fees, InitiateVerificationRequest, InitiateVerificationResponse, Token, VerificationStatus,
    VerificationStatusResponse, WalletAddressRequest, WalletAddressResponse, WithdrawalQuote,
    WithdrawalQuoteRequest, WithdrawalStatus, WithdrawalStatusRequest, WithdrawalStatusResponse,
    catalog,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;

pub const LATENCY: Duration = Duration::from_millis(100);

fn fees() -> Fees {
    Fees {
        transaction_fee: 0.5,
        network_fee: 1.5,
        total_fee: 2.0,
    }
}

#[derive(Default)]
pub struct Calls(AtomicU32);

impl Calls {
    fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deposit backend with scripted failures and verification statuses.
#[derive(Default)]
pub struct FakeDepositApi {
    pub quote_calls: Calls,
    pub bank_calls: Calls,
    pub initiate_calls: Calls,
    pub status_calls: Calls,
    pub quote_requests: Mutex<Vec<DepositQuoteRequest>>,
    pub initiated: Mutex<Vec<InitiateVerificationRequest>>,
    bank_failures: Mutex<VecDeque<ApiError>>,
    statuses: Mutex<VecDeque<VerificationStatus>>,
}

impl FakeDepositApi {
    pub fn fail_bank_details(&self, times: usize) {
        let mut failures = self.bank_failures.lock().unwrap();
        for _ in 0..times {
            failures.push_back(ApiError::new(
                ErrorCode::BankServiceError,
                "Bank service is temporarily unavailable",
            ));
        }
    }

    /// Statuses returned by successive checks; `pending` once exhausted.
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = VerificationStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }
}

#[async_trait]
impl DepositApi for FakeDepositApi {
    async fn get_quote(&self, req: DepositQuoteRequest) -> ApiResult<DepositQuote> {
        let n = self.quote_calls.hit();
        self.quote_requests.lock().unwrap().push(req.clone());
        sleep(LATENCY).await;
        if req.amount < 10.0 {
            return Err(ApiError::new(
                ErrorCode::MinAmountError,
                "Minimum deposit amount is 10 EUR",
            ));
        }
        Ok(DepositQuote {
            rate: 0.0003,
            estimated_amount: (req.amount - 2.0) * 0.0003,
            fees: fees(),
            expires_at: 0,
            quote_id: format!("q_{n}"),
        })
    }

    async fn get_bank_details(&self, req: BankDetailsRequest) -> ApiResult<BankDetails> {
        self.bank_calls.hit();
        sleep(LATENCY).await;
        if let Some(err) = self.bank_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(BankDetails {
            bank_name: "Simbank AG".to_owned(),
            beneficiary_name: "RampWallet Ltd".to_owned(),
            iban: "DE00123456789012345678".to_owned(),
            bank_address: "Friedrichstraße 120, Berlin".to_owned(),
            bank_country: "Germany".to_owned(),
            wallet_address: "0x0000000000000000000000000000000000000001".to_owned(),
            reference: format!("RW-{}", req.quote_id.to_ascii_uppercase()),
            expires_at: 0,
        })
    }

    async fn initiate_verification(
        &self,
        req: InitiateVerificationRequest,
    ) -> ApiResult<InitiateVerificationResponse> {
        self.initiate_calls.hit();
        self.initiated.lock().unwrap().push(req.clone());
        sleep(LATENCY).await;
        Ok(InitiateVerificationResponse {
            transaction_id: req.transaction_id,
        })
    }

    async fn check_verification_status(
        &self,
        transaction_id: &str,
    ) -> ApiResult<VerificationStatusResponse> {
        self.status_calls.hit();
        sleep(LATENCY).await;
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(VerificationStatus::Pending);
        Ok(VerificationStatusResponse {
            transaction_id: transaction_id.to_owned(),
            status,
            received_amount: (status == VerificationStatus::Success).then_some(25.0),
            token_amount: (status == VerificationStatus::Success).then_some(0.0069),
            completed_at: None,
            failure_reason: (status == VerificationStatus::Failed)
                .then(|| "Payment reference did not match".to_owned()),
        })
    }
}

/// Withdrawal backend with scripted failures and statuses.
pub struct FakeWithdrawalApi {
    pub quote_calls: Calls,
    pub wallet_calls: Calls,
    pub status_calls: Calls,
    pub account_calls: Calls,
    pub wallet_requests: Mutex<Vec<WalletAddressRequest>>,
    accounts: Mutex<Vec<BankAccount>>,
    wallet_failures: Mutex<VecDeque<ApiError>>,
    statuses: Mutex<VecDeque<WithdrawalStatus>>,
}

pub fn account(id: &str, currency: &str) -> BankAccount {
    BankAccount {
        id: id.to_owned(),
        bank_name: "Simbank AG".to_owned(),
        account_holder: "Alex Doe".to_owned(),
        iban: "DE89 •••• •••• 3000".to_owned(),
        currency: currency.to_owned(),
        is_default: false,
    }
}

impl Default for FakeWithdrawalApi {
    fn default() -> Self {
        Self {
            quote_calls: Calls::default(),
            wallet_calls: Calls::default(),
            status_calls: Calls::default(),
            account_calls: Calls::default(),
            wallet_requests: Mutex::new(Vec::new()),
            accounts: Mutex::new(vec![account("ba_primary", "EUR"), account("ba_savings", "EUR")]),
            wallet_failures: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
        }
    }
}

impl FakeWithdrawalApi {
    pub fn set_accounts(&self, accounts: Vec<BankAccount>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn fail_wallet_address(&self, times: usize) {
        let mut failures = self.wallet_failures.lock().unwrap();
        for _ in 0..times {
            failures.push_back(ApiError::new(
                ErrorCode::WalletServiceError,
                "Wallet service is temporarily unavailable",
            ));
        }
    }

    /// Statuses returned by successive checks; `pending` once exhausted.
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = WithdrawalStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    pub fn last_wallet_request(&self) -> Option<WalletAddressRequest> {
        self.wallet_requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl WithdrawalApi for FakeWithdrawalApi {
    async fn get_quote(&self, req: WithdrawalQuoteRequest) -> ApiResult<WithdrawalQuote> {
        let n = self.quote_calls.hit();
        sleep(LATENCY).await;
        Ok(WithdrawalQuote {
            rate: 3146.4,
            estimated_amount: req.token_amount * 3146.4 - 2.0,
            fees: fees(),
            expires_at: 0,
            quote_id: format!("wq_{n}"),
        })
    }

    async fn generate_wallet_address(
        &self,
        req: WalletAddressRequest,
    ) -> ApiResult<WalletAddressResponse> {
        let n = self.wallet_calls.hit();
        self.wallet_requests.lock().unwrap().push(req);
        sleep(LATENCY).await;
        if let Some(err) = self.wallet_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let wallet_address = format!("0x{n:040x}");
        Ok(WalletAddressResponse {
            qr_code_url: format!("https://qr.test/{wallet_address}"),
            wallet_address,
            expires_at: 0,
            transaction_id: format!("wd_{n}"),
            estimated_processing_time: "5-15 minutes".to_owned(),
        })
    }

    async fn check_withdrawal_status(
        &self,
        req: WithdrawalStatusRequest,
    ) -> ApiResult<WithdrawalStatusResponse> {
        self.status_calls.hit();
        sleep(LATENCY).await;
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(WithdrawalStatus::Pending);
        Ok(WithdrawalStatusResponse {
            transaction_id: req.transaction_id,
            status,
            received_token_amount: None,
            fiat_amount: (status == WithdrawalStatus::Completed).then_some(312.5),
            completed_at: None,
            failure_reason: (status == WithdrawalStatus::Failed)
                .then(|| "Payout rejected by bank".to_owned()),
            estimated_completion_time: None,
        })
    }

    async fn get_bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        self.account_calls.hit();
        sleep(LATENCY).await;
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn get_available_tokens(&self) -> ApiResult<Vec<Token>> {
        Ok(catalog::tokens())
    }

    async fn get_available_currencies(&self) -> ApiResult<Vec<Currency>> {
        Ok(catalog::currencies())
    }
}
