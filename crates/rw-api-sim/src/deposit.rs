use async_trait::async_trait;
use rand::Rng;
use rw_api_client::{ApiError, ApiResult, DepositApi, ErrorCode};
use rw_api_types::catalog;
use rw_api_types::{
    BankDetails, BankDetailsRequest, DepositQuote, DepositQuoteRequest, Fees,
    InitiateVerificationRequest, InitiateVerificationResponse, VerificationStatus,
    VerificationStatusResponse,
};

use crate::rates::{DEPOSIT_FEE_RATE, DEPOSIT_NETWORK_FEE, fiat_price};
use crate::{SimConfig, Simulator, epoch_ms, new_id, round_to, wallet_address_for};

pub const DEPOSIT_MIN_AMOUNT: f64 = 10.0;
pub const DEPOSIT_MAX_AMOUNT: f64 = 10_000.0;

const QUOTE_TTL_MS: u128 = 5 * 60 * 1000;
const BANK_DETAILS_TTL_MS: u128 = 30 * 60 * 1000;

const BANKS: [(&str, &str, &str); 3] = [
    ("Banco Simulado", "Calle de Alcalá 45, 28014 Madrid", "Spain"),
    ("Simbank AG", "Friedrichstraße 120, 10117 Berlin", "Germany"),
    ("Mockingbird Bank", "1 Canada Square, London E14 5AB", "United Kingdom"),
];

const FAILURE_REASONS: [&str; 3] = [
    "Payment reference did not match",
    "Received amount is below the quoted amount",
    "Sender name does not match the account holder",
];

/// Fiat-to-crypto backend stand-in.
pub struct SimulatedDepositApi {
    sim: Simulator,
}

impl Default for SimulatedDepositApi {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimulatedDepositApi {
    pub fn new(config: SimConfig) -> Self {
        Self {
            sim: Simulator::new(config),
        }
    }

    fn random_iban(&self, country_code: &str) -> String {
        let check = self.sim.random_digits(2);
        let bban = self.sim.random_digits(18);
        format!("{country_code}{check}{bban}")
    }

    fn random_reference(&self) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        format!("RW-{}", &id[..8])
    }
}

fn check_deposit_amount(amount: f64, currency: &str) -> ApiResult<()> {
    if !amount.is_finite() || amount < DEPOSIT_MIN_AMOUNT {
        return Err(ApiError::new(
            ErrorCode::MinAmountError,
            format!("Minimum deposit amount is {DEPOSIT_MIN_AMOUNT} {currency}"),
        ));
    }
    if amount > DEPOSIT_MAX_AMOUNT {
        return Err(ApiError::new(
            ErrorCode::MaxAmountError,
            format!("Maximum deposit amount is {DEPOSIT_MAX_AMOUNT} {currency}"),
        ));
    }
    Ok(())
}

#[async_trait]
impl DepositApi for SimulatedDepositApi {
    async fn get_quote(&self, req: DepositQuoteRequest) -> ApiResult<DepositQuote> {
        let config = &self.sim.config;
        self.sim.latency(&config.deposit_quote).await;
        check_deposit_amount(req.amount, &req.from_currency)?;
        self.sim.roll_failure(
            "deposit.get_quote",
            &config.deposit_quote,
            ErrorCode::QuoteServiceError,
            "Quote service is temporarily unavailable",
        )?;

        let price = fiat_price(&req.to_currency, &req.from_currency).ok_or_else(|| {
            ApiError::unexpected(format!(
                "unsupported pair {}/{}",
                req.from_currency, req.to_currency
            ))
        })?;

        let rate = 1.0 / price;
        let transaction_fee = round_to(req.amount * DEPOSIT_FEE_RATE, 2);
        let network_fee = DEPOSIT_NETWORK_FEE;
        let total_fee = round_to(transaction_fee + network_fee, 2);
        let estimated_amount = round_to(((req.amount - total_fee).max(0.0)) * rate, 8);

        Ok(DepositQuote {
            rate: round_to(rate, 10),
            estimated_amount,
            fees: Fees {
                transaction_fee,
                network_fee,
                total_fee,
            },
            expires_at: epoch_ms() + QUOTE_TTL_MS,
            quote_id: new_id("dq"),
        })
    }

    async fn get_bank_details(&self, req: BankDetailsRequest) -> ApiResult<BankDetails> {
        let config = &self.sim.config;
        self.sim
            .call(
                "deposit.get_bank_details",
                &config.bank_details,
                ErrorCode::BankServiceError,
                "Bank details service is temporarily unavailable",
            )
            .await?;

        let (bank_name, bank_address, bank_country) =
            BANKS[self.sim.with_rng(|rng| rng.gen_range(0..BANKS.len()))];
        let country_code = match bank_country {
            "Spain" => "ES",
            "Germany" => "DE",
            _ => "GB",
        };
        let network = catalog::token_by_id(&req.token_id)
            .map(|token| token.network)
            .unwrap_or_else(|| "Ethereum".to_owned());

        Ok(BankDetails {
            bank_name: bank_name.to_owned(),
            beneficiary_name: "RampWallet Payments Ltd".to_owned(),
            iban: self.random_iban(country_code),
            bank_address: bank_address.to_owned(),
            bank_country: bank_country.to_owned(),
            wallet_address: wallet_address_for(&network),
            reference: self.random_reference(),
            expires_at: epoch_ms() + BANK_DETAILS_TTL_MS,
        })
    }

    async fn initiate_verification(
        &self,
        req: InitiateVerificationRequest,
    ) -> ApiResult<InitiateVerificationResponse> {
        let config = &self.sim.config;
        self.sim
            .call(
                "deposit.initiate_verification",
                &config.initiate_verification,
                ErrorCode::VerificationServiceError,
                "Verification service is temporarily unavailable",
            )
            .await?;

        Ok(InitiateVerificationResponse {
            transaction_id: req.transaction_id,
        })
    }

    async fn check_verification_status(
        &self,
        transaction_id: &str,
    ) -> ApiResult<VerificationStatusResponse> {
        let config = &self.sim.config;
        self.sim
            .call(
                "deposit.check_verification_status",
                &config.verification_status,
                ErrorCode::StatusCheckError,
                "Unable to check payment status",
            )
            .await?;

        if self.sim.chance(config.verification_success_rate) {
            return Ok(VerificationStatusResponse {
                transaction_id: transaction_id.to_owned(),
                status: VerificationStatus::Success,
                received_amount: None,
                token_amount: None,
                completed_at: Some(epoch_ms()),
                failure_reason: None,
            });
        }

        let pick = self
            .sim
            .with_rng(|rng| rng.gen_range(0..FAILURE_REASONS.len()));
        let reason = FAILURE_REASONS[pick];
        Ok(VerificationStatusResponse {
            transaction_id: transaction_id.to_owned(),
            status: VerificationStatus::Failed,
            received_amount: None,
            token_amount: None,
            completed_at: None,
            failure_reason: Some(reason.to_owned()),
        })
    }
}
