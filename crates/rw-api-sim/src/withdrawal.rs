use async_trait::async_trait;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rw_api_client::{ApiError, ApiResult, ErrorCode, WithdrawalApi};
use rw_api_types::catalog::{self, BankAccount, Currency, Token};
use rw_api_types::{
    Fees, WalletAddressRequest, WalletAddressResponse, WithdrawalQuote, WithdrawalQuoteRequest,
    WithdrawalStatus, WithdrawalStatusRequest, WithdrawalStatusResponse,
};

use crate::rates::{WITHDRAWAL_FEE_RATE, WITHDRAWAL_NETWORK_FEE, fiat_price};
use crate::{SimConfig, Simulator, epoch_ms, new_id, round_to, wallet_address_for};

const QUOTE_TTL_MS: u128 = 5 * 60 * 1000;
const ADDRESS_TTL_MS: u128 = 30 * 60 * 1000;
const QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/?size=240x240&data=";

/// Crypto-to-fiat backend stand-in.
pub struct SimulatedWithdrawalApi {
    sim: Simulator,
}

impl Default for SimulatedWithdrawalApi {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl SimulatedWithdrawalApi {
    pub fn new(config: SimConfig) -> Self {
        Self {
            sim: Simulator::new(config),
        }
    }

    fn pick_status(&self) -> WithdrawalStatus {
        let weights = &self.sim.config.withdrawal_status_weights;
        let table = [
            (WithdrawalStatus::Pending, weights.pending),
            (WithdrawalStatus::Received, weights.received),
            (WithdrawalStatus::Processing, weights.processing),
            (WithdrawalStatus::Completed, weights.completed),
            (WithdrawalStatus::Failed, weights.failed),
        ];
        let Ok(distribution) = WeightedIndex::new(table.iter().map(|(_, weight)| *weight)) else {
            return WithdrawalStatus::Pending;
        };
        let index = self.sim.with_rng(|rng| distribution.sample(rng));
        table[index].0
    }
}

fn bank_accounts() -> Vec<BankAccount> {
    vec![
        BankAccount {
            id: "ba_primary".to_owned(),
            bank_name: "Simbank AG".to_owned(),
            account_holder: "Alex Morgan".to_owned(),
            iban: "DE89 •••• •••• 3000".to_owned(),
            currency: "EUR".to_owned(),
            is_default: true,
        },
        BankAccount {
            id: "ba_savings".to_owned(),
            bank_name: "Banco Simulado".to_owned(),
            account_holder: "Alex Morgan".to_owned(),
            iban: "ES91 •••• •••• 1332".to_owned(),
            currency: "EUR".to_owned(),
            is_default: false,
        },
        BankAccount {
            id: "ba_uk".to_owned(),
            bank_name: "Mockingbird Bank".to_owned(),
            account_holder: "Alex Morgan".to_owned(),
            iban: "GB29 •••• •••• 9268".to_owned(),
            currency: "GBP".to_owned(),
            is_default: false,
        },
    ]
}

fn check_token_amount(token: &Token, amount: f64) -> ApiResult<()> {
    if !amount.is_finite() || amount < token.min_amount {
        return Err(ApiError::new(
            ErrorCode::MinAmountError,
            format!("Minimum withdrawal amount is {} {}", token.min_amount, token.symbol),
        ));
    }
    if amount > token.max_amount {
        return Err(ApiError::new(
            ErrorCode::MaxAmountError,
            format!("Maximum withdrawal amount is {} {}", token.max_amount, token.symbol),
        ));
    }
    Ok(())
}

#[async_trait]
impl WithdrawalApi for SimulatedWithdrawalApi {
    async fn get_quote(&self, req: WithdrawalQuoteRequest) -> ApiResult<WithdrawalQuote> {
        let config = &self.sim.config;
        self.sim.latency(&config.withdrawal_quote).await;

        let token = catalog::token_by_id(&req.token_id)
            .or_else(|| catalog::token_by_symbol(&req.from_token))
            .ok_or_else(|| ApiError::unexpected(format!("unknown token {}", req.token_id)))?;
        check_token_amount(&token, req.token_amount)?;
        self.sim.roll_failure(
            "withdrawal.get_quote",
            &config.withdrawal_quote,
            ErrorCode::QuoteServiceError,
            "Quote service is temporarily unavailable",
        )?;

        let rate = fiat_price(&token.symbol, &req.to_currency).ok_or_else(|| {
            ApiError::unexpected(format!("unsupported pair {}/{}", token.symbol, req.to_currency))
        })?;
        let gross = req.token_amount * rate;
        let transaction_fee = round_to(gross * WITHDRAWAL_FEE_RATE, 2);
        let network_fee = WITHDRAWAL_NETWORK_FEE;
        let total_fee = round_to(transaction_fee + network_fee, 2);

        Ok(WithdrawalQuote {
            rate: round_to(rate, 2),
            estimated_amount: round_to((gross - total_fee).max(0.0), 2),
            fees: Fees {
                transaction_fee,
                network_fee,
                total_fee,
            },
            expires_at: epoch_ms() + QUOTE_TTL_MS,
            quote_id: new_id("wq"),
        })
    }

    async fn generate_wallet_address(
        &self,
        req: WalletAddressRequest,
    ) -> ApiResult<WalletAddressResponse> {
        let config = &self.sim.config;
        self.sim
            .call(
                "withdrawal.generate_wallet_address",
                &config.wallet_address,
                ErrorCode::WalletServiceError,
                "Wallet service is temporarily unavailable",
            )
            .await?;

        let network = catalog::token_by_id(&req.token_id)
            .map(|token| token.network)
            .unwrap_or_else(|| "Ethereum".to_owned());
        let wallet_address = wallet_address_for(&network);

        Ok(WalletAddressResponse {
            qr_code_url: format!("{QR_SERVICE_URL}{wallet_address}"),
            wallet_address,
            expires_at: epoch_ms() + ADDRESS_TTL_MS,
            transaction_id: new_id("wd"),
            estimated_processing_time: "5-15 minutes".to_owned(),
        })
    }

    async fn check_withdrawal_status(
        &self,
        req: WithdrawalStatusRequest,
    ) -> ApiResult<WithdrawalStatusResponse> {
        let config = &self.sim.config;
        self.sim
            .call(
                "withdrawal.check_withdrawal_status",
                &config.withdrawal_status,
                ErrorCode::StatusServiceError,
                "Unable to check withdrawal status",
            )
            .await?;

        let status = self.pick_status();
        let now = epoch_ms();
        let mut response = WithdrawalStatusResponse {
            transaction_id: req.transaction_id,
            status,
            received_token_amount: None,
            fiat_amount: None,
            completed_at: None,
            failure_reason: None,
            estimated_completion_time: None,
        };

        match status {
            WithdrawalStatus::Pending => {
                response.estimated_completion_time = Some(now + 15 * 60 * 1000);
            }
            WithdrawalStatus::Received | WithdrawalStatus::Processing => {
                response.received_token_amount =
                    Some(round_to(self.sim.with_rng(|rng| rng.gen_range(0.01..1.0)), 6));
                response.estimated_completion_time = Some(now + 5 * 60 * 1000);
            }
            WithdrawalStatus::Completed => {
                response.received_token_amount =
                    Some(round_to(self.sim.with_rng(|rng| rng.gen_range(0.01..1.0)), 6));
                response.fiat_amount =
                    Some(round_to(self.sim.with_rng(|rng| rng.gen_range(50.0..500.0)), 2));
                response.completed_at = Some(now);
            }
            WithdrawalStatus::Failed => {
                response.failure_reason =
                    Some("Payment was not received before the address expired".to_owned());
            }
        }

        Ok(response)
    }

    async fn get_bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        let config = &self.sim.config;
        self.sim
            .call(
                "withdrawal.get_bank_accounts",
                &config.bank_accounts,
                ErrorCode::BankAccountsError,
                "Unable to load bank accounts",
            )
            .await?;
        Ok(bank_accounts())
    }

    async fn get_available_tokens(&self) -> ApiResult<Vec<Token>> {
        self.sim.latency(&self.sim.config.catalog).await;
        Ok(catalog::tokens())
    }

    async fn get_available_currencies(&self) -> ApiResult<Vec<Currency>> {
        self.sim.latency(&self.sim.config.catalog).await;
        Ok(catalog::currencies())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpProfile, StatusWeights};

    fn quote_request(token_amount: f64) -> WithdrawalQuoteRequest {
        WithdrawalQuoteRequest {
            token_amount,
            from_token: "ETH".to_owned(),
            to_currency: "EUR".to_owned(),
            token_id: "eth".to_owned(),
        }
    }

    #[tokio::test]
    async fn quote_enforces_token_limits() {
        let api = SimulatedWithdrawalApi::new(SimConfig::instant());
        let err = api.get_quote(quote_request(0.001)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MinAmountError);
        let err = api.get_quote(quote_request(50.0)).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::MaxAmountError);
    }

    #[tokio::test]
    async fn quote_is_net_of_fees() {
        let api = SimulatedWithdrawalApi::new(SimConfig::instant());
        let quote = api.get_quote(quote_request(1.0)).await.unwrap();
        let gross = fiat_price("ETH", "EUR").unwrap();
        assert!(quote.estimated_amount < gross);
        assert!((quote.estimated_amount + quote.fees.total_fee - gross).abs() < 0.02);
    }

    #[tokio::test]
    async fn wallet_address_comes_with_qr_and_transaction() {
        let api = SimulatedWithdrawalApi::new(SimConfig::instant());
        let address = api
            .generate_wallet_address(WalletAddressRequest {
                token_id: "eth".to_owned(),
                currency: "EUR".to_owned(),
                amount: 0.1,
                quote_id: "wq_1".to_owned(),
                bank_account_id: Some("ba_primary".to_owned()),
            })
            .await
            .unwrap();
        assert!(address.qr_code_url.ends_with(&address.wallet_address));
        assert!(address.transaction_id.starts_with("wd_"));
    }

    #[tokio::test]
    async fn status_follows_weights() {
        let mut config = SimConfig::instant();
        config.withdrawal_status_weights = StatusWeights {
            pending: 0,
            received: 0,
            processing: 0,
            completed: 1,
            failed: 0,
        };
        let api = SimulatedWithdrawalApi::new(config);
        let status = api
            .check_withdrawal_status(WithdrawalStatusRequest {
                transaction_id: "wd_1".to_owned(),
                wallet_address: "0xabc".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(status.status, WithdrawalStatus::Completed);
        assert!(status.fiat_amount.is_some());
        assert_eq!(status.transaction_id, "wd_1");
    }

    #[tokio::test]
    async fn bank_account_failures_are_categorized() {
        let mut config = SimConfig::instant();
        config.bank_accounts = OpProfile::new(0, 0, 1.0);
        let api = SimulatedWithdrawalApi::new(config);
        let err = api.get_bank_accounts().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BankAccountsError);
    }

    #[tokio::test]
    async fn catalog_operations_never_fail() {
        let api = SimulatedWithdrawalApi::new(SimConfig::instant());
        assert_eq!(api.get_available_tokens().await.unwrap(), catalog::tokens());
        assert_eq!(api.get_available_currencies().await.unwrap().len(), 3);
        assert_eq!(api.get_bank_accounts().await.unwrap()[0].id, "ba_primary");
    }
}
