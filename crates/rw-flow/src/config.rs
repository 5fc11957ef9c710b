use rw_resource::{DEFAULT_POLL_INTERVAL, RetryPolicy};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct DepositConfig {
    pub min_amount: f64,
    pub max_amount: f64,
    /// Wall-clock delay after which a pending verification is treated as confirmed.
    pub confirmation_delay: Duration,
    pub poll_interval: Duration,
    pub quote_debounce: Duration,
    pub retry: RetryPolicy,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            min_amount: 10.0,
            max_amount: 10_000.0,
            confirmation_delay: Duration::from_millis(3000),
            poll_interval: DEFAULT_POLL_INTERVAL,
            quote_debounce: Duration::from_millis(500),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalConfig {
    pub poll_interval: Duration,
    pub quote_debounce: Duration,
    /// Token amount sent to the wallet-address request when none was entered.
    pub fallback_token_amount: f64,
    /// Fiat amount reported on success when no status check carried one.
    pub fallback_fiat_amount: f64,
    /// Countdown of the QR display; `None` leaves completion to the poll
    /// and explicit `complete_qr_send` calls.
    pub qr_countdown: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            quote_debounce: Duration::from_millis(400),
            fallback_token_amount: 0.1,
            fallback_fiat_amount: 100.0,
            qr_countdown: Some(Duration::from_secs(30)),
            retry: RetryPolicy::default(),
        }
    }
}
