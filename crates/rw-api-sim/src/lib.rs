//! Simulated backend for the deposit and withdrawal families.
//!
//! Every operation sleeps for a latency drawn from its `OpProfile`, may fail
//! with the operation's service error, and otherwise synthesizes a response
//! from fixed rate tables and random identifiers. Clients hold no per-request
//! state and are safe to call concurrently.

mod config;
mod deposit;
mod rates;
mod withdrawal;

pub use config::{OpProfile, SimConfig, StatusWeights};
pub use deposit::{DEPOSIT_MAX_AMOUNT, DEPOSIT_MIN_AMOUNT, SimulatedDepositApi};
pub use rates::fiat_price;
pub use withdrawal::SimulatedWithdrawalApi;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rw_api_client::{ApiClients, ApiError, ApiResult, ErrorCode};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;
use uuid::Uuid;

/// Builds both client families over one configuration.
pub fn simulated_clients(config: SimConfig) -> ApiClients {
    ApiClients::new(
        Arc::new(SimulatedDepositApi::new(config.clone())),
        Arc::new(SimulatedWithdrawalApi::new(config)),
    )
}

pub(crate) struct Simulator {
    pub(crate) config: SimConfig,
    rng: Mutex<StdRng>,
}

impl Simulator {
    pub(crate) fn new(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub(crate) fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut guard = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Sleeps for the profile's latency, then rolls its failure probability.
    pub(crate) async fn call(
        &self,
        op: &'static str,
        profile: &OpProfile,
        code: ErrorCode,
        message: &str,
    ) -> ApiResult<()> {
        self.latency(profile).await;
        self.roll_failure(op, profile, code, message)
    }

    pub(crate) async fn latency(&self, profile: &OpProfile) {
        let delay_ms = self.with_rng(|rng| rng.gen_range(profile.latency_ms.clone()));
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    pub(crate) fn roll_failure(
        &self,
        op: &'static str,
        profile: &OpProfile,
        code: ErrorCode,
        message: &str,
    ) -> ApiResult<()> {
        let rate = profile.failure_rate.clamp(0.0, 1.0);
        if self.with_rng(|rng| rng.gen_bool(rate)) {
            debug!(op, code = %code, "injected simulated failure");
            return Err(ApiError::new(code, message));
        }
        Ok(())
    }

    pub(crate) fn chance(&self, probability: f64) -> bool {
        let probability = probability.clamp(0.0, 1.0);
        self.with_rng(|rng| rng.gen_bool(probability))
    }

    pub(crate) fn random_digits(&self, len: usize) -> String {
        self.with_rng(|rng| {
            (0..len)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect()
        })
    }
}

pub(crate) fn epoch_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Derives a fresh address shaped like the token's network.
pub(crate) fn wallet_address_for(network: &str) -> String {
    let digest = Sha256::digest(Uuid::new_v4().as_bytes());
    let hex = hex::encode(digest);
    if network.eq_ignore_ascii_case("bitcoin") {
        format!("bc1q{}", &hex[..38])
    } else {
        format!("0x{}", &hex[..40])
    }
}
