use std::ops::RangeInclusive;

/// Latency and failure injection for one simulated operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OpProfile {
    pub latency_ms: RangeInclusive<u64>,
    /// Probability in `[0, 1]` that the call fails with its service error.
    pub failure_rate: f64,
}

impl OpProfile {
    pub const fn new(min_ms: u64, max_ms: u64, failure_rate: f64) -> Self {
        Self {
            latency_ms: min_ms..=max_ms,
            failure_rate,
        }
    }

    pub const fn instant() -> Self {
        Self::new(0, 0, 0.0)
    }
}

/// Relative weights of the statuses returned by `check_withdrawal_status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusWeights {
    pub pending: u32,
    pub received: u32,
    pub processing: u32,
    pub completed: u32,
    pub failed: u32,
}

impl Default for StatusWeights {
    fn default() -> Self {
        Self {
            pending: 20,
            received: 20,
            processing: 25,
            completed: 30,
            failed: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub deposit_quote: OpProfile,
    pub bank_details: OpProfile,
    pub initiate_verification: OpProfile,
    pub verification_status: OpProfile,
    pub withdrawal_quote: OpProfile,
    pub wallet_address: OpProfile,
    pub withdrawal_status: OpProfile,
    pub bank_accounts: OpProfile,
    pub catalog: OpProfile,
    /// Share of verification checks that report `success`; the rest report `failed`.
    pub verification_success_rate: f64,
    pub withdrawal_status_weights: StatusWeights,
    /// Fixed RNG seed; entropy-seeded when `None`.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            deposit_quote: OpProfile::new(500, 1500, 0.05),
            bank_details: OpProfile::new(800, 2000, 0.03),
            initiate_verification: OpProfile::new(1000, 2000, 0.02),
            verification_status: OpProfile::new(500, 1000, 0.05),
            withdrawal_quote: OpProfile::new(500, 1500, 0.05),
            wallet_address: OpProfile::new(1000, 2500, 0.03),
            withdrawal_status: OpProfile::new(300, 800, 0.05),
            bank_accounts: OpProfile::new(300, 800, 0.02),
            catalog: OpProfile::new(100, 300, 0.0),
            verification_success_rate: 0.9,
            withdrawal_status_weights: StatusWeights::default(),
            seed: None,
        }
    }
}

impl SimConfig {
    /// No latency and no injected failures.
    pub fn instant() -> Self {
        Self {
            deposit_quote: OpProfile::instant(),
            bank_details: OpProfile::instant(),
            initiate_verification: OpProfile::instant(),
            verification_status: OpProfile::instant(),
            withdrawal_quote: OpProfile::instant(),
            wallet_address: OpProfile::instant(),
            withdrawal_status: OpProfile::instant(),
            bank_accounts: OpProfile::instant(),
            catalog: OpProfile::instant(),
            ..Self::default()
        }
    }

    /// Default latencies with failure injection turned off.
    pub fn reliable() -> Self {
        Self::default().without_failures()
    }

    pub fn without_failures(mut self) -> Self {
        for profile in [
            &mut self.deposit_quote,
            &mut self.bank_details,
            &mut self.initiate_verification,
            &mut self.verification_status,
            &mut self.withdrawal_quote,
            &mut self.wallet_address,
            &mut self.withdrawal_status,
            &mut self.bank_accounts,
            &mut self.catalog,
        ] {
            profile.failure_rate = 0.0;
        }
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
