use anyhow::{Context, Result};
use rw_api_sim::SimConfig;
use std::net::SocketAddr;

pub(crate) const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Runtime settings read from the process environment.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ServiceConfig {
    pub(crate) addr: SocketAddr,
    /// Injected simulator failures; `RW_SIM_FAILURES=off` disables them.
    pub(crate) sim_failures: bool,
    pub(crate) sim_seed: Option<u64>,
    /// RocksDB directory for session flags; in-memory when unset.
    pub(crate) session_db: Option<String>,
    /// Hosted flows call this backend over HTTP instead of the in-process simulator.
    pub(crate) backend_url: Option<String>,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let addr = non_empty("WALLET_SERVICE_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_owned())
            .parse::<SocketAddr>()
            .context("WALLET_SERVICE_ADDR must be host:port")?;

        let sim_failures = match non_empty("RW_SIM_FAILURES").as_deref() {
            None => true,
            Some(value) => !matches!(
                value.to_ascii_lowercase().as_str(),
                "off" | "false" | "0" | "no"
            ),
        };

        let sim_seed = non_empty("RW_SIM_SEED")
            .map(|seed| seed.parse::<u64>())
            .transpose()
            .context("RW_SIM_SEED must be an unsigned integer")?;

        Ok(Self {
            addr,
            sim_failures,
            sim_seed,
            session_db: non_empty("RW_SESSION_DB"),
            backend_url: non_empty("RW_BACKEND_URL"),
        })
    }

    pub(crate) fn sim_config(&self) -> SimConfig {
        let mut config = SimConfig::default();
        if !self.sim_failures {
            config = config.without_failures();
        }
        if let Some(seed) = self.sim_seed {
            config = config.with_seed(seed);
        }
        config
    }
}
