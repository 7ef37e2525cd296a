//! Configuration loading and representation.

use std::time::Duration;

use thiserror::Error;

use stockhub_inventory::StockPolicy;

pub const LEASE_TIMEOUT_ENV: &str = "STOCKHUB_LEASE_TIMEOUT_MS";
pub const MANUAL_ADJUST_POLICY_ENV: &str = "STOCKHUB_MANUAL_ADJUST_POLICY";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("STOCKHUB_LEASE_TIMEOUT_MS must be a positive number of milliseconds, got '{0}'")]
    InvalidLeaseTimeout(String),

    #[error("STOCKHUB_MANUAL_ADJUST_POLICY must be 'clamp' or 'reject', got '{0}'")]
    InvalidManualAdjustPolicy(String),
}

/// What a manual adjustment that would go below zero does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ManualAdjustPolicy {
    /// Floor at zero and record the applied delta.
    #[default]
    Clamp,
    /// Fail with `InsufficientStock`.
    Reject,
}

impl ManualAdjustPolicy {
    pub fn stock_policy(&self) -> StockPolicy {
        match self {
            ManualAdjustPolicy::Clamp => StockPolicy::ClampAtZero,
            ManualAdjustPolicy::Reject => StockPolicy::RequireNonNegative,
        }
    }
}

impl core::str::FromStr for ManualAdjustPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clamp" => Ok(ManualAdjustPolicy::Clamp),
            "reject" => Ok(ManualAdjustPolicy::Reject),
            _ => Err(ConfigError::InvalidManualAdjustPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockConfig {
    /// Longest a unit of work waits for a lease before failing.
    pub lease_timeout: Duration,
    pub manual_adjust_policy: ManualAdjustPolicy,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            lease_timeout: Duration::from_millis(5_000),
            manual_adjust_policy: ManualAdjustPolicy::Clamp,
        }
    }
}

impl StockConfig {
    /// Load from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(LEASE_TIMEOUT_ENV) {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLeaseTimeout(raw.clone()))?;
            if millis == 0 {
                return Err(ConfigError::InvalidLeaseTimeout(raw));
            }
            config.lease_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(MANUAL_ADJUST_POLICY_ENV) {
            config.manual_adjust_policy = raw.parse()?;
        }

        Ok(config)
    }

    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn with_manual_adjust_policy(mut self, policy: ManualAdjustPolicy) -> Self {
        self.manual_adjust_policy = policy;
        self
    }
}
