use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::RetryPolicy;

/// Engine configuration. Every field has a default, so `CrossFundConfig::
/// default()` is a working setup; a TOML file or builder-style mutation
/// overrides individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossFundConfig {
    /// CrossFund service URL. Unused by the core engine; reserved.
    pub api_url: String,
    /// Slippage applied when the caller omits one (basis points).
    pub default_slippage_bps: u32,
    /// Quote lifetime when the caller provides no deadline.
    pub default_deadline_minutes: u64,
    /// Retry combinator cap.
    pub max_retries: u32,
    /// Base backoff delay.
    pub retry_delay_ms: u64,
    /// Per-HTTP-request timeout.
    pub timeout_ms: u64,
    /// Gate for the quote cache.
    pub enable_cache: bool,
    /// Quote cache TTL.
    pub cache_ttl_ms: u64,

    #[serde(skip)]
    pub api_keys: ApiKeys,
}

impl Default for CrossFundConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.crossfund.io/v1".to_string(),
            default_slippage_bps: 100,
            default_deadline_minutes: 15,
            max_retries: 3,
            retry_delay_ms: 1_000,
            timeout_ms: 30_000,
            enable_cache: true,
            cache_ttl_ms: 10_000,
            api_keys: ApiKeys::default(),
        }
    }
}

impl CrossFundConfig {
    /// Load from a TOML file, then pick API keys up from the environment.
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: CrossFundConfig = toml::from_str(&content)?;
        config.api_keys = ApiKeys::from_env();
        Ok(config)
    }

    /// Defaults plus API keys from the environment.
    pub fn from_env() -> Self {
        Self {
            api_keys: ApiKeys::from_env(),
            ..Self::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Optional per-upstream API keys. A missing key means the adapter runs under
/// the upstream's public rate tier.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub zerox: Option<String>,
    pub oneinch: Option<String>,
    pub socket: Option<String>,
    pub lifi: Option<String>,
    pub alchemy: Option<String>,
    pub infura: Option<String>,
}

impl ApiKeys {
    /// Read once from the environment (`.env` honored when present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            zerox: env::var("ZEROX_API_KEY").ok(),
            oneinch: env::var("ONEINCH_API_KEY").ok(),
            socket: env::var("SOCKET_API_KEY").ok(),
            lifi: env::var("LIFI_API_KEY").ok(),
            alchemy: env::var("ALCHEMY_API_KEY").ok(),
            infura: env::var("INFURA_API_KEY").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = CrossFundConfig::default();
        assert_eq!(config.default_slippage_bps, 100);
        assert_eq!(config.default_deadline_minutes, 15);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1_000);
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.enable_cache);
        assert_eq!(config.cache_ttl_ms, 10_000);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: CrossFundConfig = toml::from_str("default_slippage_bps = 50\ntimeout_ms = 5000\n").unwrap();
        assert_eq!(config.default_slippage_bps, 50);
        assert_eq!(config.timeout_ms, 5_000);
        // untouched fields keep defaults
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_retry_policy_wiring() {
        let config = CrossFundConfig { max_retries: 5, retry_delay_ms: 250, ..Default::default() };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay_ms, 250);
    }
}
