use alloy::primitives::U256;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};

use crate::cache::EngineCaches;
use crate::constants;
use crate::error::SwapError;
use crate::types::Token;

const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

/// Swap-probe capability: the best raw USDC output for one whole unit of a
/// token on its own chain. Implemented by the quote service; wired in after
/// construction to keep the dependency one-way.
#[async_trait]
pub trait UsdcProbe: Send + Sync {
    async fn usdc_value_of_one(&self, token: &Token) -> Option<U256>;
}

/// Token USD pricing: cache, then CoinGecko, then a 1-token→USDC swap probe.
/// Total failure degrades to 0.0 rather than erroring, so USD-denominated
/// fields downstream degrade instead of failing the quote.
pub struct PriceOracle {
    client: reqwest::Client,
    caches: Arc<EngineCaches>,
    probe: RwLock<Option<Weak<dyn UsdcProbe>>>,
}

impl PriceOracle {
    pub fn new(client: reqwest::Client, caches: Arc<EngineCaches>) -> Self {
        Self {
            client,
            caches,
            probe: RwLock::new(None),
        }
    }

    pub fn set_probe(&self, probe: &Arc<dyn UsdcProbe>) {
        *self.probe.write().expect("probe lock poisoned") = Some(Arc::downgrade(probe));
    }

    /// USD price for one whole token.
    pub async fn token_price_usd(&self, token: &Token) -> f64 {
        // USDC anchors at exactly 1.0
        if Some(token.address) == constants::usdc_address(token.chain_id) {
            return 1.0;
        }

        let key = (token.chain_id, token.address);
        if let Some(price) = self.caches.prices.get(&key).await {
            return price;
        }

        let price = match self.fetch_coingecko(token).await {
            Ok(price) if price > 0.0 => price,
            Ok(_) | Err(_) => match self.probe_price(token).await {
                Some(price) => price,
                None => {
                    warn!("no price source for {} on chain {}", token.symbol, token.chain_id);
                    return 0.0;
                }
            },
        };

        self.caches.prices.insert(key, price).await;
        price
    }

    async fn fetch_coingecko(&self, token: &Token) -> Result<f64, SwapError> {
        let info = constants::chain_info(token.chain_id)
            .ok_or(SwapError::UnsupportedChain(token.chain_id))?;

        let (url, key) = if token.is_native() {
            (
                format!(
                    "{COINGECKO_API}/simple/price?ids={}&vs_currencies=usd",
                    info.coingecko_native_id
                ),
                info.coingecko_native_id.to_string(),
            )
        } else {
            let platform = info
                .coingecko_platform
                .ok_or_else(|| SwapError::UnsupportedToken(token.symbol.clone()))?;
            (
                format!(
                    "{COINGECKO_API}/simple/token_price/{platform}?contract_addresses={:#x}&vs_currencies=usd",
                    token.address
                ),
                format!("{:#x}", token.address),
            )
        };

        let response = self.client.get(&url).send().await.map_err(SwapError::from)?;
        if !response.status().is_success() {
            return Err(crate::error::classify_http(
                response.status().as_u16(),
                &response.text().await.unwrap_or_default(),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SwapError::network(format!("coingecko parse: {e}")))?;

        let price = body
            .get(&key)
            .and_then(|entry| entry.get("usd"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        debug!("coingecko {} on chain {} -> {}", token.symbol, token.chain_id, price);
        Ok(price)
    }

    /// Quote 1 token against same-chain USDC and read the output as a price.
    async fn probe_price(&self, token: &Token) -> Option<f64> {
        let probe = self.probe.read().ok()?.as_ref()?.upgrade()?;
        let output = probe.usdc_value_of_one(token).await?;
        // USDC is 6 decimals everywhere we support it
        let price = u256_to_f64(output) / 1e6;
        if price > 0.0 {
            Some(price)
        } else {
            None
        }
    }
}

pub(crate) fn u256_to_f64(value: U256) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EngineCaches;
    use crate::constants::{usdc_token, ETHEREUM, POLYGON};

    struct FixedProbe(U256);

    #[async_trait]
    impl UsdcProbe for FixedProbe {
        async fn usdc_value_of_one(&self, _token: &Token) -> Option<U256> {
            Some(self.0)
        }
    }

    fn oracle() -> PriceOracle {
        PriceOracle::new(reqwest::Client::new(), Arc::new(EngineCaches::default()))
    }

    #[tokio::test]
    async fn test_usdc_self_price() {
        let oracle = oracle();
        assert_eq!(oracle.token_price_usd(&usdc_token(ETHEREUM).unwrap()).await, 1.0);
        assert_eq!(oracle.token_price_usd(&usdc_token(POLYGON).unwrap()).await, 1.0);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_fetch() {
        let caches = Arc::new(EngineCaches::default());
        let oracle = PriceOracle::new(reqwest::Client::new(), Arc::clone(&caches));
        let token = Token::new(
            "0x1111111111111111111111111111111111111111".parse().unwrap(),
            ETHEREUM,
            "TEST",
            18,
        );
        caches.prices.insert((ETHEREUM, token.address), 123.45).await;
        assert_eq!(oracle.token_price_usd(&token).await, 123.45);
    }

    #[tokio::test]
    async fn test_probe_converts_usdc_output() {
        let caches = Arc::new(EngineCaches::default());
        let oracle = PriceOracle::new(reqwest::Client::new(), caches);
        // 2.5 USDC per token
        let probe: Arc<dyn UsdcProbe> = Arc::new(FixedProbe(U256::from(2_500_000u64)));
        oracle.set_probe(&probe);
        let token = Token::new(
            "0x2222222222222222222222222222222222222222".parse().unwrap(),
            // unsupported chain id forces the CoinGecko path to fail fast
            4242,
            "TEST",
            18,
        );
        assert_eq!(oracle.token_price_usd(&token).await, 2.5);
    }

    #[test]
    fn test_u256_to_f64() {
        assert_eq!(u256_to_f64(U256::ZERO), 0.0);
        assert_eq!(u256_to_f64(U256::from(1_000_000u64)), 1e6);
    }
}
