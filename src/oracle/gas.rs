use alloy::primitives::U256;
use std::sync::Arc;
use tracing::debug;

use crate::cache::EngineCaches;
use crate::constants;
use crate::error::SwapError;
use crate::oracle::price::{u256_to_f64, PriceOracle};
use crate::provider::ProviderPool;
use crate::types::{GasPrices, GasTier};

// Expected inclusion times per tier (seconds)
const SLOW_SECONDS: u64 = 120;
const STANDARD_SECONDS: u64 = 30;
const FAST_SECONDS: u64 = 15;

/// Per-chain gas tiers. Live node price first, static registry table on any
/// failure; results cached for 15s.
pub struct GasOracle {
    caches: Arc<EngineCaches>,
    providers: Arc<ProviderPool>,
    prices: Arc<PriceOracle>,
}

impl GasOracle {
    pub fn new(caches: Arc<EngineCaches>, providers: Arc<ProviderPool>, prices: Arc<PriceOracle>) -> Self {
        Self {
            caches,
            providers,
            prices,
        }
    }

    pub async fn gas_prices(&self, chain_id: u64) -> Result<GasPrices, SwapError> {
        if let Some(cached) = self.caches.gas.get(&chain_id).await {
            return Ok(cached);
        }

        let info = constants::chain_info(chain_id).ok_or(SwapError::UnsupportedChain(chain_id))?;

        // Live oracle first; the static table covers every failure mode.
        let standard_wei = match self.providers.get(chain_id).await {
            Ok(provider) => provider.gas_price().await.ok(),
            Err(_) => None,
        };

        let (slow, standard, fast) = match standard_wei {
            Some(wei) => {
                debug!("chain {} node gas price {} wei", chain_id, wei);
                (
                    wei * U256::from(80u64) / U256::from(100u64),
                    wei,
                    wei * U256::from(125u64) / U256::from(100u64),
                )
            }
            None => (
                gwei_to_wei(info.fallback_gas.slow_gwei),
                gwei_to_wei(info.fallback_gas.standard_gwei),
                gwei_to_wei(info.fallback_gas.fast_gwei),
            ),
        };

        let native_price = match constants::native_token(chain_id) {
            Some(native) => {
                let price = self.prices.token_price_usd(&native).await;
                if price > 0.0 {
                    price
                } else {
                    info.fallback_gas.native_usd
                }
            }
            None => info.fallback_gas.native_usd,
        };

        let gas_prices = GasPrices {
            chain_id,
            slow: make_tier(slow, info.supports_eip1559, SLOW_SECONDS),
            standard: make_tier(standard, info.supports_eip1559, STANDARD_SECONDS),
            fast: make_tier(fast, info.supports_eip1559, FAST_SECONDS),
            native_token_price_usd: native_price,
        };

        self.caches.gas.insert(chain_id, gas_prices.clone()).await;
        Ok(gas_prices)
    }
}

fn make_tier(gas_price: U256, eip1559: bool, estimated_seconds: u64) -> GasTier {
    let (max_fee_per_gas, max_priority_fee_per_gas) = if eip1559 {
        (
            Some(gas_price * U256::from(3u64) / U256::from(2u64)),
            Some(gwei_to_wei(1.5)),
        )
    } else {
        (None, None)
    };
    GasTier {
        gas_price,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        estimated_seconds,
    }
}

pub fn gwei_to_wei(gwei: f64) -> U256 {
    U256::from((gwei * 1e9) as u128)
}

/// `(gas_limit · gas_price) / 1e18 · native_usd`
pub fn gas_cost_usd(gas_limit: u64, gas_price: U256, native_token_price_usd: f64) -> f64 {
    let wei = u256_to_f64(gas_price) * gas_limit as f64;
    wei / 1e18 * native_token_price_usd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gwei_conversion() {
        assert_eq!(gwei_to_wei(1.0), U256::from(1_000_000_000u64));
        assert_eq!(gwei_to_wei(0.01), U256::from(10_000_000u64));
        assert_eq!(gwei_to_wei(15.0), U256::from(15_000_000_000u64));
    }

    #[test]
    fn test_gas_cost_usd() {
        // 150k gas at 20 gwei with ETH at $3000 = 0.003 ETH = $9
        let cost = gas_cost_usd(150_000, gwei_to_wei(20.0), 3_000.0);
        assert!((cost - 9.0).abs() < 1e-9);
        assert_eq!(gas_cost_usd(150_000, gwei_to_wei(20.0), 0.0), 0.0);
    }

    #[test]
    fn test_tier_eip1559_mapping() {
        let tier = make_tier(gwei_to_wei(10.0), true, STANDARD_SECONDS);
        assert_eq!(tier.max_fee_per_gas, Some(gwei_to_wei(15.0)));
        assert_eq!(tier.max_priority_fee_per_gas, Some(gwei_to_wei(1.5)));
        assert_eq!(tier.estimated_seconds, 30);

        let legacy = make_tier(gwei_to_wei(5.0), false, FAST_SECONDS);
        assert_eq!(legacy.max_fee_per_gas, None);
        assert_eq!(legacy.max_priority_fee_per_gas, None);
    }
}
