use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::{ARBITRUM, AVALANCHE, BASE, BSC, ETHEREUM, FANTOM, OPTIMISM, POLYGON};
use crate::error::SwapError;
use crate::types::{AmountKind, QuoteRequest};

const BASE_URL: &str = "https://apiv5.paraswap.io";
const DEFAULT_GAS: u64 = 250_000;

static SUPPORTED_CHAINS: &[u64] = &[ETHEREUM, OPTIMISM, BSC, POLYGON, FANTOM, BASE, ARBITRUM, AVALANCHE];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParaswapPricesResponse {
    price_route: PriceRoute,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceRoute {
    dest_amount: String,
    #[serde(default)]
    gas_cost: Option<String>,
    #[serde(default, rename = "srcUSD")]
    src_usd: Option<String>,
    #[serde(default, rename = "destUSD")]
    dest_usd: Option<String>,
}

/// Paraswap v5 prices API adapter.
pub struct ParaswapAdapter {
    client: reqwest::Client,
}

impl ParaswapAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Impact derived from the route's own USD valuations; arbitrage-shaped
    /// routes (dest worth more than src) clamp to 0.
    fn price_impact(route: &PriceRoute) -> f64 {
        let src: f64 = route.src_usd.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0.0);
        let dest: f64 = route.dest_usd.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0.0);
        if src <= 0.0 || dest <= 0.0 {
            return 0.0;
        }
        ((src - dest) / src * 100.0).max(0.0)
    }

    fn convert(response: ParaswapPricesResponse) -> Result<AdapterQuote, SwapError> {
        let route = &response.price_route;
        Ok(AdapterQuote {
            output_amount: parse_u256(&route.dest_amount, "destAmount")?,
            estimated_gas: route
                .gas_cost
                .as_deref()
                .and_then(|g| g.parse().ok())
                .unwrap_or(DEFAULT_GAS),
            price_impact_pct: Self::price_impact(route),
            tx_data: None,
            bridge_used: None,
            estimated_time_seconds: None,
        })
    }
}

#[async_trait]
impl Aggregator for ParaswapAdapter {
    fn name(&self) -> &'static str {
        "Paraswap"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::DexAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        SUPPORTED_CHAINS
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        let side = match request.amount_kind {
            AmountKind::FromInput => "SELL",
            AmountKind::FromOutput => "BUY",
        };
        let url = format!(
            "{BASE_URL}/prices?srcToken={:#x}&destToken={:#x}&amount={}&srcDecimals={}&destDecimals={}&network={}&side={side}",
            request.input_token.address,
            request.output_token.address,
            request.amount,
            request.input_token.decimals,
            request.output_token.decimals,
            request.input_token.chain_id,
        );

        let response = check_status(self.client.get(&url).send().await.map_err(SwapError::from)?).await?;
        let prices: ParaswapPricesResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("paraswap response parse: {e}")))?;

        debug!("paraswap quote: {} -> {}", request.amount, prices.price_route.dest_amount);
        Self::convert(prices)
    }
}
