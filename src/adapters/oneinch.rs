use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::{
    ARBITRUM, AVALANCHE, BASE, BSC, ETHEREUM, FANTOM, OPTIMISM, POLYGON, ZKSYNC,
};
use crate::error::SwapError;
use crate::types::{AmountKind, QuoteRequest};

const BASE_URL: &str = "https://api.1inch.dev/swap/v6.0";
const DEFAULT_GAS: u64 = 250_000;

static SUPPORTED_CHAINS: &[u64] = &[
    ETHEREUM, OPTIMISM, BSC, POLYGON, FANTOM, ZKSYNC, BASE, ARBITRUM, AVALANCHE,
];

/// 1inch v6 quote response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OneInchQuoteResponse {
    dst_amount: String,
    #[serde(default)]
    gas: Option<u64>,
    #[serde(default)]
    estimated_gas: Option<u64>,
}

/// 1inch aggregation API adapter (quote only; 1inch builds calldata in a
/// separate `/swap` call the engine does not need).
pub struct OneInchAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl OneInchAdapter {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn convert(response: OneInchQuoteResponse) -> Result<AdapterQuote, SwapError> {
        Ok(AdapterQuote {
            output_amount: parse_u256(&response.dst_amount, "dstAmount")?,
            estimated_gas: response.estimated_gas.or(response.gas).unwrap_or(DEFAULT_GAS),
            price_impact_pct: 0.0,
            tx_data: None,
            bridge_used: None,
            estimated_time_seconds: None,
        })
    }
}

#[async_trait]
impl Aggregator for OneInchAdapter {
    fn name(&self) -> &'static str {
        "1inch"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::DexAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        SUPPORTED_CHAINS
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        if request.amount_kind == AmountKind::FromOutput {
            return Err(SwapError::invalid_params("1inch quotes exact input only"));
        }

        // 1inch uses the 0xEeee… sentinel for native tokens, which is the
        // engine's own convention, so addresses pass through unchanged.
        let url = format!(
            "{BASE_URL}/{}/quote?src={:#x}&dst={:#x}&amount={}",
            request.input_token.chain_id,
            request.input_token.address,
            request.output_token.address,
            request.amount,
        );

        let mut http = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            http = http.bearer_auth(api_key);
        }

        let response = check_status(http.send().await.map_err(SwapError::from)?).await?;
        let quote: OneInchQuoteResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("1inch response parse: {e}")))?;

        debug!("1inch quote: {} -> {}", request.amount, quote.dst_amount);
        Self::convert(quote)
    }
}
