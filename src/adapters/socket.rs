use alloy::primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::{
    ARBITRUM, AVALANCHE, BASE, BSC, ETHEREUM, LINEA, OPTIMISM, POLYGON, SCROLL, ZKSYNC,
};
use crate::error::SwapError;
use crate::types::{AmountKind, QuoteRequest};

const BASE_URL: &str = "https://api.socket.tech/v2";
const DEFAULT_BRIDGE_GAS: u64 = 400_000;

static SUPPORTED_CHAINS: &[u64] = &[
    ETHEREUM, OPTIMISM, BSC, POLYGON, ZKSYNC, BASE, ARBITRUM, AVALANCHE, LINEA, SCROLL,
];

#[derive(Debug, Clone, Deserialize)]
struct SocketQuoteResponse {
    result: SocketQuoteResult,
}

#[derive(Debug, Clone, Deserialize)]
struct SocketQuoteResult {
    #[serde(default)]
    routes: Vec<SocketRoute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketRoute {
    to_amount: String,
    #[serde(default)]
    used_bridge_names: Vec<String>,
    #[serde(default)]
    service_time: Option<u64>,
}

/// Socket (Bungee) bridge aggregator adapter. Takes the first route of the
/// output-sorted response.
pub struct SocketAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SocketAdapter {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn convert(response: SocketQuoteResponse) -> Result<AdapterQuote, SwapError> {
        let route = response
            .result
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| SwapError::no_route("socket returned no routes"))?;
        Ok(AdapterQuote {
            output_amount: parse_u256(&route.to_amount, "toAmount")?,
            estimated_gas: DEFAULT_BRIDGE_GAS,
            price_impact_pct: 0.0,
            tx_data: None,
            bridge_used: route.used_bridge_names.into_iter().next(),
            estimated_time_seconds: route.service_time,
        })
    }
}

#[async_trait]
impl Aggregator for SocketAdapter {
    fn name(&self) -> &'static str {
        "Socket"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::BridgeAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        SUPPORTED_CHAINS
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        if request.amount_kind == AmountKind::FromOutput {
            return Err(SwapError::invalid_params("socket quotes exact input only"));
        }

        // socket requires a user address; quoting without one uses a placeholder
        let user = request.user_address.unwrap_or(Address::ZERO);
        let url = format!(
            "{BASE_URL}/quote?fromChainId={}&fromTokenAddress={:#x}&toChainId={}&toTokenAddress={:#x}&fromAmount={}&userAddress={user:#x}&uniqueRoutesPerBridge=true&sort=output",
            request.input_token.chain_id,
            request.input_token.address,
            request.output_token.chain_id,
            request.output_token.address,
            request.amount,
        );

        let mut http = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            http = http.header("API-KEY", api_key);
        }

        let response = check_status(http.send().await.map_err(SwapError::from)?).await?;
        let quote: SocketQuoteResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("socket response parse: {e}")))?;

        debug!("socket routes: {}", quote.result.routes.len());
        Self::convert(quote)
    }
}
