use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::{
    ARBITRUM, AVALANCHE, BASE, BSC, ETHEREUM, FANTOM, LINEA, OPTIMISM, POLYGON, SCROLL, ZKSYNC,
};
use crate::error::SwapError;
use crate::types::{AmountKind, QuoteRequest};

const BASE_URL: &str = "https://aggregator-api.kyberswap.com";
const DEFAULT_GAS: u64 = 250_000;

static SUPPORTED_CHAINS: &[u64] = &[
    ETHEREUM, OPTIMISM, BSC, POLYGON, FANTOM, ZKSYNC, BASE, ARBITRUM, AVALANCHE, LINEA, SCROLL,
];

#[derive(Debug, Clone, Deserialize)]
struct KyberRoutesResponse {
    data: KyberRouteData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KyberRouteData {
    route_summary: KyberRouteSummary,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KyberRouteSummary {
    amount_out: String,
    #[serde(default)]
    gas: Option<String>,
    #[serde(default)]
    price_impact: Option<String>,
}

/// KyberSwap aggregator adapter. Kyber keys its routes endpoint by chain slug
/// rather than numeric id.
pub struct KyberSwapAdapter {
    client: reqwest::Client,
}

impl KyberSwapAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn chain_slug(chain_id: u64) -> Option<&'static str> {
        match chain_id {
            ETHEREUM => Some("ethereum"),
            OPTIMISM => Some("optimism"),
            BSC => Some("bsc"),
            POLYGON => Some("polygon"),
            FANTOM => Some("fantom"),
            ZKSYNC => Some("zksync"),
            BASE => Some("base"),
            ARBITRUM => Some("arbitrum"),
            AVALANCHE => Some("avalanche"),
            LINEA => Some("linea"),
            SCROLL => Some("scroll"),
            _ => None,
        }
    }

    fn convert(response: KyberRoutesResponse) -> Result<AdapterQuote, SwapError> {
        let summary = &response.data.route_summary;
        Ok(AdapterQuote {
            output_amount: parse_u256(&summary.amount_out, "amountOut")?,
            estimated_gas: summary
                .gas
                .as_deref()
                .and_then(|g| g.parse().ok())
                .unwrap_or(DEFAULT_GAS),
            price_impact_pct: summary
                .price_impact
                .as_deref()
                .and_then(|p| p.parse::<f64>().ok())
                .unwrap_or(0.0)
                .max(0.0),
            tx_data: None,
            bridge_used: None,
            estimated_time_seconds: None,
        })
    }
}

#[async_trait]
impl Aggregator for KyberSwapAdapter {
    fn name(&self) -> &'static str {
        "KyberSwap"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::DexAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        SUPPORTED_CHAINS
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        if request.amount_kind == AmountKind::FromOutput {
            return Err(SwapError::invalid_params("kyberswap quotes exact input only"));
        }

        let chain_id = request.input_token.chain_id;
        let slug = Self::chain_slug(chain_id).ok_or(SwapError::UnsupportedChain(chain_id))?;
        let url = format!(
            "{BASE_URL}/{slug}/api/v1/routes?tokenIn={:#x}&tokenOut={:#x}&amountIn={}",
            request.input_token.address, request.output_token.address, request.amount,
        );

        let response = check_status(self.client.get(&url).send().await.map_err(SwapError::from)?).await?;
        let routes: KyberRoutesResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("kyberswap response parse: {e}")))?;

        debug!("kyberswap quote: {} -> {}", request.amount, routes.data.route_summary.amount_out);
        Self::convert(routes)
    }
}
