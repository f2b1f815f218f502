use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::{
    ARBITRUM, AVALANCHE, BASE, BSC, ETHEREUM, FANTOM, LINEA, OPTIMISM, POLYGON, SCROLL, ZKSYNC,
};
use crate::error::SwapError;
use crate::types::{AmountKind, QuoteRequest};

const QUOTE_URL: &str = "https://api.odos.xyz/sor/quote/v2";
const DEFAULT_GAS: u64 = 250_000;

static SUPPORTED_CHAINS: &[u64] = &[
    ETHEREUM, OPTIMISM, BSC, POLYGON, FANTOM, ZKSYNC, BASE, ARBITRUM, AVALANCHE, LINEA, SCROLL,
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OdosQuoteResponse {
    out_amounts: Vec<String>,
    #[serde(default)]
    gas_estimate: Option<f64>,
    #[serde(default)]
    price_impact: Option<f64>,
}

/// Odos smart-order-router adapter (v2 quote endpoint, POST).
pub struct OdosAdapter {
    client: reqwest::Client,
}

impl OdosAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn convert(response: OdosQuoteResponse) -> Result<AdapterQuote, SwapError> {
        let first = response
            .out_amounts
            .first()
            .ok_or_else(|| SwapError::api(None, "odos returned no outAmounts"))?;
        Ok(AdapterQuote {
            output_amount: parse_u256(first, "outAmounts[0]")?,
            estimated_gas: response.gas_estimate.map(|g| g as u64).unwrap_or(DEFAULT_GAS),
            // odos reports impact as a signed percentage, negative = loss
            price_impact_pct: response.price_impact.map(|p| p.abs()).unwrap_or(0.0),
            tx_data: None,
            bridge_used: None,
            estimated_time_seconds: None,
        })
    }
}

#[async_trait]
impl Aggregator for OdosAdapter {
    fn name(&self) -> &'static str {
        "Odos"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::DexAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        SUPPORTED_CHAINS
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        if request.amount_kind == AmountKind::FromOutput {
            return Err(SwapError::invalid_params("odos quotes exact input only"));
        }

        let mut body = json!({
            "chainId": request.input_token.chain_id,
            "inputTokens": [{
                "tokenAddress": format!("{:#x}", request.input_token.address),
                "amount": request.amount.to_string(),
            }],
            "outputTokens": [{
                "tokenAddress": format!("{:#x}", request.output_token.address),
                "proportion": 1,
            }],
            "slippageLimitPercent": request.slippage_bps as f64 / 100.0,
        });
        if let Some(user) = request.user_address {
            body["userAddr"] = json!(format!("{user:#x}"));
        }

        let response = check_status(
            self.client
                .post(QUOTE_URL)
                .json(&body)
                .send()
                .await
                .map_err(SwapError::from)?,
        )
        .await?;
        let quote: OdosQuoteResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("odos response parse: {e}")))?;

        debug!("odos quote: {} -> {:?}", request.amount, quote.out_amounts.first());
        Self::convert(quote)
    }
}
