use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::supported_chains;
use crate::error::SwapError;
use crate::types::{AmountKind, PreparedCall, QuoteRequest};

const BASE_URL: &str = "https://li.quest/v1";
const DEFAULT_BRIDGE_GAS: u64 = 400_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiFiQuoteResponse {
    estimate: LiFiEstimate,
    #[serde(default)]
    tool_details: Option<LiFiToolDetails>,
    #[serde(default)]
    transaction_request: Option<LiFiTransactionRequest>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiFiEstimate {
    to_amount: String,
    #[serde(default)]
    gas_costs: Vec<LiFiGasCost>,
    #[serde(default)]
    execution_duration: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct LiFiGasCost {
    #[serde(default)]
    estimate: Option<String>,
    #[serde(default)]
    amount: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LiFiToolDetails {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiFiTransactionRequest {
    to: String,
    data: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    gas_limit: Option<String>,
}

/// LI.FI bridge aggregator adapter. Covers every chain in the registry and
/// returns a ready-to-sign transaction when the route allows it.
pub struct LiFiAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
    chains: Vec<u64>,
}

impl LiFiAdapter {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            chains: supported_chains(),
        }
    }

    fn convert(response: LiFiQuoteResponse) -> Result<AdapterQuote, SwapError> {
        let output_amount = parse_u256(&response.estimate.to_amount, "toAmount")?;
        let estimated_gas = response
            .estimate
            .gas_costs
            .first()
            .and_then(|g| g.estimate.as_deref().or(g.amount.as_deref()))
            .and_then(|g| g.parse().ok())
            .unwrap_or(DEFAULT_BRIDGE_GAS);

        let tx_data = match response.transaction_request {
            Some(tx) => Some(PreparedCall {
                to: tx
                    .to
                    .parse()
                    .map_err(|_| SwapError::api(None, format!("invalid to address: {}", tx.to)))?,
                data: tx.data,
                value: tx
                    .value
                    .as_deref()
                    .map(parse_hex_quantity)
                    .transpose()?
                    .unwrap_or_default(),
                gas: tx
                    .gas_limit
                    .as_deref()
                    .and_then(|g| parse_hex_quantity(g).ok())
                    .map(|g| g.try_into().unwrap_or(u64::MAX)),
            }),
            None => None,
        };

        Ok(AdapterQuote {
            output_amount,
            estimated_gas,
            price_impact_pct: 0.0,
            tx_data,
            bridge_used: response.tool_details.map(|t| t.name),
            estimated_time_seconds: response.estimate.execution_duration.map(|d| d as u64),
        })
    }
}

/// LI.FI mixes hex ("0x…") and decimal quantities across fields.
fn parse_hex_quantity(value: &str) -> Result<alloy::primitives::U256, SwapError> {
    if let Some(hex) = value.strip_prefix("0x") {
        alloy::primitives::U256::from_str_radix(hex, 16)
            .map_err(|_| SwapError::api(None, format!("invalid hex quantity: {value}")))
    } else {
        parse_u256(value, "quantity")
    }
}

#[async_trait]
impl Aggregator for LiFiAdapter {
    fn name(&self) -> &'static str {
        "LiFi"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::BridgeAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        &self.chains
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        if request.amount_kind == AmountKind::FromOutput {
            return Err(SwapError::invalid_params("lifi quotes exact input only"));
        }

        let mut url = format!(
            "{BASE_URL}/quote?fromChain={}&toChain={}&fromToken={:#x}&toToken={:#x}&fromAmount={}",
            request.input_token.chain_id,
            request.output_token.chain_id,
            request.input_token.address,
            request.output_token.address,
            request.amount,
        );
        if let Some(user) = request.user_address {
            url.push_str(&format!("&fromAddress={user:#x}"));
        }

        let mut http = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            http = http.header("x-lifi-api-key", api_key);
        }

        let response = check_status(http.send().await.map_err(SwapError::from)?).await?;
        let quote: LiFiQuoteResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("lifi response parse: {e}")))?;

        debug!("lifi quote: {} -> {}", request.amount, quote.estimate.to_amount);
        Self::convert(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    const SAMPLE: &str = r#"{
        "estimate": {
            "toAmount": "498500000",
            "gasCosts": [{"estimate": "320000", "amount": "2500000000000000"}],
            "executionDuration": 240.5
        },
        "toolDetails": {"name": "Stargate"},
        "transactionRequest": {
            "to": "0x1231deb6f5749ef6ce6943a275a1d3e7486f4eae",
            "data": "0xdeadbeef",
            "value": "0x0",
            "gasLimit": "0x4e200"
        }
    }"#;

    #[test]
    fn test_convert_full_response() {
        let response: LiFiQuoteResponse = serde_json::from_str(SAMPLE).unwrap();
        let quote = LiFiAdapter::convert(response).unwrap();
        assert_eq!(quote.output_amount, U256::from(498_500_000u64));
        assert_eq!(quote.estimated_gas, 320_000);
        assert_eq!(quote.bridge_used.as_deref(), Some("Stargate"));
        assert_eq!(quote.estimated_time_seconds, Some(240));
        let tx = quote.tx_data.unwrap();
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.gas, Some(0x4e200));
    }

    #[test]
    fn test_convert_minimal_response() {
        let response: LiFiQuoteResponse =
            serde_json::from_str(r#"{"estimate":{"toAmount":"1"}}"#).unwrap();
        let quote = LiFiAdapter::convert(response).unwrap();
        assert_eq!(quote.estimated_gas, DEFAULT_BRIDGE_GAS);
        assert!(quote.tx_data.is_none());
        assert!(quote.bridge_used.is_none());
    }
}
