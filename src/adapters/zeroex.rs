use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::traits::{check_status, parse_u256, AdapterQuote, Aggregator, AggregatorKind};
use crate::constants::{ARBITRUM, AVALANCHE, BASE, BSC, ETHEREUM, FANTOM, OPTIMISM, POLYGON};
use crate::error::SwapError;
use crate::types::{AmountKind, PreparedCall, QuoteRequest};

const DEFAULT_GAS: u64 = 200_000;

static SUPPORTED_CHAINS: &[u64] = &[ETHEREUM, OPTIMISM, BSC, POLYGON, FANTOM, BASE, ARBITRUM, AVALANCHE];

/// 0x swap API response (the fields the engine consumes).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZeroExQuoteResponse {
    buy_amount: String,
    estimated_gas: Option<String>,
    estimated_price_impact: Option<String>,
    to: String,
    data: String,
    value: String,
    gas: Option<String>,
}

/// 0x Swap API adapter. Returns a ready-to-sign transaction with the quote.
pub struct ZeroExAdapter {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ZeroExAdapter {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    fn base_url(chain_id: u64) -> Option<&'static str> {
        match chain_id {
            ETHEREUM => Some("https://api.0x.org"),
            OPTIMISM => Some("https://optimism.api.0x.org"),
            BSC => Some("https://bsc.api.0x.org"),
            POLYGON => Some("https://polygon.api.0x.org"),
            FANTOM => Some("https://fantom.api.0x.org"),
            BASE => Some("https://base.api.0x.org"),
            ARBITRUM => Some("https://arbitrum.api.0x.org"),
            AVALANCHE => Some("https://avalanche.api.0x.org"),
            _ => None,
        }
    }

    fn convert(response: ZeroExQuoteResponse) -> Result<AdapterQuote, SwapError> {
        let output_amount = parse_u256(&response.buy_amount, "buyAmount")?;
        let estimated_gas = response
            .estimated_gas
            .as_deref()
            .or(response.gas.as_deref())
            .and_then(|g| g.parse().ok())
            .unwrap_or(DEFAULT_GAS);
        let price_impact_pct = response
            .estimated_price_impact
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .unwrap_or(0.0)
            .max(0.0);

        let to = response
            .to
            .parse()
            .map_err(|_| SwapError::api(None, format!("invalid to address: {}", response.to)))?;
        let value = parse_u256(&response.value, "value")?;
        let gas = response.gas.as_deref().and_then(|g| g.parse().ok());

        Ok(AdapterQuote {
            output_amount,
            estimated_gas,
            price_impact_pct,
            tx_data: Some(PreparedCall {
                to,
                data: response.data,
                value,
                gas,
            }),
            bridge_used: None,
            estimated_time_seconds: None,
        })
    }
}

#[async_trait]
impl Aggregator for ZeroExAdapter {
    fn name(&self) -> &'static str {
        "0x"
    }

    fn kind(&self) -> AggregatorKind {
        AggregatorKind::DexAggregator
    }

    fn supported_chains(&self) -> &[u64] {
        SUPPORTED_CHAINS
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        let chain_id = request.input_token.chain_id;
        let base = Self::base_url(chain_id).ok_or(SwapError::UnsupportedChain(chain_id))?;

        let amount_param = match request.amount_kind {
            AmountKind::FromInput => "sellAmount",
            AmountKind::FromOutput => "buyAmount",
        };
        let mut url = format!(
            "{base}/swap/v1/quote?sellToken={:#x}&buyToken={:#x}&{amount_param}={}&slippagePercentage={}",
            request.input_token.address,
            request.output_token.address,
            request.amount,
            request.slippage_bps as f64 / 10_000.0,
        );
        if let Some(taker) = request.user_address {
            url.push_str(&format!("&takerAddress={taker:#x}"));
        }

        let mut http = self.client.get(&url);
        if let Some(api_key) = &self.api_key {
            http = http.header("0x-api-key", api_key);
        }

        let response = check_status(http.send().await.map_err(SwapError::from)?).await?;
        let quote: ZeroExQuoteResponse = response
            .json()
            .await
            .map_err(|e| SwapError::api(None, format!("0x response parse: {e}")))?;

        debug!("0x quote: {} -> {}", request.amount, quote.buy_amount);
        Self::convert(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    const SAMPLE: &str = r#"{
        "sellToken": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
        "buyToken": "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee",
        "sellAmount": "1000000000",
        "buyAmount": "295431000000000000",
        "estimatedGas": "136000",
        "estimatedPriceImpact": "0.0421",
        "to": "0xdef1c0ded9bec7f1a1670819833240f027b25eff",
        "data": "0x415565b0",
        "value": "0",
        "gas": "150000"
    }"#;

    #[test]
    fn test_convert_sample_quote() {
        let response: ZeroExQuoteResponse = serde_json::from_str(SAMPLE).unwrap();
        let quote = ZeroExAdapter::convert(response).unwrap();
        assert_eq!(quote.output_amount, U256::from(295_431_000_000_000_000u128));
        assert_eq!(quote.estimated_gas, 136_000);
        assert!((quote.price_impact_pct - 0.0421).abs() < 1e-12);
        let tx = quote.tx_data.unwrap();
        assert_eq!(format!("{:#x}", tx.to), "0xdef1c0ded9bec7f1a1670819833240f027b25eff");
        assert_eq!(tx.data, "0x415565b0");
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.gas, Some(150_000));
    }

    #[test]
    fn test_convert_defaults_gas_and_clamps_impact() {
        let response: ZeroExQuoteResponse = serde_json::from_str(
            r#"{"buyAmount":"1","to":"0xdef1c0ded9bec7f1a1670819833240f027b25eff","data":"0x","value":"0","estimatedPriceImpact":"-0.5"}"#,
        )
        .unwrap();
        let quote = ZeroExAdapter::convert(response).unwrap();
        assert_eq!(quote.estimated_gas, DEFAULT_GAS);
        assert_eq!(quote.price_impact_pct, 0.0);
    }

    #[test]
    fn test_convert_rejects_bad_amount() {
        let response: ZeroExQuoteResponse = serde_json::from_str(
            r#"{"buyAmount":"not-a-number","to":"0xdef1c0ded9bec7f1a1670819833240f027b25eff","data":"0x","value":"0"}"#,
        )
        .unwrap();
        assert!(ZeroExAdapter::convert(response).is_err());
    }
}
