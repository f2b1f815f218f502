use alloy::primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{classify_http, SwapError};
use crate::types::{PreparedCall, QuoteRequest};

/// Which leg of the engine an upstream serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregatorKind {
    DexAggregator,
    BridgeAggregator,
}

/// Intermediate quote shape every adapter normalizes its upstream response
/// into. The quote service turns this into a canonical `SwapQuote`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterQuote {
    pub output_amount: U256,
    pub estimated_gas: u64,
    pub price_impact_pct: f64,
    /// Ready-to-sign transaction, when the upstream returns one.
    pub tx_data: Option<PreparedCall>,
    /// Bridge protocol the route uses (bridge aggregators only).
    pub bridge_used: Option<String>,
    pub estimated_time_seconds: Option<u64>,
}

/// One upstream aggregator: builds its request, performs a single HTTP call,
/// and emits the common intermediate quote.
#[async_trait]
pub trait Aggregator: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> AggregatorKind;

    fn supported_chains(&self) -> &[u64];

    /// Eligibility: the adapter's kind matches the request's shape and its
    /// chain coverage includes the relevant chain(s).
    fn supports(&self, request: &QuoteRequest) -> bool {
        let chains = self.supported_chains();
        match self.kind() {
            AggregatorKind::DexAggregator => {
                !request.is_cross_chain() && chains.contains(&request.input_token.chain_id)
            }
            AggregatorKind::BridgeAggregator => {
                request.is_cross_chain()
                    && chains.contains(&request.input_token.chain_id)
                    && chains.contains(&request.output_token.chain_id)
            }
        }
    }

    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError>;
}

/// Surface a non-2xx response as a classified error, otherwise pass through.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SwapError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_http(status.as_u16(), &body))
}

pub(crate) fn parse_u256(value: &str, field: &str) -> Result<U256, SwapError> {
    U256::from_str_radix(value, 10)
        .map_err(|_| SwapError::api(None, format!("invalid {field}: {value}")))
}

/// Per-adapter health counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdapterMetrics {
    pub total_quotes: u64,
    pub successful_quotes: u64,
    pub failed_quotes: u64,
    pub avg_response_time_ms: f64,
    pub consecutive_failures: u32,
}

impl AdapterMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_quotes == 0 {
            return 0.0;
        }
        self.successful_quotes as f64 / self.total_quotes as f64
    }
}

/// Shared metrics bookkeeping, keyed by adapter name. Updated by the quote
/// service as fan-out results come back.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inner: RwLock<HashMap<String, AdapterMetrics>>,
}

impl MetricsRegistry {
    pub async fn record_success(&self, name: &str, response_time_ms: f64) {
        let mut inner = self.inner.write().await;
        let m = inner.entry(name.to_string()).or_default();
        m.total_quotes += 1;
        m.successful_quotes += 1;
        m.avg_response_time_ms = (m.avg_response_time_ms * (m.successful_quotes - 1) as f64
            + response_time_ms)
            / m.successful_quotes as f64;
        m.consecutive_failures = 0;
    }

    pub async fn record_failure(&self, name: &str) {
        let mut inner = self.inner.write().await;
        let m = inner.entry(name.to_string()).or_default();
        m.total_quotes += 1;
        m.failed_quotes += 1;
        m.consecutive_failures += 1;
    }

    pub async fn snapshot(&self) -> HashMap<String, AdapterMetrics> {
        self.inner.read().await.clone()
    }
}
