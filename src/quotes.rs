use alloy::primitives::U256;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{Aggregator, AggregatorKind, MetricsRegistry};
use crate::cache::{EngineCaches, QuoteKey};
use crate::config::CrossFundConfig;
use crate::constants;
use crate::error::{with_retry, SwapError};
use crate::oracle::gas::gas_cost_usd;
use crate::oracle::price::{u256_to_f64, UsdcProbe};
use crate::oracle::{GasOracle, PriceOracle};
use crate::types::{
    apply_slippage, now_ms, AmountKind, GasPrices, ProtocolKind, QuoteComparison, QuoteRequest,
    RouteStep, StepAction, SwapQuote, SwapRoute, Token,
};

// Synthetic step time estimates when the upstream reports none
const SAME_CHAIN_SECONDS: u64 = 30;
const CROSS_CHAIN_SECONDS: u64 = 300;

/// Fans a request out to every eligible aggregator, normalizes the survivors
/// into canonical quotes, and ranks them by USD net output.
pub struct QuoteService {
    adapters: Vec<Arc<dyn Aggregator>>,
    prices: Arc<PriceOracle>,
    gas: Arc<GasOracle>,
    caches: Arc<EngineCaches>,
    metrics: MetricsRegistry,
    config: CrossFundConfig,
}

impl QuoteService {
    pub fn new(
        adapters: Vec<Arc<dyn Aggregator>>,
        prices: Arc<PriceOracle>,
        gas: Arc<GasOracle>,
        caches: Arc<EngineCaches>,
        config: CrossFundConfig,
    ) -> Self {
        Self {
            adapters,
            prices,
            gas,
            caches,
            metrics: MetricsRegistry::default(),
            config,
        }
    }

    pub fn validate(&self, request: &QuoteRequest) -> Result<(), SwapError> {
        if request.amount.is_zero() {
            return Err(SwapError::invalid_params("amount must be positive"));
        }
        if request.slippage_bps >= 10_000 {
            return Err(SwapError::invalid_params("slippage must be below 10000 bps"));
        }
        for chain in [request.input_token.chain_id, request.output_token.chain_id] {
            if !constants::is_supported_chain(chain) {
                return Err(SwapError::UnsupportedChain(chain));
            }
        }
        Ok(())
    }

    pub async fn adapter_metrics(&self) -> std::collections::HashMap<String, crate::adapters::AdapterMetrics> {
        self.metrics.snapshot().await
    }

    pub async fn get_quotes(
        &self,
        request: &QuoteRequest,
        cancel: &CancellationToken,
    ) -> Result<QuoteComparison, SwapError> {
        self.validate(request)?;
        let started = Instant::now();

        let key = QuoteKey::for_request(request);
        if self.config.enable_cache {
            if let Some(quotes) = self.caches.quotes.get(&key).await {
                debug!("quote cache hit for {}", request.input_token.symbol);
                return Self::comparison(quotes, vec![], started);
            }
        }

        let eligible: Vec<&Arc<dyn Aggregator>> =
            self.adapters.iter().filter(|a| a.supports(request)).collect();
        if eligible.is_empty() {
            return Err(SwapError::no_route(format!(
                "no aggregator covers {} -> {}",
                request.input_token.chain_id, request.output_token.chain_id
            )));
        }

        info!(
            "🔍 querying {} aggregators for {} {} -> {}",
            eligible.len(),
            request.amount,
            request.input_token.symbol,
            request.output_token.symbol
        );

        let results = self.fan_out(request, &eligible, cancel).await;

        let mut failed = Vec::new();
        let mut survivors = Vec::new();
        for (name, kind, outcome, elapsed_ms) in results {
            match outcome {
                Ok(quote) => {
                    self.metrics.record_success(name, elapsed_ms).await;
                    survivors.push((name, kind, quote));
                }
                Err(err) => {
                    warn!("❌ {} quote failed: {}", name, err);
                    self.metrics.record_failure(name).await;
                    failed.push(name.to_string());
                }
            }
        }

        if survivors.is_empty() {
            return Err(SwapError::no_route("all aggregators failed"));
        }

        // The three pricing inputs are independent lookups; overlap them.
        let (input_price, output_price, gas_prices) = tokio::join!(
            self.prices.token_price_usd(&request.input_token),
            self.output_price(&request.output_token),
            self.gas.gas_prices(request.input_token.chain_id),
        );
        let gas_prices = gas_prices?;

        let mut quotes: Vec<SwapQuote> = survivors
            .into_iter()
            .map(|(name, kind, quote)| {
                self.normalize(request, name, kind, quote, input_price, output_price, &gas_prices)
            })
            .collect();

        quotes.sort_by(|a, b| {
            b.net_output_usd
                .partial_cmp(&a.net_output_usd)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if self.config.enable_cache {
            self.caches.quotes.insert(key, quotes.clone()).await;
        }

        info!(
            "🏆 best quote {} ({} quotes, {} failed, {}ms)",
            quotes[0].aggregator,
            quotes.len(),
            failed.len(),
            started.elapsed().as_millis()
        );
        Self::comparison(quotes, failed, started)
    }

    /// One wrapped task per adapter; a failure or cancellation of one never
    /// cancels its peers.
    async fn fan_out(
        &self,
        request: &QuoteRequest,
        eligible: &[&Arc<dyn Aggregator>],
        cancel: &CancellationToken,
    ) -> Vec<(&'static str, AggregatorKind, Result<crate::adapters::AdapterQuote, SwapError>, f64)> {
        let policy = self.config.retry_policy();
        let per_request = self.config.http_timeout();

        let tasks = eligible.iter().map(|adapter| {
            let adapter = Arc::clone(*adapter);
            let policy = policy.clone();
            async move {
                let t0 = Instant::now();
                let attempt = || {
                    let adapter = Arc::clone(&adapter);
                    async move {
                        match timeout(per_request, adapter.fetch_quote(request)).await {
                            Ok(result) => result,
                            Err(_) => Err(SwapError::network(format!("{} timed out", adapter.name()))),
                        }
                    }
                };
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err(SwapError::network("request cancelled")),
                    result = with_retry(&policy, adapter.name(), attempt) => result,
                };
                (adapter.name(), adapter.kind(), outcome, t0.elapsed().as_millis() as f64)
            }
        });

        join_all(tasks).await
    }

    /// Output-side price with the stablecoin default: if the fetch degrades to
    /// zero but the token is a USD stablecoin, price it at 1.0.
    async fn output_price(&self, token: &Token) -> f64 {
        let price = self.prices.token_price_usd(token).await;
        if price == 0.0 && constants::is_stablecoin_symbol(&token.symbol) {
            return 1.0;
        }
        price
    }

    #[allow(clippy::too_many_arguments)]
    fn normalize(
        &self,
        request: &QuoteRequest,
        adapter_name: &str,
        adapter_kind: AggregatorKind,
        quote: crate::adapters::AdapterQuote,
        input_price: f64,
        output_price: f64,
        gas_prices: &GasPrices,
    ) -> SwapQuote {
        let created_at_ms = now_ms();
        let cross_chain = request.is_cross_chain();

        let input_human =
            u256_to_f64(request.amount) / 10f64.powi(request.input_token.decimals as i32);
        let output_human =
            u256_to_f64(quote.output_amount) / 10f64.powi(request.output_token.decimals as i32);

        let input_amount_usd = input_human * input_price;
        let output_amount_usd = output_human * output_price;
        let gas_cost = gas_cost_usd(
            quote.estimated_gas,
            gas_prices.standard.gas_price,
            gas_prices.native_token_price_usd,
        );

        let exchange_rate = if input_human > 0.0 {
            format!("{:.8}", output_human / input_human)
        } else {
            "0.00000000".to_string()
        };

        let estimated_time_seconds = quote.estimated_time_seconds.unwrap_or(if cross_chain {
            CROSS_CHAIN_SECONDS
        } else {
            SAME_CHAIN_SECONDS
        });

        let step = RouteStep {
            protocol: adapter_name.to_string(),
            protocol_type: match adapter_kind {
                AggregatorKind::DexAggregator => ProtocolKind::DexAggregator,
                AggregatorKind::BridgeAggregator => ProtocolKind::BridgeAggregator,
            },
            action: if cross_chain { StepAction::Bridge } else { StepAction::Swap },
            from_token: request.input_token.clone(),
            to_token: request.output_token.clone(),
            from_amount: request.amount,
            to_amount: quote.output_amount,
            from_chain_id: request.input_token.chain_id,
            to_chain_id: request.output_token.chain_id,
            estimated_gas: quote.estimated_gas,
            estimated_time_seconds,
            fee_usd: None,
        };
        let mut route = SwapRoute::from_steps(vec![step]);
        // bridge routes name the underlying protocol when the upstream says
        if let Some(bridge) = &quote.bridge_used {
            route.steps[0].protocol = bridge.clone();
        }

        let default_lifetime_ms = self.config.default_deadline_minutes * 60_000;
        let expires_at_ms = match request.deadline_unix_ms {
            Some(deadline) => deadline.max(created_at_ms + default_lifetime_ms),
            None => created_at_ms + default_lifetime_ms,
        };

        SwapQuote {
            id: Uuid::new_v4().to_string(),
            created_at_ms,
            expires_at_ms,
            input_token: request.input_token.clone(),
            output_token: request.output_token.clone(),
            input_amount: request.amount,
            output_amount: quote.output_amount,
            output_amount_min: apply_slippage(quote.output_amount, request.slippage_bps),
            exchange_rate,
            price_impact_pct: quote.price_impact_pct.max(0.0),
            input_amount_usd,
            output_amount_usd,
            gas_cost_usd: gas_cost,
            net_output_usd: output_amount_usd - gas_cost,
            route,
            aggregator: adapter_name.to_string(),
            estimated_gas: quote.estimated_gas,
            slippage_bps: request.slippage_bps,
            tx_data: quote.tx_data.map(|call| vec![call]),
        }
    }

    fn comparison(
        quotes: Vec<SwapQuote>,
        failed: Vec<String>,
        started: Instant,
    ) -> Result<QuoteComparison, SwapError> {
        let best_quote = quotes.first().cloned().ok_or_else(|| SwapError::no_route("empty quote set"))?;
        let worst_net = quotes.last().map(|q| q.net_output_usd).unwrap_or(0.0);
        let savings_usd = best_quote.net_output_usd - worst_net;
        let aggregators_queried = quotes.iter().map(|q| q.aggregator.clone()).collect();
        Ok(QuoteComparison {
            best_quote,
            savings_usd,
            query_time_ms: started.elapsed().as_millis() as u64,
            aggregators_queried,
            aggregators_failed: failed,
            quotes,
        })
    }
}

#[async_trait]
impl UsdcProbe for QuoteService {
    /// Price probe: quote one whole token against same-chain USDC, best raw
    /// output wins. Skips normalization entirely so pricing cannot recurse.
    async fn usdc_value_of_one(&self, token: &Token) -> Option<U256> {
        let usdc = constants::usdc_token(token.chain_id)?;
        if usdc.address == token.address {
            return Some(U256::from(1_000_000u64));
        }
        let request = QuoteRequest {
            input_token: token.clone(),
            output_token: usdc,
            amount: U256::from(10u64).pow(U256::from(token.decimals)),
            amount_kind: AmountKind::FromInput,
            slippage_bps: self.config.default_slippage_bps,
            deadline_unix_ms: None,
            user_address: None,
            referrer: None,
        };

        let eligible: Vec<&Arc<dyn Aggregator>> =
            self.adapters.iter().filter(|a| a.supports(&request)).collect();
        if eligible.is_empty() {
            return None;
        }
        let cancel = CancellationToken::new();
        let results = self.fan_out(&request, &eligible, &cancel).await;
        results
            .into_iter()
            .filter_map(|(_, _, outcome, _)| outcome.ok())
            .map(|quote| quote.output_amount)
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrossFundConfig;
    use crate::constants::{usdc_token, ETHEREUM, POLYGON};
    use crate::error::ErrorKind;
    use crate::provider::ProviderPool;

    fn service() -> QuoteService {
        let caches = Arc::new(EngineCaches::default());
        let client = reqwest::Client::new();
        let providers = Arc::new(ProviderPool::new(client.clone()));
        let prices = Arc::new(PriceOracle::new(client, Arc::clone(&caches)));
        let gas = Arc::new(GasOracle::new(Arc::clone(&caches), providers, Arc::clone(&prices)));
        QuoteService::new(Vec::new(), prices, gas, caches, CrossFundConfig::default())
    }

    fn request() -> QuoteRequest {
        QuoteRequest {
            input_token: usdc_token(ETHEREUM).unwrap(),
            output_token: usdc_token(POLYGON).unwrap(),
            amount: U256::from(1_000_000u64),
            amount_kind: AmountKind::FromInput,
            slippage_bps: 100,
            deadline_unix_ms: None,
            user_address: None,
            referrer: None,
        }
    }

    #[test]
    fn test_validate_rejects_zero_amount() {
        let mut bad = request();
        bad.amount = U256::ZERO;
        assert_eq!(service().validate(&bad).unwrap_err().kind(), ErrorKind::InvalidParams);
    }

    #[test]
    fn test_validate_rejects_unsupported_chain() {
        let mut bad = request();
        bad.output_token.chain_id = 4242;
        assert_eq!(
            service().validate(&bad).unwrap_err().kind(),
            ErrorKind::UnsupportedChain
        );
    }

    #[test]
    fn test_validate_rejects_absurd_slippage() {
        let mut bad = request();
        bad.slippage_bps = 10_000;
        assert_eq!(service().validate(&bad).unwrap_err().kind(), ErrorKind::InvalidParams);
    }

    #[tokio::test]
    async fn test_no_eligible_adapters_is_no_route() {
        let err = service()
            .get_quotes(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoRouteFound);
    }
}
