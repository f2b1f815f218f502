use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapters::{default_adapters, Aggregator};
use crate::cache::EngineCaches;
use crate::config::CrossFundConfig;
use crate::constants;
use crate::error::SwapError;
use crate::execution::executor::BridgeWatcher;
use crate::execution::{BridgeStatusPoller, TransactionBuilder, TransactionExecutor};
use crate::oracle::{GasOracle, PriceOracle, UsdcProbe};
use crate::provider::ProviderPool;
use crate::quotes::QuoteService;
use crate::types::{
    looks_like_raw_amount, now_ms, parse_units, AmountKind, ApprovalCheck, PreparedSwap,
    QuoteComparison, QuoteRequest, SwapExecution, SwapQuote, SwapResult, Token,
};

/// Executions are refused above this price impact.
pub const MAX_PRICE_IMPACT_PCT: f64 = 5.0;

/// Per-call options for the quote entry points.
#[derive(Debug, Clone, Default)]
pub struct QuoteOptions {
    pub amount_kind: Option<AmountKind>,
    pub slippage_bps: Option<u32>,
    pub deadline_unix_ms: Option<u64>,
    pub user_address: Option<Address>,
    pub referrer: Option<String>,
}

/// Everything `execute_swap` needs in one place.
#[derive(Debug, Clone)]
pub struct SwapParams {
    pub input_token: Token,
    pub output_token: Token,
    /// Raw smallest units or a human decimal string (heuristic applies).
    pub amount: String,
    pub amount_kind: AmountKind,
    pub slippage_bps: Option<u32>,
    pub deadline_unix_ms: Option<u64>,
    pub user_address: Address,
    pub recipient: Option<Address>,
    pub referrer: Option<String>,
}

/// The public face of the engine: quote, compare, prepare, execute.
pub struct CrossFund {
    config: CrossFundConfig,
    providers: Arc<ProviderPool>,
    quotes: Arc<QuoteService>,
    builder: TransactionBuilder,
    executor: TransactionExecutor,
}

impl CrossFund {
    pub fn new(config: CrossFundConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .expect("failed to build HTTP client");
        let adapters = default_adapters(&config, client.clone());
        let watcher: Arc<dyn BridgeWatcher> = Arc::new(BridgeStatusPoller::new(client.clone()));
        Self::assemble(config, client, adapters, watcher)
    }

    /// Construction with injected adapters and bridge watcher; the path tests
    /// and embedders with custom upstreams use.
    pub fn with_components(
        config: CrossFundConfig,
        adapters: Vec<Arc<dyn Aggregator>>,
        watcher: Arc<dyn BridgeWatcher>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .expect("failed to build HTTP client");
        Self::assemble(config, client, adapters, watcher)
    }

    fn assemble(
        config: CrossFundConfig,
        client: reqwest::Client,
        adapters: Vec<Arc<dyn Aggregator>>,
        watcher: Arc<dyn BridgeWatcher>,
    ) -> Self {
        let caches = Arc::new(EngineCaches::new(config.cache_ttl_ms));
        let providers = Arc::new(ProviderPool::new(client.clone()));
        let prices = Arc::new(PriceOracle::new(client, Arc::clone(&caches)));
        let gas = Arc::new(GasOracle::new(
            Arc::clone(&caches),
            Arc::clone(&providers),
            Arc::clone(&prices),
        ));
        let quotes = Arc::new(QuoteService::new(
            adapters,
            Arc::clone(&prices),
            Arc::clone(&gas),
            caches,
            config.clone(),
        ));
        // the quote service doubles as the oracle's swap probe
        let probe: Arc<dyn UsdcProbe> = Arc::clone(&quotes) as Arc<dyn UsdcProbe>;
        prices.set_probe(&probe);

        let builder = TransactionBuilder::new(Arc::clone(&providers), Arc::clone(&gas));
        let executor = TransactionExecutor::new(Arc::clone(&providers), watcher);

        Self {
            config,
            providers,
            quotes,
            builder,
            executor,
        }
    }

    /// The provider pool, for registering custom RPC backends.
    pub fn provider_pool(&self) -> Arc<ProviderPool> {
        Arc::clone(&self.providers)
    }

    pub fn config(&self) -> &CrossFundConfig {
        &self.config
    }

    // ── Quoting ──────────────────────────────────────────────────────

    pub async fn get_quote(
        &self,
        input_token: &Token,
        output_token: &Token,
        amount: &str,
        options: Option<QuoteOptions>,
    ) -> Result<SwapQuote, SwapError> {
        Ok(self
            .get_quotes(input_token, output_token, amount, options)
            .await?
            .best_quote)
    }

    pub async fn get_quotes(
        &self,
        input_token: &Token,
        output_token: &Token,
        amount: &str,
        options: Option<QuoteOptions>,
    ) -> Result<QuoteComparison, SwapError> {
        let request = self.make_request(input_token, output_token, amount, options.unwrap_or_default())?;
        self.quotes.get_quotes(&request, &CancellationToken::new()).await
    }

    // ── Preparation ──────────────────────────────────────────────────

    /// Quote plus the buildable transaction list, without signing anything.
    pub async fn prepare_transactions(
        &self,
        input_token: &Token,
        output_token: &Token,
        amount: &str,
        user_address: Address,
        options: Option<QuoteOptions>,
    ) -> Result<PreparedSwap, SwapError> {
        let mut options = options.unwrap_or_default();
        options.user_address = Some(user_address);
        let comparison = self.get_quotes(input_token, output_token, amount, Some(options)).await?;
        let quote = best_executable(&comparison)?;
        let transactions = self.builder.build_transactions(&quote, user_address).await?;

        let estimated_gas_total: u64 = transactions.iter().map(|t| t.estimated_gas).sum();
        // approvals do not change the quote's own gas figure, so cost scales
        // off the quote's USD estimate
        let estimated_cost_usd = if quote.estimated_gas > 0 {
            quote.gas_cost_usd * estimated_gas_total as f64 / quote.estimated_gas as f64
        } else {
            quote.gas_cost_usd
        };

        Ok(PreparedSwap {
            quote,
            transactions,
            estimated_gas_total,
            estimated_cost_usd,
        })
    }

    pub async fn check_approval(
        &self,
        token: &Token,
        owner: Address,
        amount: U256,
        spender: Address,
    ) -> Result<ApprovalCheck, SwapError> {
        self.builder.check_approval(token, owner, amount, spender).await
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Refresh the quote, enforce the preflight ceilings, then sign and drive
    /// the sequence to completion.
    pub async fn execute_swap(
        &self,
        params: SwapParams,
        signer: &dyn crate::execution::TransactionSigner,
    ) -> SwapResult {
        let cancel = CancellationToken::new();
        self.execute_swap_with_cancel(params, signer, &cancel).await
    }

    pub async fn execute_swap_with_cancel(
        &self,
        params: SwapParams,
        signer: &dyn crate::execution::TransactionSigner,
        cancel: &CancellationToken,
    ) -> SwapResult {
        let options = QuoteOptions {
            amount_kind: Some(params.amount_kind),
            slippage_bps: params.slippage_bps,
            deadline_unix_ms: params.deadline_unix_ms,
            user_address: Some(params.user_address),
            referrer: params.referrer.clone(),
        };
        let comparison = match self
            .get_quotes(&params.input_token, &params.output_token, &params.amount, Some(options))
            .await
        {
            Ok(comparison) => comparison,
            Err(error) => return failed_result("", error),
        };
        let quote = match best_executable(&comparison) {
            Ok(quote) => quote,
            Err(error) => return failed_result("", error),
        };
        self.execute_quote(&quote, signer, cancel).await
    }

    /// Execute an already-held quote. Expiry and price impact are enforced
    /// here, immediately before the executor takes over.
    pub async fn execute_quote(
        &self,
        quote: &SwapQuote,
        signer: &dyn crate::execution::TransactionSigner,
        cancel: &CancellationToken,
    ) -> SwapResult {
        if let Err(error) = preflight(quote) {
            return failed_result(&quote.id, error);
        }
        let user = match signer.address().await {
            Ok(user) => user,
            Err(error) => return failed_result(&quote.id, error),
        };
        let transactions = match self.builder.build_transactions(quote, user).await {
            Ok(transactions) => transactions,
            Err(error) => return failed_result(&quote.id, error),
        };
        info!(
            "executing quote {} via {} ({} steps)",
            quote.id,
            quote.aggregator,
            transactions.len()
        );
        self.executor.execute(quote, transactions, signer, cancel).await
    }

    // ── Registry accessors ───────────────────────────────────────────

    pub fn get_usdc(&self, chain_id: u64) -> Option<Token> {
        constants::usdc_token(chain_id)
    }

    pub fn get_native_token(&self, chain_id: u64) -> Option<Token> {
        constants::native_token(chain_id)
    }

    pub fn is_supported_chain(&self, chain_id: u64) -> bool {
        constants::is_supported_chain(chain_id)
    }

    pub fn get_supported_chains(&self) -> Vec<u64> {
        constants::supported_chains()
    }

    pub fn get_chain_name(&self, chain_id: u64) -> Option<&'static str> {
        constants::chain_name(chain_id)
    }

    pub fn get_explorer_tx_url(&self, chain_id: u64, tx_hash: &str) -> Option<String> {
        constants::explorer_tx_url(chain_id, tx_hash)
    }

    pub async fn adapter_metrics(
        &self,
    ) -> std::collections::HashMap<String, crate::adapters::AdapterMetrics> {
        self.quotes.adapter_metrics().await
    }

    // ── Internals ────────────────────────────────────────────────────

    fn make_request(
        &self,
        input_token: &Token,
        output_token: &Token,
        amount: &str,
        options: QuoteOptions,
    ) -> Result<QuoteRequest, SwapError> {
        let amount_kind = options.amount_kind.unwrap_or(AmountKind::FromInput);
        let reference_token = match amount_kind {
            AmountKind::FromInput => input_token,
            AmountKind::FromOutput => output_token,
        };
        let raw = resolve_amount(amount, reference_token)?;
        Ok(QuoteRequest {
            input_token: input_token.clone(),
            output_token: output_token.clone(),
            amount: raw,
            amount_kind,
            slippage_bps: options.slippage_bps.unwrap_or(self.config.default_slippage_bps),
            deadline_unix_ms: options.deadline_unix_ms,
            user_address: options.user_address,
            referrer: options.referrer,
        })
    }
}

/// Raw smallest units when the heuristic says so, otherwise a human decimal
/// string floored at the token's decimals.
pub fn resolve_amount(amount: &str, token: &Token) -> Result<U256, SwapError> {
    if looks_like_raw_amount(amount) {
        U256::from_str_radix(amount, 10)
            .map_err(|_| SwapError::invalid_params(format!("invalid raw amount: {amount}")))
    } else {
        parse_units(amount, token.decimals)
    }
}

/// Highest-ranked quote that actually carries executable transaction data.
fn best_executable(comparison: &QuoteComparison) -> Result<SwapQuote, SwapError> {
    comparison
        .quotes
        .iter()
        .find(|quote| quote.tx_data.as_ref().is_some_and(|calls| !calls.is_empty()))
        .cloned()
        .ok_or_else(|| SwapError::no_route("no quote carries executable transaction data"))
}

fn preflight(quote: &SwapQuote) -> Result<(), SwapError> {
    let now = now_ms();
    if quote.is_expired(now) {
        return Err(SwapError::QuoteExpired {
            expired_at_ms: quote.expires_at_ms,
        });
    }
    if quote.price_impact_pct > MAX_PRICE_IMPACT_PCT {
        return Err(SwapError::PriceImpactTooHigh {
            impact_pct: quote.price_impact_pct,
            max_pct: MAX_PRICE_IMPACT_PCT,
        });
    }
    Ok(())
}

fn failed_result(quote_id: &str, error: SwapError) -> SwapResult {
    let mut execution = SwapExecution::new(quote_id, Vec::new());
    execution.status = crate::types::ExecutionStatus::Failed;
    SwapResult {
        success: false,
        tx_hashes: Vec::new(),
        execution,
        error: Some(error),
    }
}
