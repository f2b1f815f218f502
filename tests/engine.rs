//! End-to-end engine tests with mocked upstreams: aggregators, chain
//! providers, bridge watcher, and signer.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crossfund::adapters::{AdapterQuote, Aggregator, AggregatorKind};
use crossfund::constants::{native_token, usdc_token, ARBITRUM, ETHEREUM, POLYGON};
use crossfund::engine::QuoteOptions;
use crossfund::error::{ErrorKind, SwapError};
use crossfund::execution::executor::BridgeWatcher;
use crossfund::types::{
    now_ms, AmountKind, BridgeStatusInfo, BridgeTransferState, ExecutionStatus, PreparedCall,
    QuoteRequest, SwapRoute, TxnData, TxnStatus, TxnType,
};
use crossfund::{
    ChainProvider, CrossFund, CrossFundConfig, PendingTransaction, SwapParams, TransactionSigner,
    TxReceipt,
};

// ── Mock upstream aggregator ─────────────────────────────────────────

#[derive(Clone)]
enum Behavior {
    /// Succeed with this raw output amount.
    Quote {
        output: u128,
        impact_pct: f64,
        with_tx: bool,
        bridge_used: Option<&'static str>,
        time_seconds: Option<u64>,
    },
    /// Fail every call with this HTTP status.
    Http(u16),
}

struct MockAggregator {
    name: &'static str,
    kind: AggregatorKind,
    chains: Vec<u64>,
    behavior: Behavior,
    calls: AtomicU32,
}

impl MockAggregator {
    fn dex(name: &'static str, output: u128) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind: AggregatorKind::DexAggregator,
            chains: vec![ETHEREUM, POLYGON, ARBITRUM],
            behavior: Behavior::Quote {
                output,
                impact_pct: 0.2,
                with_tx: true,
                bridge_used: None,
                time_seconds: None,
            },
            calls: AtomicU32::new(0),
        })
    }

    fn dex_with(name: &'static str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind: AggregatorKind::DexAggregator,
            chains: vec![ETHEREUM, POLYGON, ARBITRUM],
            behavior,
            calls: AtomicU32::new(0),
        })
    }

    fn bridge(name: &'static str, output: u128, used: &'static str, seconds: u64) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind: AggregatorKind::BridgeAggregator,
            chains: vec![ETHEREUM, POLYGON, ARBITRUM],
            behavior: Behavior::Quote {
                output,
                impact_pct: 0.05,
                with_tx: true,
                bridge_used: Some(used),
                time_seconds: Some(seconds),
            },
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Aggregator for MockAggregator {
    fn name(&self) -> &'static str {
        self.name
    }
    fn kind(&self) -> AggregatorKind {
        self.kind
    }
    fn supported_chains(&self) -> &[u64] {
        &self.chains
    }
    async fn fetch_quote(&self, request: &QuoteRequest) -> Result<AdapterQuote, SwapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Http(status) => Err(crossfund::classify_http(*status, "mock upstream error")),
            Behavior::Quote {
                output,
                impact_pct,
                with_tx,
                bridge_used,
                time_seconds,
            } => Ok(AdapterQuote {
                output_amount: U256::from(*output),
                estimated_gas: 150_000,
                price_impact_pct: *impact_pct,
                tx_data: with_tx.then(|| PreparedCall {
                    to: spender(),
                    data: "0xdeadbeef".to_string(),
                    value: if request.input_token.is_native() {
                        request.amount
                    } else {
                        U256::ZERO
                    },
                    gas: Some(160_000),
                }),
                bridge_used: bridge_used.map(str::to_string),
                estimated_time_seconds: *time_seconds,
            }),
        }
    }
}

fn spender() -> Address {
    "0xdef1c0ded9bec7f1a1670819833240f027b25eff".parse().unwrap()
}

// ── Mock chain provider / signer / watcher ───────────────────────────

#[derive(Debug)]
struct MockProvider {
    chain_id: u64,
    balance: U256,
    allowance: U256,
}

#[async_trait]
impl ChainProvider for MockProvider {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }
    async fn get_balance(&self, _address: Address) -> Result<U256, SwapError> {
        Ok(self.balance)
    }
    async fn get_erc20_balance(&self, _token: Address, _owner: Address) -> Result<U256, SwapError> {
        Ok(self.balance)
    }
    async fn get_allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, SwapError> {
        Ok(self.allowance)
    }
    async fn gas_price(&self) -> Result<U256, SwapError> {
        Ok(U256::from(20_000_000_000u64))
    }
    async fn estimate_gas(
        &self,
        _from: Address,
        _to: Address,
        _data: &str,
        _value: U256,
    ) -> Result<u64, SwapError> {
        Ok(150_000)
    }
}

struct OkPending(String);

#[async_trait]
impl PendingTransaction for OkPending {
    fn hash(&self) -> String {
        self.0.clone()
    }
    async fn wait(&self, _confirmations: u32) -> Result<TxReceipt, SwapError> {
        Ok(TxReceipt {
            tx_hash: self.0.clone(),
            status: 1,
            block_number: Some(100),
            gas_used: Some(120_000),
        })
    }
}

struct MockSigner {
    sent: AtomicUsize,
}

impl MockSigner {
    fn new() -> Self {
        Self {
            sent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn address(&self) -> Result<Address, SwapError> {
        Ok("0x00000000000000000000000000000000000000aa".parse().unwrap())
    }
    async fn send_transaction(&self, _txn: &TxnData) -> Result<Box<dyn PendingTransaction>, SwapError> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(OkPending(format!("0xhash{n}"))))
    }
}

struct InstantWatcher;

#[async_trait]
impl BridgeWatcher for InstantWatcher {
    async fn wait_for_destination(
        &self,
        aggregator: &str,
        _bridge: Option<&str>,
        _source_chain_id: u64,
        _source_tx_hash: &str,
        _cancel: &CancellationToken,
    ) -> Result<BridgeStatusInfo, SwapError> {
        Ok(BridgeStatusInfo {
            provider: aggregator.to_string(),
            state: BridgeTransferState::Completed,
            destination_tx_hash: Some("0xdest".to_string()),
            last_checked_ms: now_ms(),
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────

fn fast_config() -> CrossFundConfig {
    CrossFundConfig {
        retry_delay_ms: 1,
        ..Default::default()
    }
}

async fn engine_with(adapters: Vec<Arc<dyn Aggregator>>, allowance: U256) -> CrossFund {
    let engine = CrossFund::with_components(fast_config(), adapters, Arc::new(InstantWatcher));
    for chain in [ETHEREUM, POLYGON, ARBITRUM] {
        engine
            .provider_pool()
            .register(Arc::new(MockProvider {
                chain_id: chain,
                balance: U256::from(u128::MAX),
                allowance,
            }))
            .await;
    }
    engine
}

fn as_aggregators(mocks: Vec<Arc<MockAggregator>>) -> Vec<Arc<dyn Aggregator>> {
    mocks.into_iter().map(|m| m as Arc<dyn Aggregator>).collect()
}

// ── Quoting ──────────────────────────────────────────────────────────

#[tokio::test]
async fn same_chain_comparison_tolerates_one_failure() {
    // five healthy DEX aggregators plus one returning HTTP 400
    let mocks = vec![
        MockAggregator::dex("alpha", 295_000_000_000_000_000),
        MockAggregator::dex("bravo", 297_500_000_000_000_000),
        MockAggregator::dex("charlie", 294_000_000_000_000_000),
        MockAggregator::dex("delta", 296_000_000_000_000_000),
        MockAggregator::dex("echo", 295_500_000_000_000_000),
        MockAggregator::dex_with("broken", Behavior::Http(400)),
    ];
    let engine = engine_with(as_aggregators(mocks), U256::MAX).await;

    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();
    let comparison = engine.get_quotes(&usdc, &eth, "1000", None).await.unwrap();

    assert_eq!(comparison.quotes.len(), 5);
    assert_eq!(comparison.aggregators_failed, vec!["broken".to_string()]);
    assert_eq!(comparison.best_quote.aggregator, "bravo");

    // descending by net output, best equals the maximum
    for pair in comparison.quotes.windows(2) {
        assert!(pair[0].net_output_usd >= pair[1].net_output_usd);
    }
    let max_net = comparison
        .quotes
        .iter()
        .map(|q| q.net_output_usd)
        .fold(f64::MIN, f64::max);
    assert_eq!(comparison.best_quote.net_output_usd, max_net);
    let min_net = comparison
        .quotes
        .iter()
        .map(|q| q.net_output_usd)
        .fold(f64::MAX, f64::min);
    assert!((comparison.savings_usd - (max_net - min_net)).abs() < 1e-9);

    // universal quote invariants
    for quote in &comparison.quotes {
        assert_eq!(
            quote.output_amount_min,
            quote.output_amount * U256::from(9_900u64) / U256::from(10_000u64)
        );
        assert!(quote.expires_at_ms > quote.created_at_ms);
        assert!(quote.price_impact_pct >= 0.0);
        assert_eq!(quote.slippage_bps, 100);
    }
}

#[tokio::test]
async fn cross_chain_request_selects_bridge_aggregators_only() {
    let dex = MockAggregator::dex("dexonly", 1_000_000);
    let socket = MockAggregator::bridge("Socket", 499_000_000, "stargate", 180);
    let lifi = MockAggregator::bridge("LiFi", 498_500_000, "across", 240);
    let engine = engine_with(as_aggregators(vec![dex.clone(), socket, lifi]), U256::MAX).await;

    let from = usdc_token(POLYGON).unwrap();
    let to = usdc_token(ARBITRUM).unwrap();
    let comparison = engine.get_quotes(&from, &to, "500", None).await.unwrap();

    assert_eq!(comparison.quotes.len(), 2);
    assert_eq!(dex.calls.load(Ordering::SeqCst), 0);
    for quote in &comparison.quotes {
        assert!(quote.route.is_cross_chain);
        assert!(quote.route.steps[0].estimated_time_seconds >= 60);
    }
    // the route step names the underlying bridge protocol
    assert_eq!(comparison.best_quote.aggregator, "Socket");
    assert_eq!(comparison.best_quote.route.steps[0].protocol, "stargate");
}

#[tokio::test]
async fn quote_cache_returns_identical_quote_within_ttl() {
    let engine = engine_with(
        as_aggregators(vec![MockAggregator::dex("alpha", 295_000_000_000_000_000)]),
        U256::MAX,
    )
    .await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();

    let first = engine.get_quotes(&usdc, &eth, "1000", None).await.unwrap();
    let second = engine.get_quotes(&usdc, &eth, "1000", None).await.unwrap();

    assert_eq!(first.best_quote.id, second.best_quote.id);
    assert_eq!(first.best_quote.created_at_ms, second.best_quote.created_at_ms);
    assert_eq!(first.best_quote.output_amount, second.best_quote.output_amount);
    assert!(second.aggregators_failed.is_empty());
}

#[tokio::test]
async fn rate_limited_adapter_retries_then_reports_failure() {
    let limited = MockAggregator::dex_with("throttled", Behavior::Http(429));
    let healthy = MockAggregator::dex("alpha", 295_000_000_000_000_000);
    let engine = engine_with(as_aggregators(vec![limited.clone(), healthy]), U256::MAX).await;

    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();
    let comparison = engine.get_quotes(&usdc, &eth, "1000", None).await.unwrap();

    // initial attempt plus three retries
    assert_eq!(limited.calls.load(Ordering::SeqCst), 4);
    assert_eq!(comparison.aggregators_failed, vec!["throttled".to_string()]);
    assert_eq!(comparison.quotes.len(), 1);
}

#[tokio::test]
async fn caller_deadline_extends_quote_expiry() {
    let engine = engine_with(
        as_aggregators(vec![MockAggregator::dex("alpha", 295_000_000_000_000_000)]),
        U256::MAX,
    )
    .await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();

    let deadline = now_ms() + 60 * 60_000;
    let options = QuoteOptions {
        deadline_unix_ms: Some(deadline),
        ..Default::default()
    };
    let quote = engine.get_quote(&usdc, &eth, "1000", Some(options)).await.unwrap();
    assert_eq!(quote.expires_at_ms, deadline);
}

// ── Preparation ──────────────────────────────────────────────────────

#[tokio::test]
async fn prepare_prepends_approval_when_allowance_is_short() {
    let engine = engine_with(
        as_aggregators(vec![MockAggregator::dex("alpha", 295_000_000_000_000_000)]),
        U256::ZERO,
    )
    .await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();
    let user: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();

    let prepared = engine
        .prepare_transactions(&usdc, &eth, "1000", user, None)
        .await
        .unwrap();

    assert_eq!(prepared.transactions.len(), 2);
    let approval = &prepared.transactions[0];
    let swap = &prepared.transactions[1];

    assert_eq!(approval.txn_type, TxnType::Approval);
    assert_eq!(approval.order, 0);
    assert_eq!(approval.to, usdc.address);
    assert!(approval.data.starts_with("0x095ea7b3"));
    assert!(approval.data.ends_with(&"f".repeat(64))); // approve(spender, MAX_UINT256)
    let token_approval = approval.token_approval.as_ref().unwrap();
    assert_eq!(token_approval.token, usdc);
    assert_eq!(token_approval.spender, spender());
    assert_eq!(token_approval.amount, U256::MAX);

    assert_eq!(swap.txn_type, TxnType::Swap);
    assert_eq!(swap.order, 1);
    assert_eq!(swap.depends_on.as_deref(), Some(approval.id.as_str()));
    assert_eq!(swap.status, TxnStatus::Created);

    assert_eq!(
        prepared.estimated_gas_total,
        prepared.transactions.iter().map(|t| t.estimated_gas).sum::<u64>()
    );
}

#[tokio::test]
async fn prepare_skips_approval_when_allowance_covers() {
    let engine = engine_with(
        as_aggregators(vec![MockAggregator::dex("alpha", 295_000_000_000_000_000)]),
        U256::MAX,
    )
    .await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();
    let user: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();

    let prepared = engine
        .prepare_transactions(&usdc, &eth, "1000", user, None)
        .await
        .unwrap();
    assert_eq!(prepared.transactions.len(), 1);
    assert_eq!(prepared.transactions[0].txn_type, TxnType::Swap);
    assert!(prepared.transactions[0].depends_on.is_none());
}

// ── Execution ────────────────────────────────────────────────────────

#[tokio::test]
async fn expired_quote_is_rejected_before_signing() {
    let engine = engine_with(
        as_aggregators(vec![MockAggregator::dex("alpha", 295_000_000_000_000_000)]),
        U256::MAX,
    )
    .await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();

    let mut quote = engine.get_quote(&usdc, &eth, "1000", None).await.unwrap();
    quote.expires_at_ms = now_ms() - 1;

    let signer = MockSigner::new();
    let result = engine
        .execute_quote(&quote, &signer, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind(), ErrorKind::QuoteExpired);
    assert!(result.tx_hashes.is_empty());
    assert_eq!(signer.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn excessive_price_impact_is_rejected() {
    let steep = MockAggregator::dex_with(
        "steep",
        Behavior::Quote {
            output: 250_000_000_000_000_000,
            impact_pct: 9.0,
            with_tx: true,
            bridge_used: None,
            time_seconds: None,
        },
    );
    let engine = engine_with(as_aggregators(vec![steep]), U256::MAX).await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();

    let signer = MockSigner::new();
    let params = SwapParams {
        input_token: usdc,
        output_token: eth,
        amount: "1000".to_string(),
        amount_kind: AmountKind::FromInput,
        slippage_bps: None,
        deadline_unix_ms: None,
        user_address: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
        recipient: None,
        referrer: None,
    };
    let result = engine.execute_swap(params, &signer).await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind(), ErrorKind::PriceImpactTooHigh);
    assert!(result.tx_hashes.is_empty());
    assert_eq!(signer.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn same_chain_swap_executes_to_completion() {
    let engine = engine_with(
        as_aggregators(vec![MockAggregator::dex("alpha", 295_000_000_000_000_000)]),
        U256::MAX,
    )
    .await;
    let usdc = usdc_token(ETHEREUM).unwrap();
    let eth = native_token(ETHEREUM).unwrap();

    let signer = MockSigner::new();
    let params = SwapParams {
        input_token: usdc,
        output_token: eth,
        amount: "1000".to_string(),
        amount_kind: AmountKind::FromInput,
        slippage_bps: Some(50),
        deadline_unix_ms: None,
        user_address: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
        recipient: None,
        referrer: None,
    };
    let result = engine.execute_swap(params, &signer).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.tx_hashes, vec!["0xhash0".to_string()]);
    assert_eq!(result.execution.status, ExecutionStatus::Completed);
    assert_eq!(result.execution.current_step, result.execution.total_steps);
    assert!(result.execution.completed_at_ms.is_some());
}

#[tokio::test]
async fn cross_chain_swap_completes_via_bridge_watcher() {
    let socket = MockAggregator::bridge("Socket", 499_000_000, "stargate", 180);
    let engine = engine_with(as_aggregators(vec![socket]), U256::MAX).await;
    let from = usdc_token(POLYGON).unwrap();
    let to = usdc_token(ARBITRUM).unwrap();

    let signer = MockSigner::new();
    let params = SwapParams {
        input_token: from,
        output_token: to,
        amount: "500".to_string(),
        amount_kind: AmountKind::FromInput,
        slippage_bps: None,
        deadline_unix_ms: None,
        user_address: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
        recipient: None,
        referrer: None,
    };
    let result = engine.execute_swap(params, &signer).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.execution.status, ExecutionStatus::Completed);
    assert_eq!(result.execution.source_tx_hash.as_deref(), Some("0xhash0"));
    assert_eq!(result.execution.destination_tx_hash.as_deref(), Some("0xdest"));
    let status = result.execution.bridge_status.unwrap();
    assert_eq!(status.provider, "Socket");
    assert_eq!(status.state, BridgeTransferState::Completed);
}

// compile-time check that routes serialize (callers persist them)
#[test]
fn route_round_trips_through_serde() {
    let route = SwapRoute {
        steps: vec![],
        is_cross_chain: false,
    };
    let json = serde_json::to_string(&route).unwrap();
    let back: SwapRoute = serde_json::from_str(&json).unwrap();
    assert!(!back.is_cross_chain);
}
