use alloy::primitives::{Address, U256};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::constants::is_native_address;
use crate::error::SwapError;

/// ERC-20 token (or native currency under the sentinel address).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    pub name: Option<String>,
    pub logo_uri: Option<String>,
    pub price_usd: Option<f64>,
}

impl Token {
    pub fn new(address: Address, chain_id: u64, symbol: &str, decimals: u8) -> Self {
        Self {
            address,
            chain_id,
            symbol: symbol.to_string(),
            decimals,
            name: None,
            logo_uri: None,
            price_usd: None,
        }
    }

    pub fn is_native(&self) -> bool {
        is_native_address(self.address)
    }

    /// Identity key: `(chain_id, lowercased address)`.
    pub fn key(&self) -> (u64, String) {
        (self.chain_id, format!("{:#x}", self.address))
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Token {}

/// Which side of the trade the amount refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AmountKind {
    FromInput,
    FromOutput,
}

/// A validated swap request, amounts already in smallest units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub input_token: Token,
    pub output_token: Token,
    pub amount: U256,
    pub amount_kind: AmountKind,
    pub slippage_bps: u32,
    pub deadline_unix_ms: Option<u64>,
    pub user_address: Option<Address>,
    pub referrer: Option<String>,
}

impl QuoteRequest {
    pub fn is_cross_chain(&self) -> bool {
        self.input_token.chain_id != self.output_token.chain_id
    }
}

/// Protocol category of a route step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    Dex,
    DexAggregator,
    Bridge,
    BridgeAggregator,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Swap,
    Bridge,
    Wrap,
    Unwrap,
    Approve,
}

/// One hop of a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStep {
    pub protocol: String,
    pub protocol_type: ProtocolKind,
    pub action: StepAction,
    pub from_token: Token,
    pub to_token: Token,
    pub from_amount: U256,
    pub to_amount: U256,
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub estimated_gas: u64,
    pub estimated_time_seconds: u64,
    pub fee_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRoute {
    pub steps: Vec<RouteStep>,
    pub is_cross_chain: bool,
}

impl SwapRoute {
    pub fn from_steps(steps: Vec<RouteStep>) -> Self {
        let is_cross_chain = steps
            .first()
            .zip(steps.last())
            .map(|(a, b)| a.from_chain_id != b.to_chain_id)
            .unwrap_or(false);
        Self { steps, is_cross_chain }
    }

    pub fn estimated_time_seconds(&self) -> u64 {
        self.steps.iter().map(|s| s.estimated_time_seconds).sum()
    }
}

/// Ready-to-sign call returned by an upstream aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedCall {
    pub to: Address,
    pub data: String,
    pub value: U256,
    pub gas: Option<u64>,
}

/// Canonical normalized quote. Produced by the quote service, owned by the
/// caller, invalid after `expires_at_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapQuote {
    pub id: String,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,

    pub input_token: Token,
    pub output_token: Token,
    pub input_amount: U256,
    pub output_amount: U256,
    /// Floor of `output_amount · (10000 − slippage_bps) / 10000`.
    pub output_amount_min: U256,

    /// Output per input in human units, 8 decimal places.
    pub exchange_rate: String,
    pub price_impact_pct: f64,
    pub input_amount_usd: f64,
    pub output_amount_usd: f64,
    pub gas_cost_usd: f64,
    /// `output_amount_usd − gas_cost_usd`, the ranking key.
    pub net_output_usd: f64,

    pub route: SwapRoute,
    pub aggregator: String,
    pub estimated_gas: u64,
    pub slippage_bps: u32,
    pub tx_data: Option<Vec<PreparedCall>>,
}

impl SwapQuote {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxnType {
    Approval,
    Swap,
    Bridge,
    Wrap,
    Unwrap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxnStatus {
    Created,
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

/// Gas fields for a transaction; EIP-1559 only on supporting chains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GasFee {
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
    Legacy {
        gas_price: U256,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenApproval {
    pub token: Token,
    pub spender: Address,
    pub amount: U256,
}

/// A single on-chain transaction to be signed. Mutated only by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxnData {
    pub id: String,
    #[serde(rename = "type")]
    pub txn_type: TxnType,
    pub chain_id: u64,
    pub to: Address,
    pub from: Address,
    pub data: String,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_fee: GasFee,
    pub nonce: Option<u64>,
    pub description: String,
    pub estimated_gas: u64,
    pub token_approval: Option<TokenApproval>,
    /// Position in the execution sequence; total order.
    pub order: u32,
    /// Id of the transaction that must confirm before this one.
    pub depends_on: Option<String>,
    pub status: TxnStatus,
    pub tx_hash: Option<String>,
    pub confirmations: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Preparing,
    Approving,
    Swapping,
    Bridging,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BridgeTransferState {
    InProgress,
    Completed,
    Failed,
}

/// Last observed bridge-status poll for a cross-chain execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatusInfo {
    pub provider: String,
    pub state: BridgeTransferState,
    pub destination_tx_hash: Option<String>,
    pub last_checked_ms: u64,
}

/// Tracker for a multi-step swap execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapExecution {
    pub quote_id: String,
    pub transactions: Vec<TxnData>,
    pub status: ExecutionStatus,
    pub current_step: usize,
    pub total_steps: usize,
    pub started_at_ms: u64,
    pub completed_at_ms: Option<u64>,
    pub source_tx_hash: Option<String>,
    pub destination_tx_hash: Option<String>,
    pub bridge_status: Option<BridgeStatusInfo>,
}

impl SwapExecution {
    pub fn new(quote_id: &str, transactions: Vec<TxnData>) -> Self {
        let total_steps = transactions.len();
        Self {
            quote_id: quote_id.to_string(),
            transactions,
            status: ExecutionStatus::Preparing,
            current_step: 0,
            total_steps,
            started_at_ms: now_ms(),
            completed_at_ms: None,
            source_tx_hash: None,
            destination_tx_hash: None,
            bridge_status: None,
        }
    }
}

/// One gas tier (legacy price plus optional EIP-1559 fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasTier {
    pub gas_price: U256,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub estimated_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasPrices {
    pub chain_id: u64,
    pub slow: GasTier,
    pub standard: GasTier,
    pub fast: GasTier,
    pub native_token_price_usd: f64,
}

/// Result of fanning a request out to every eligible aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteComparison {
    /// Sorted descending by `net_output_usd`.
    pub quotes: Vec<SwapQuote>,
    pub best_quote: SwapQuote,
    /// Best minus worst net output.
    pub savings_usd: f64,
    pub query_time_ms: u64,
    pub aggregators_queried: Vec<String>,
    pub aggregators_failed: Vec<String>,
}

/// Quote plus buildable transactions, for preview before signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedSwap {
    pub quote: SwapQuote,
    pub transactions: Vec<TxnData>,
    pub estimated_gas_total: u64,
    pub estimated_cost_usd: f64,
}

/// Outcome of `execute_swap`. On failure the execution is frozen at the
/// failed step so callers can reason about partial progress.
#[derive(Debug)]
pub struct SwapResult {
    pub success: bool,
    pub tx_hashes: Vec<String>,
    pub execution: SwapExecution,
    pub error: Option<SwapError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalCheck {
    pub needs_approval: bool,
    pub current_allowance: U256,
    pub required_allowance: U256,
}

pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// `⌊amount · (10000 − slippage_bps) / 10000⌋`
pub fn apply_slippage(amount: U256, slippage_bps: u32) -> U256 {
    amount * U256::from(10_000 - slippage_bps as u64) / U256::from(10_000u64)
}

/// Raw-amount heuristic: no decimal point and more than 10 characters means
/// the value is already in smallest units.
pub fn looks_like_raw_amount(value: &str) -> bool {
    !value.contains('.') && value.len() > 10
}

/// Parse a human-readable decimal string into smallest units, flooring at the
/// token's decimals.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256, SwapError> {
    let d = Decimal::from_str(value.trim())
        .map_err(|_| SwapError::invalid_params(format!("invalid amount: {value}")))?;
    if d.is_sign_negative() {
        return Err(SwapError::invalid_params(format!("negative amount: {value}")));
    }
    let scale = Decimal::from(10u64.pow(decimals as u32));
    let scaled = d
        .checked_mul(scale)
        .ok_or_else(|| SwapError::invalid_params(format!("amount out of range: {value}")))?
        .trunc();
    U256::from_str_radix(&scaled.to_string(), 10)
        .map_err(|_| SwapError::invalid_params(format!("amount out of range: {value}")))
}

/// Format smallest units as a human-readable decimal string, trailing zeros
/// trimmed.
pub fn format_units(value: U256, decimals: u8) -> String {
    let raw = value.to_string();
    if decimals == 0 {
        return raw;
    }
    let d = decimals as usize;
    let padded = if raw.len() <= d {
        format!("{}{}", "0".repeat(d - raw.len() + 1), raw)
    } else {
        raw
    };
    let (int, frac) = padded.split_at(padded.len() - d);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}
