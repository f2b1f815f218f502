use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Closed taxonomy of everything that can go wrong between the caller and the
/// chain. Every upstream failure is mapped into exactly one of these kinds.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum SwapError {
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Insufficient allowance: {current} < {required} for spender {spender}")]
    InsufficientAllowance {
        required: U256,
        current: U256,
        spender: Address,
    },

    #[error("Slippage exceeded (tolerance {slippage_bps} bps)")]
    SlippageExceeded { slippage_bps: u32 },

    #[error("Price impact {impact_pct:.2}% exceeds maximum {max_pct:.2}%")]
    PriceImpactTooHigh { impact_pct: f64, max_pct: f64 },

    #[error("Quote expired at {expired_at_ms}")]
    QuoteExpired { expired_at_ms: u64 },

    #[error("No route found: {reason}")]
    NoRouteFound { reason: String },

    #[error("Bridge transfer not observed within {elapsed_secs}s")]
    BridgeTimeout { elapsed_secs: u64 },

    #[error("Bridge transfer failed: {reason}")]
    BridgeFailed { reason: String },

    #[error("Gas estimation failed: {reason}")]
    GasEstimationFailed { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Transaction reverted: {reason}")]
    TransactionReverted { reason: String },

    #[error("User rejected the request")]
    UserRejected,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {message}")]
    ApiError { status: Option<u16>, message: String },

    #[error("Rate limited by upstream")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error("Unsupported token: {0}")]
    UnsupportedToken(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Discriminant-only view of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InsufficientBalance,
    InsufficientAllowance,
    SlippageExceeded,
    PriceImpactTooHigh,
    QuoteExpired,
    NoRouteFound,
    BridgeTimeout,
    BridgeFailed,
    GasEstimationFailed,
    TransactionFailed,
    TransactionReverted,
    UserRejected,
    NetworkError,
    ApiError,
    RateLimited,
    InvalidParams,
    UnsupportedChain,
    UnsupportedToken,
    UnknownError,
}

/// What the caller should do next, with action parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum RecoveryAction {
    Retry { delay_ms: u64 },
    IncreaseSlippage { suggested_slippage_bps: u32 },
    Approve,
    AddFunds,
    Wait { wait_ms: u64 },
    Abort,
}

impl SwapError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        SwapError::InvalidParams(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        SwapError::NetworkError(message.into())
    }

    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        SwapError::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn no_route(reason: impl Into<String>) -> Self {
        SwapError::NoRouteFound {
            reason: reason.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        SwapError::Unknown(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SwapError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            SwapError::InsufficientAllowance { .. } => ErrorKind::InsufficientAllowance,
            SwapError::SlippageExceeded { .. } => ErrorKind::SlippageExceeded,
            SwapError::PriceImpactTooHigh { .. } => ErrorKind::PriceImpactTooHigh,
            SwapError::QuoteExpired { .. } => ErrorKind::QuoteExpired,
            SwapError::NoRouteFound { .. } => ErrorKind::NoRouteFound,
            SwapError::BridgeTimeout { .. } => ErrorKind::BridgeTimeout,
            SwapError::BridgeFailed { .. } => ErrorKind::BridgeFailed,
            SwapError::GasEstimationFailed { .. } => ErrorKind::GasEstimationFailed,
            SwapError::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            SwapError::TransactionReverted { .. } => ErrorKind::TransactionReverted,
            SwapError::UserRejected => ErrorKind::UserRejected,
            SwapError::NetworkError(_) => ErrorKind::NetworkError,
            SwapError::ApiError { .. } => ErrorKind::ApiError,
            SwapError::RateLimited { .. } => ErrorKind::RateLimited,
            SwapError::InvalidParams(_) => ErrorKind::InvalidParams,
            SwapError::UnsupportedChain(_) => ErrorKind::UnsupportedChain,
            SwapError::UnsupportedToken(_) => ErrorKind::UnsupportedToken,
            SwapError::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    /// Whether the failure can clear without code changes: either by the retry
    /// combinator or by a caller following the recovery hint.
    pub fn recoverable(&self) -> bool {
        match self {
            SwapError::NetworkError(_)
            | SwapError::RateLimited { .. }
            | SwapError::GasEstimationFailed { .. }
            | SwapError::SlippageExceeded { .. }
            | SwapError::InsufficientAllowance { .. }
            | SwapError::QuoteExpired { .. }
            | SwapError::BridgeTimeout { .. }
            | SwapError::InsufficientBalance { .. } => true,
            SwapError::ApiError { status, .. } => match status {
                Some(s) => *s >= 500,
                None => true,
            },
            _ => false,
        }
    }

    /// Whether the retry combinator may re-run the operation automatically.
    pub fn retryable(&self) -> bool {
        self.recoverable()
            && matches!(
                self.kind(),
                ErrorKind::NetworkError
                    | ErrorKind::ApiError
                    | ErrorKind::RateLimited
                    | ErrorKind::GasEstimationFailed
            )
    }

    pub fn suggested_action(&self) -> RecoveryAction {
        match self {
            SwapError::NetworkError(_) | SwapError::GasEstimationFailed { .. } => {
                RecoveryAction::Retry { delay_ms: 1_000 }
            }
            SwapError::ApiError { .. } if self.recoverable() => {
                RecoveryAction::Retry { delay_ms: 1_000 }
            }
            SwapError::QuoteExpired { .. } => RecoveryAction::Retry { delay_ms: 0 },
            SwapError::SlippageExceeded { slippage_bps } => RecoveryAction::IncreaseSlippage {
                suggested_slippage_bps: (slippage_bps * 2).max(200),
            },
            SwapError::InsufficientAllowance { .. } => RecoveryAction::Approve,
            SwapError::InsufficientBalance { .. } => RecoveryAction::AddFunds,
            SwapError::RateLimited { retry_after_ms } => RecoveryAction::Wait {
                wait_ms: retry_after_ms.unwrap_or(5_000),
            },
            SwapError::BridgeTimeout { .. } => RecoveryAction::Wait { wait_ms: 60_000 },
            _ => RecoveryAction::Abort,
        }
    }

    /// Structured details for callers that render errors programmatically.
    pub fn details(&self) -> Value {
        match self {
            SwapError::InsufficientBalance { required, available } => json!({
                "required": required.to_string(),
                "available": available.to_string(),
            }),
            SwapError::InsufficientAllowance { required, current, spender } => json!({
                "required": required.to_string(),
                "current": current.to_string(),
                "spender": format!("{spender:#x}"),
            }),
            SwapError::SlippageExceeded { slippage_bps } => json!({ "slippageBps": slippage_bps }),
            SwapError::PriceImpactTooHigh { impact_pct, max_pct } => {
                json!({ "impactPct": impact_pct, "maxPct": max_pct })
            }
            SwapError::QuoteExpired { expired_at_ms } => json!({ "expiredAtMs": expired_at_ms }),
            SwapError::BridgeTimeout { elapsed_secs } => json!({ "elapsedSecs": elapsed_secs }),
            SwapError::ApiError { status, message } => {
                json!({ "status": status, "message": message })
            }
            SwapError::RateLimited { retry_after_ms } => json!({ "retryAfterMs": retry_after_ms }),
            SwapError::UnsupportedChain(chain_id) => json!({ "chainId": chain_id }),
            _ => json!({}),
        }
    }
}

/// Extract the revert reason from an RPC error message, if one is embedded.
fn revert_reason(message: &str) -> String {
    let lower = message.to_lowercase();
    if let Some(idx) = lower.find("execution reverted") {
        let tail = &message[idx + "execution reverted".len()..];
        let reason = tail.trim_start_matches([':', ' ']).trim();
        if !reason.is_empty() {
            // take up to the first delimiter the node appends after the reason
            let end = reason.find(['"', '\n', '}']).unwrap_or(reason.len());
            let reason = reason[..end].trim();
            if !reason.is_empty() {
                return reason.to_string();
            }
        }
    }
    "execution reverted".to_string()
}

/// Map an arbitrary upstream failure message (signer rejection, RPC error,
/// HTTP transport error) onto the taxonomy.
pub fn classify_failure(message: &str) -> SwapError {
    let lower = message.to_lowercase();

    if lower.contains("user rejected") || lower.contains("user denied") {
        return SwapError::UserRejected;
    }
    if lower.contains("execution reverted") {
        return SwapError::TransactionReverted {
            reason: revert_reason(message),
        };
    }
    if lower.contains("insufficient") {
        if lower.contains("allowance") {
            return SwapError::InsufficientAllowance {
                required: U256::ZERO,
                current: U256::ZERO,
                spender: Address::ZERO,
            };
        }
        return SwapError::InsufficientBalance {
            required: U256::ZERO,
            available: U256::ZERO,
        };
    }
    if lower.contains("rate limit") || lower.contains("too many requests") {
        return SwapError::RateLimited { retry_after_ms: None };
    }
    if lower.contains("slippage") {
        return SwapError::SlippageExceeded { slippage_bps: 0 };
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return SwapError::NetworkError(message.to_string());
    }
    if lower.contains("connection") || lower.contains("network") || lower.contains("dns") {
        return SwapError::NetworkError(message.to_string());
    }
    SwapError::Unknown(message.to_string())
}

/// Map an HTTP response onto the taxonomy. 429 becomes `RateLimited`; other
/// 4xx are non-recoverable `ApiError`; 5xx are recoverable `ApiError`.
pub fn classify_http(status: u16, body: &str) -> SwapError {
    if status == 429 {
        return SwapError::RateLimited { retry_after_ms: None };
    }
    SwapError::ApiError {
        status: Some(status),
        message: truncate_body(body),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() > MAX {
        format!("{}…", &body[..MAX])
    } else {
        body.to_string()
    }
}

impl From<reqwest::Error> for SwapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return SwapError::NetworkError(err.to_string());
        }
        if let Some(status) = err.status() {
            return classify_http(status.as_u16(), &err.to_string());
        }
        SwapError::NetworkError(err.to_string())
    }
}

/// Exponential backoff policy for the retry combinator.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            multiplier: 2,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms.saturating_mul((self.multiplier as u64).pow(attempt));
        delay.min(self.max_delay_ms)
    }
}

/// Run `op` with exponential backoff, retrying only failures the taxonomy
/// marks retryable. Everything else surfaces immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, SwapError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SwapError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && err.retryable() => {
                let delay = match &err {
                    SwapError::RateLimited {
                        retry_after_ms: Some(ms),
                    } => (*ms).min(policy.max_delay_ms),
                    _ => policy.delay_for(attempt),
                };
                debug!("{} failed ({}), retry {}/{} in {}ms", label, err, attempt + 1, policy.max_retries, delay);
                sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
