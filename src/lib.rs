// CrossFund swap engine library

pub mod adapters;
pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod execution;
pub mod oracle;
pub mod provider;
pub mod quotes;

// Core types
pub mod types;

// Re-exports for convenience
pub use config::{ApiKeys, CrossFundConfig};
pub use engine::{CrossFund, QuoteOptions, SwapParams, MAX_PRICE_IMPACT_PCT};
pub use error::{
    classify_failure, classify_http, with_retry, ErrorKind, RecoveryAction, RetryPolicy, SwapError,
};
pub use execution::{
    BridgeStatusPoller, PendingTransaction, TransactionBuilder, TransactionExecutor,
    TransactionSigner, TxReceipt,
};
pub use provider::{ChainProvider, HttpChainProvider, ProviderPool};
pub use quotes::QuoteService;
pub use types::{
    AmountKind, ApprovalCheck, ExecutionStatus, GasPrices, PreparedSwap, QuoteComparison,
    QuoteRequest, SwapExecution, SwapQuote, SwapResult, Token, TxnData, TxnStatus, TxnType,
};

/// Opt-in tracing setup honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
