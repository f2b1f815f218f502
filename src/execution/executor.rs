use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SwapError;
use crate::execution::bridge_status::BridgeStatusPoller;
use crate::provider::ProviderPool;
use crate::types::{
    now_ms, BridgeStatusInfo, BridgeTransferState, ExecutionStatus, SwapExecution, SwapQuote,
    SwapResult, TxnData, TxnStatus, TxnType,
};

/// Receipt the signer's wait resolves to. `status == 0` means the transaction
/// reverted on-chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: u64,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// A submitted transaction: its hash immediately, its receipt on demand.
#[async_trait]
pub trait PendingTransaction: Send + Sync {
    fn hash(&self) -> String;
    async fn wait(&self, confirmations: u32) -> Result<TxReceipt, SwapError>;
}

/// Minimal signing capability the executor depends on. Any wallet backend
/// satisfying it is a valid collaborator; nonce management stays inside the
/// signer.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn address(&self) -> Result<Address, SwapError>;
    async fn send_transaction(&self, txn: &TxnData)
        -> Result<Box<dyn PendingTransaction>, SwapError>;
}

/// Destination-side observation capability for cross-chain transfers.
/// Implemented by `BridgeStatusPoller`; tests substitute their own.
#[async_trait]
pub trait BridgeWatcher: Send + Sync {
    async fn wait_for_destination(
        &self,
        aggregator: &str,
        bridge: Option<&str>,
        source_chain_id: u64,
        source_tx_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<BridgeStatusInfo, SwapError>;
}

#[async_trait]
impl BridgeWatcher for BridgeStatusPoller {
    async fn wait_for_destination(
        &self,
        aggregator: &str,
        bridge: Option<&str>,
        source_chain_id: u64,
        source_tx_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<BridgeStatusInfo, SwapError> {
        BridgeStatusPoller::wait_for_destination(
            self,
            aggregator,
            bridge,
            source_chain_id,
            source_tx_hash,
            cancel,
        )
        .await
    }
}

/// Drives a prepared transaction sequence: balance precheck, strictly serial
/// sign→submit→confirm per step, then destination polling for cross-chain
/// routes. A failure freezes the execution at the failing step; nothing is
/// ever resubmitted.
pub struct TransactionExecutor {
    providers: Arc<ProviderPool>,
    watcher: Arc<dyn BridgeWatcher>,
}

impl TransactionExecutor {
    pub fn new(providers: Arc<ProviderPool>, watcher: Arc<dyn BridgeWatcher>) -> Self {
        Self { providers, watcher }
    }

    pub async fn execute(
        &self,
        quote: &SwapQuote,
        transactions: Vec<TxnData>,
        signer: &dyn TransactionSigner,
        cancel: &CancellationToken,
    ) -> SwapResult {
        let mut execution = SwapExecution::new(&quote.id, transactions);
        let mut tx_hashes = Vec::new();

        match self.run(quote, &mut execution, &mut tx_hashes, signer, cancel).await {
            Ok(()) => {
                execution.status = ExecutionStatus::Completed;
                execution.completed_at_ms = Some(now_ms());
                SwapResult {
                    success: true,
                    tx_hashes,
                    execution,
                    error: None,
                }
            }
            Err(error) => {
                warn!("swap execution failed at step {}: {}", execution.current_step, error);
                execution.status = ExecutionStatus::Failed;
                SwapResult {
                    success: false,
                    tx_hashes,
                    execution,
                    error: Some(error),
                }
            }
        }
    }

    async fn run(
        &self,
        quote: &SwapQuote,
        execution: &mut SwapExecution,
        tx_hashes: &mut Vec<String>,
        signer: &dyn TransactionSigner,
        cancel: &CancellationToken,
    ) -> Result<(), SwapError> {
        let user = signer.address().await?;
        self.check_balance(quote, user).await?;

        for index in 0..execution.transactions.len() {
            execution.current_step = index;
            let txn_type = execution.transactions[index].txn_type;
            execution.status = match txn_type {
                TxnType::Approval => ExecutionStatus::Approving,
                _ => ExecutionStatus::Swapping,
            };

            execution.transactions[index].status = TxnStatus::Pending;
            info!(
                "🚀 step {}/{}: {}",
                index + 1,
                execution.total_steps,
                execution.transactions[index].description
            );

            let pending = match signer.send_transaction(&execution.transactions[index]).await {
                Ok(pending) => pending,
                Err(error) => {
                    execution.transactions[index].status = TxnStatus::Failed;
                    execution.transactions[index].error = Some(error.to_string());
                    return Err(error);
                }
            };

            let hash = pending.hash();
            execution.transactions[index].tx_hash = Some(hash.clone());
            execution.transactions[index].status = TxnStatus::Submitted;
            tx_hashes.push(hash.clone());
            debug!("submitted {}", hash);

            let receipt = match pending.wait(1).await {
                Ok(receipt) => receipt,
                Err(error) => {
                    execution.transactions[index].status = TxnStatus::Failed;
                    execution.transactions[index].error = Some(error.to_string());
                    return Err(error);
                }
            };

            if receipt.status == 0 {
                let error = SwapError::TransactionFailed {
                    reason: format!("transaction {hash} reverted"),
                };
                execution.transactions[index].status = TxnStatus::Failed;
                execution.transactions[index].error = Some(error.to_string());
                return Err(error);
            }

            execution.transactions[index].status = TxnStatus::Confirmed;
            execution.transactions[index].confirmations = 1;
            if txn_type == TxnType::Bridge {
                execution.source_tx_hash = Some(hash);
            }
        }
        execution.current_step = execution.total_steps;

        if quote.route.is_cross_chain {
            if let Some(source_tx_hash) = execution.source_tx_hash.clone() {
                execution.status = ExecutionStatus::Bridging;
                let bridge = quote
                    .route
                    .steps
                    .first()
                    .map(|step| step.protocol.as_str())
                    .filter(|p| *p != quote.aggregator);
                execution.bridge_status = Some(BridgeStatusInfo {
                    provider: quote.aggregator.clone(),
                    state: BridgeTransferState::InProgress,
                    destination_tx_hash: None,
                    last_checked_ms: now_ms(),
                });

                match self
                    .watcher
                    .wait_for_destination(
                        &quote.aggregator,
                        bridge,
                        quote.input_token.chain_id,
                        &source_tx_hash,
                        cancel,
                    )
                    .await
                {
                    Ok(status) => {
                        execution.destination_tx_hash = status.destination_tx_hash.clone();
                        execution.bridge_status = Some(status);
                    }
                    Err(error) => {
                        if let Some(status) = execution.bridge_status.as_mut() {
                            status.state = match error {
                                SwapError::BridgeFailed { .. } => BridgeTransferState::Failed,
                                _ => BridgeTransferState::InProgress,
                            };
                            status.last_checked_ms = now_ms();
                        }
                        return Err(error);
                    }
                }
            }
        }

        Ok(())
    }

    /// Native or ERC-20 balance must cover the input before anything is
    /// signed.
    async fn check_balance(&self, quote: &SwapQuote, user: Address) -> Result<(), SwapError> {
        let provider = self.providers.get(quote.input_token.chain_id).await?;
        let available = if quote.input_token.is_native() {
            provider.get_balance(user).await?
        } else {
            provider.get_erc20_balance(quote.input_token.address, user).await?
        };
        if available < quote.input_amount {
            return Err(SwapError::InsufficientBalance {
                required: quote.input_amount,
                available,
            });
        }
        Ok(())
    }
}
