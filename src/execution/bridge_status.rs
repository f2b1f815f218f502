use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SwapError;
use crate::types::{now_ms, BridgeStatusInfo, BridgeTransferState};

const SOCKET_STATUS_URL: &str = "https://api.socket.tech/v2/bridge-status";
const LIFI_STATUS_URL: &str = "https://li.quest/v1/status";
const ACROSS_STATUS_URL: &str = "https://across.to/api/deposit/status";
const LAYERZERO_SCAN_URL: &str = "https://api-mainnet.layerzero-scan.com/tx";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(600);

/// One observation of a cross-chain transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgePollOutcome {
    InProgress,
    Completed { destination_tx_hash: String },
    Failed { reason: String },
}

/// Polls provider-specific status endpoints until the destination transaction
/// is observed, the provider reports failure, or the overall timeout passes.
/// Unknown providers stay `InProgress` and resolve via the timeout.
pub struct BridgeStatusPoller {
    client: reqwest::Client,
    poll_interval: Duration,
    overall_timeout: Duration,
}

impl BridgeStatusPoller {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
        }
    }

    pub fn with_timing(client: reqwest::Client, poll_interval: Duration, overall_timeout: Duration) -> Self {
        Self {
            client,
            poll_interval,
            overall_timeout,
        }
    }

    /// Block until the transfer resolves. Poll errors are tolerated (the next
    /// tick retries); only an explicit provider failure or the timeout aborts.
    pub async fn wait_for_destination(
        &self,
        aggregator: &str,
        bridge: Option<&str>,
        source_chain_id: u64,
        source_tx_hash: &str,
        cancel: &CancellationToken,
    ) -> Result<BridgeStatusInfo, SwapError> {
        let provider = strategy_name(aggregator, bridge);
        let started = Instant::now();
        info!("⏳ polling {} for {}", provider, source_tx_hash);

        loop {
            if cancel.is_cancelled() {
                return Err(SwapError::network("bridge polling cancelled"));
            }
            if started.elapsed() >= self.overall_timeout {
                return Err(SwapError::BridgeTimeout {
                    elapsed_secs: started.elapsed().as_secs(),
                });
            }

            match self.check_once(provider, source_chain_id, source_tx_hash).await {
                Ok(BridgePollOutcome::Completed { destination_tx_hash }) => {
                    info!("✅ bridge transfer complete: {}", destination_tx_hash);
                    return Ok(BridgeStatusInfo {
                        provider: provider.to_string(),
                        state: BridgeTransferState::Completed,
                        destination_tx_hash: Some(destination_tx_hash),
                        last_checked_ms: now_ms(),
                    });
                }
                Ok(BridgePollOutcome::Failed { reason }) => {
                    return Err(SwapError::BridgeFailed { reason });
                }
                Ok(BridgePollOutcome::InProgress) => {
                    debug!("{} still in progress ({}s)", provider, started.elapsed().as_secs());
                }
                Err(err) => {
                    // transient poll failures ride on the overall timeout
                    warn!("{} status check failed: {}", provider, err);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(SwapError::network("bridge polling cancelled")),
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    async fn check_once(
        &self,
        provider: &str,
        source_chain_id: u64,
        source_tx_hash: &str,
    ) -> Result<BridgePollOutcome, SwapError> {
        match provider {
            "Socket" => {
                let url = format!("{SOCKET_STATUS_URL}?transactionHash={source_tx_hash}");
                Ok(parse_socket_status(&self.fetch(&url).await?))
            }
            "LiFi" => {
                let url = format!("{LIFI_STATUS_URL}?txHash={source_tx_hash}");
                Ok(parse_lifi_status(&self.fetch(&url).await?))
            }
            "Across" => {
                let url = format!(
                    "{ACROSS_STATUS_URL}?originChainId={source_chain_id}&depositTxHash={source_tx_hash}"
                );
                Ok(parse_across_status(&self.fetch(&url).await?))
            }
            "Stargate" => {
                let url = format!("{LAYERZERO_SCAN_URL}/{source_tx_hash}");
                Ok(parse_stargate_status(&self.fetch(&url).await?))
            }
            _ => Ok(BridgePollOutcome::InProgress),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Value, SwapError> {
        let response = self.client.get(url).send().await.map_err(SwapError::from)?;
        if !response.status().is_success() {
            return Err(crate::error::classify_http(
                response.status().as_u16(),
                &response.text().await.unwrap_or_default(),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| SwapError::network(format!("status response parse: {e}")))
    }
}

/// Pick the status strategy: the aggregator that produced the route when it
/// has its own tracking API, else the underlying bridge protocol.
pub fn strategy_name(aggregator: &str, bridge: Option<&str>) -> &'static str {
    let aggregator = aggregator.to_lowercase();
    if aggregator == "socket" {
        return "Socket";
    }
    if aggregator == "lifi" || aggregator == "li.fi" {
        return "LiFi";
    }
    match bridge.map(str::to_lowercase).as_deref() {
        Some(b) if b.contains("across") => "Across",
        Some(b) if b.contains("stargate") || b.contains("layerzero") => "Stargate",
        _ => "unknown",
    }
}

fn parse_socket_status(body: &Value) -> BridgePollOutcome {
    let result = &body["result"];
    if let Some(hash) = result["destinationTransactionHash"].as_str() {
        return BridgePollOutcome::Completed {
            destination_tx_hash: hash.to_string(),
        };
    }
    if result["sourceTxStatus"].as_str() == Some("FAILED") {
        return BridgePollOutcome::Failed {
            reason: "socket reports source transaction failed".to_string(),
        };
    }
    BridgePollOutcome::InProgress
}

fn parse_lifi_status(body: &Value) -> BridgePollOutcome {
    match body["status"].as_str() {
        Some("DONE") => BridgePollOutcome::Completed {
            destination_tx_hash: body["receiving"]["txHash"].as_str().unwrap_or_default().to_string(),
        },
        Some("FAILED") => BridgePollOutcome::Failed {
            reason: body["substatusMessage"]
                .as_str()
                .unwrap_or("lifi reports transfer failed")
                .to_string(),
        },
        _ => BridgePollOutcome::InProgress,
    }
}

fn parse_across_status(body: &Value) -> BridgePollOutcome {
    match body["status"].as_str() {
        Some("filled") => BridgePollOutcome::Completed {
            destination_tx_hash: body["fillTxHash"].as_str().unwrap_or_default().to_string(),
        },
        _ => BridgePollOutcome::InProgress,
    }
}

fn parse_stargate_status(body: &Value) -> BridgePollOutcome {
    let message = &body["messages"][0];
    match message["status"].as_str() {
        Some("DELIVERED") => BridgePollOutcome::Completed {
            destination_tx_hash: message["dstTxHash"].as_str().unwrap_or_default().to_string(),
        },
        Some("FAILED") => BridgePollOutcome::Failed {
            reason: "layerzero reports message failed".to_string(),
        },
        _ => BridgePollOutcome::InProgress,
    }
}
