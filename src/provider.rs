use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::constants;
use crate::error::{classify_failure, SwapError};

// ERC-20 selectors
const SELECTOR_BALANCE_OF: &str = "0x70a08231";
const SELECTOR_ALLOWANCE: &str = "0xdd62ed3e";

/// Read-side RPC capability the engine needs from a chain. Injected; the
/// bundled implementation speaks JSON-RPC over HTTP.
#[async_trait]
pub trait ChainProvider: Send + Sync + std::fmt::Debug {
    fn chain_id(&self) -> u64;

    /// Native currency balance.
    async fn get_balance(&self, address: Address) -> Result<U256, SwapError>;

    /// ERC-20 `balanceOf(owner)`.
    async fn get_erc20_balance(&self, token: Address, owner: Address) -> Result<U256, SwapError>;

    /// ERC-20 `allowance(owner, spender)`.
    async fn get_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, SwapError>;

    /// Current node gas price (`eth_gasPrice`).
    async fn gas_price(&self) -> Result<U256, SwapError>;

    /// `eth_estimateGas` for a call.
    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &str,
        value: U256,
    ) -> Result<u64, SwapError>;
}

/// JSON-RPC-over-HTTP provider for one chain.
#[derive(Debug)]
pub struct HttpChainProvider {
    chain_id: u64,
    url: String,
    client: reqwest::Client,
}

impl HttpChainProvider {
    pub fn new(chain_id: u64, url: &str, client: reqwest::Client) -> Self {
        Self {
            chain_id,
            url: url.to_string(),
            client,
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, SwapError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(SwapError::from)?;

        if !response.status().is_success() {
            return Err(SwapError::network(format!(
                "rpc {} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| SwapError::network(format!("invalid rpc response: {e}")))?;

        if let Some(error) = payload.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("rpc error");
            return Err(classify_failure(message));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| SwapError::network("rpc response missing result".to_string()))
    }

    async fn rpc_u256(&self, method: &str, params: Value) -> Result<U256, SwapError> {
        let result = self.rpc(method, params).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| SwapError::network("rpc result is not a string".to_string()))?;
        parse_hex_u256(hex)
    }

    async fn eth_call(&self, to: Address, data: String) -> Result<U256, SwapError> {
        self.rpc_u256(
            "eth_call",
            json!([{ "to": format!("{to:#x}"), "data": data }, "latest"]),
        )
        .await
    }
}

#[async_trait]
impl ChainProvider for HttpChainProvider {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, address: Address) -> Result<U256, SwapError> {
        self.rpc_u256("eth_getBalance", json!([format!("{address:#x}"), "latest"]))
            .await
    }

    async fn get_erc20_balance(&self, token: Address, owner: Address) -> Result<U256, SwapError> {
        let data = format!("{}{}", SELECTOR_BALANCE_OF, pad_address(owner));
        self.eth_call(token, data).await
    }

    async fn get_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, SwapError> {
        let data = format!("{}{}{}", SELECTOR_ALLOWANCE, pad_address(owner), pad_address(spender));
        self.eth_call(token, data).await
    }

    async fn gas_price(&self) -> Result<U256, SwapError> {
        self.rpc_u256("eth_gasPrice", json!([])).await
    }

    async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &str,
        value: U256,
    ) -> Result<u64, SwapError> {
        let result = self
            .rpc_u256(
                "eth_estimateGas",
                json!([{
                    "from": format!("{from:#x}"),
                    "to": format!("{to:#x}"),
                    "data": data,
                    "value": format!("{value:#x}"),
                }]),
            )
            .await
            .map_err(|e| match e {
                // keep reverts as-is so callers see the reason
                SwapError::TransactionReverted { .. } => e,
                other => SwapError::GasEstimationFailed {
                    reason: other.to_string(),
                },
            })?;
        Ok(result.try_into().unwrap_or(u64::MAX))
    }
}

/// ABI-encode an address argument (left-padded to 32 bytes, no 0x prefix).
fn pad_address(address: Address) -> String {
    format!("{:0>64}", hex::encode(address.as_slice()))
}

fn parse_hex_u256(hex: &str) -> Result<U256, SwapError> {
    let trimmed = hex.trim_start_matches("0x");
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(trimmed, 16)
        .map_err(|_| SwapError::network(format!("invalid hex quantity: {hex}")))
}

/// Lazy `chain_id → provider` map. One provider per chain is memoized; a
/// discarded provider is re-created on the next endpoint in the registry's
/// fallback list.
pub struct ProviderPool {
    client: reqwest::Client,
    providers: RwLock<HashMap<u64, Arc<dyn ChainProvider>>>,
    endpoint_cursor: RwLock<HashMap<u64, usize>>,
}

impl ProviderPool {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            providers: RwLock::new(HashMap::new()),
            endpoint_cursor: RwLock::new(HashMap::new()),
        }
    }

    /// Register an externally constructed provider (tests, custom endpoints).
    pub async fn register(&self, provider: Arc<dyn ChainProvider>) {
        self.providers.write().await.insert(provider.chain_id(), provider);
    }

    pub async fn get(&self, chain_id: u64) -> Result<Arc<dyn ChainProvider>, SwapError> {
        if let Some(provider) = self.providers.read().await.get(&chain_id) {
            return Ok(Arc::clone(provider));
        }

        let info = constants::chain_info(chain_id).ok_or(SwapError::UnsupportedChain(chain_id))?;
        let cursor = *self.endpoint_cursor.read().await.get(&chain_id).unwrap_or(&0);
        let url = info.rpc_urls[cursor % info.rpc_urls.len()];
        debug!("creating provider for chain {} via {}", chain_id, url);

        let provider: Arc<dyn ChainProvider> =
            Arc::new(HttpChainProvider::new(chain_id, url, self.client.clone()));
        self.providers.write().await.insert(chain_id, Arc::clone(&provider));
        Ok(provider)
    }

    /// Discard a failing provider; the next `get` rotates to the following
    /// endpoint in the chain's RPC list.
    pub async fn invalidate(&self, chain_id: u64) {
        warn!("discarding provider for chain {}", chain_id);
        self.providers.write().await.remove(&chain_id);
        let mut cursors = self.endpoint_cursor.write().await;
        *cursors.entry(chain_id).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_address() {
        let addr: Address = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".parse().unwrap();
        let padded = pad_address(addr);
        assert_eq!(padded.len(), 64);
        assert!(padded.starts_with("000000000000000000000000a0b86991"));
    }

    #[test]
    fn test_parse_hex_u256() {
        assert_eq!(parse_hex_u256("0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_hex_u256("0x10").unwrap(), U256::from(16u64));
        assert_eq!(parse_hex_u256("0x").unwrap(), U256::ZERO);
        assert!(parse_hex_u256("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_pool_rejects_unknown_chain() {
        let pool = ProviderPool::new(reqwest::Client::new());
        let err = pool.get(4242).await.unwrap_err();
        assert!(matches!(err, SwapError::UnsupportedChain(4242)));
    }

    #[tokio::test]
    async fn test_pool_memoizes_and_rotates() {
        let pool = ProviderPool::new(reqwest::Client::new());
        let a = pool.get(1).await.unwrap();
        let b = pool.get(1).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        pool.invalidate(1).await;
        let c = pool.get(1).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
