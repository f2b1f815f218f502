use alloy::primitives::{Address, U256};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::types::{AmountKind, GasPrices, QuoteRequest, SwapQuote};

/// Time-bounded map. Entries older than the TTL read as misses; stale entries
/// are overwritten in place on the next insert, so no background eviction is
/// needed.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        entries.insert(key, (Instant::now(), value));
    }

    /// Drop expired entries. Correctness never requires calling this; it only
    /// bounds memory for long-lived processes.
    pub async fn purge_expired(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (inserted, _)| inserted.elapsed() < self.ttl);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Cache key for a quote request: the identity fields that make two requests
/// interchangeable within the TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    pub input_chain: u64,
    pub input_address: Address,
    pub output_chain: u64,
    pub output_address: Address,
    pub amount: U256,
    pub amount_kind: AmountKind,
}

impl QuoteKey {
    pub fn for_request(request: &QuoteRequest) -> Self {
        Self {
            input_chain: request.input_token.chain_id,
            input_address: request.input_token.address,
            output_chain: request.output_token.chain_id,
            output_address: request.output_token.address,
            amount: request.amount,
            amount_kind: request.amount_kind,
        }
    }
}

pub const QUOTE_TTL_MS: u64 = 10_000;
pub const PRICE_TTL_MS: u64 = 60_000;
pub const GAS_TTL_MS: u64 = 15_000;

/// The three engine caches. Shared by `Arc` across every component of an
/// engine instance; concurrent duplicate fills are benign (identical values,
/// last writer wins).
#[derive(Debug)]
pub struct EngineCaches {
    pub quotes: TtlCache<QuoteKey, Vec<SwapQuote>>,
    pub prices: TtlCache<(u64, Address), f64>,
    pub gas: TtlCache<u64, GasPrices>,
}

impl EngineCaches {
    pub fn new(quote_ttl_ms: u64) -> Self {
        Self {
            quotes: TtlCache::new(Duration::from_millis(quote_ttl_ms)),
            prices: TtlCache::new(Duration::from_millis(PRICE_TTL_MS)),
            gas: TtlCache::new(Duration::from_millis(GAS_TTL_MS)),
        }
    }
}

impl Default for EngineCaches {
    fn default() -> Self {
        Self::new(QUOTE_TTL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hit_within_ttl() {
        let cache: TtlCache<u64, String> = TtlCache::new(Duration::from_secs(60));
        cache.insert(1, "value".to_string()).await;
        assert_eq!(cache.get(&1).await.as_deref(), Some("value"));
        assert_eq!(cache.get(&2).await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache: TtlCache<u64, u32> = TtlCache::new(Duration::from_millis(20));
        cache.insert(1, 7).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&1).await, None);
        // the entry still occupies the map until purged
        assert_eq!(cache.len().await, 1);
        cache.purge_expired().await;
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes() {
        let cache: TtlCache<u64, u32> = TtlCache::new(Duration::from_millis(50));
        cache.insert(1, 1).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.insert(1, 2).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        // refreshed at t=30ms, still fresh at t=60ms
        assert_eq!(cache.get(&1).await, Some(2));
    }
}
