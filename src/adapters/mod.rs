pub mod kyberswap;
pub mod lifi;
pub mod odos;
pub mod oneinch;
pub mod paraswap;
pub mod socket;
pub mod traits;
pub mod zeroex;

pub use kyberswap::KyberSwapAdapter;
pub use lifi::LiFiAdapter;
pub use odos::OdosAdapter;
pub use oneinch::OneInchAdapter;
pub use paraswap::ParaswapAdapter;
pub use socket::SocketAdapter;
pub use traits::{AdapterMetrics, AdapterQuote, Aggregator, AggregatorKind, MetricsRegistry};
pub use zeroex::ZeroExAdapter;

use crate::config::CrossFundConfig;
use std::sync::Arc;

/// The default adapter set: five DEX aggregators and two bridge aggregators,
/// all sharing one HTTP client, API keys taken from the configuration.
pub fn default_adapters(config: &CrossFundConfig, client: reqwest::Client) -> Vec<Arc<dyn Aggregator>> {
    let keys = &config.api_keys;
    vec![
        Arc::new(ZeroExAdapter::new(client.clone(), keys.zerox.clone())) as Arc<dyn Aggregator>,
        Arc::new(OneInchAdapter::new(client.clone(), keys.oneinch.clone())),
        Arc::new(ParaswapAdapter::new(client.clone())),
        Arc::new(OdosAdapter::new(client.clone())),
        Arc::new(KyberSwapAdapter::new(client.clone())),
        Arc::new(SocketAdapter::new(client.clone(), keys.socket.clone())),
        Arc::new(LiFiAdapter::new(client, keys.lifi.clone())),
    ]
}
