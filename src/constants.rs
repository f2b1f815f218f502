use alloy::primitives::Address;
use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::types::Token;

// Chain ids
pub const ETHEREUM: u64 = 1;
pub const OPTIMISM: u64 = 10;
pub const BSC: u64 = 56;
pub const POLYGON: u64 = 137;
pub const FANTOM: u64 = 250;
pub const ZKSYNC: u64 = 324;
pub const BASE: u64 = 8453;
pub const ARBITRUM: u64 = 42161;
pub const AVALANCHE: u64 = 43114;
pub const LINEA: u64 = 59144;
pub const SCROLL: u64 = 534352;

/// Sentinel address for a chain's native currency.
pub const NATIVE_TOKEN_ADDRESS: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

static NATIVE_SENTINEL: Lazy<Address> =
    Lazy::new(|| Address::from_str(NATIVE_TOKEN_ADDRESS).unwrap());

/// `true` for the native sentinel or the zero address.
pub fn is_native_address(address: Address) -> bool {
    address == Address::ZERO || address == *NATIVE_SENTINEL
}

pub fn native_sentinel() -> Address {
    *NATIVE_SENTINEL
}

/// Static gas tiers used when no oracle is reachable (gwei).
#[derive(Debug, Clone, Copy)]
pub struct FallbackGas {
    pub slow_gwei: f64,
    pub standard_gwei: f64,
    pub fast_gwei: f64,
    /// Approximate native token price; fresh values come from the oracle.
    pub native_usd: f64,
}

/// Everything the engine needs to know about a chain, statically.
#[derive(Debug, Clone)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub name: &'static str,
    pub native_symbol: &'static str,
    pub native_decimals: u8,
    pub supports_eip1559: bool,
    pub usdc: &'static str,
    pub wrapped_native: &'static str,
    pub rpc_urls: &'static [&'static str],
    pub explorer: &'static str,
    /// CoinGecko platform slug for `simple/token_price/{slug}`.
    pub coingecko_platform: Option<&'static str>,
    /// CoinGecko coin id for the native currency.
    pub coingecko_native_id: &'static str,
    pub fallback_gas: FallbackGas,
}

static CHAINS: &[ChainInfo] = &[
    ChainInfo {
        chain_id: ETHEREUM,
        name: "Ethereum",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        wrapped_native: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        rpc_urls: &[
            "https://eth.llamarpc.com",
            "https://ethereum-rpc.publicnode.com",
        ],
        explorer: "https://etherscan.io",
        coingecko_platform: Some("ethereum"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 10.0, standard_gwei: 15.0, fast_gwei: 25.0, native_usd: 3000.0 },
    },
    ChainInfo {
        chain_id: OPTIMISM,
        name: "Optimism",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x7F5c764cBc14f9669B88837ca1490cCa17c31607",
        wrapped_native: "0x4200000000000000000000000000000000000006",
        rpc_urls: &[
            "https://mainnet.optimism.io",
            "https://optimism-rpc.publicnode.com",
        ],
        explorer: "https://optimistic.etherscan.io",
        coingecko_platform: Some("optimistic-ethereum"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 0.005, standard_gwei: 0.01, fast_gwei: 0.05, native_usd: 3000.0 },
    },
    ChainInfo {
        chain_id: BSC,
        name: "BNB Smart Chain",
        native_symbol: "BNB",
        native_decimals: 18,
        supports_eip1559: false,
        usdc: "0x8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d",
        wrapped_native: "0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c",
        rpc_urls: &[
            "https://bsc-dataseed.binance.org",
            "https://bsc-rpc.publicnode.com",
        ],
        explorer: "https://bscscan.com",
        coingecko_platform: Some("binance-smart-chain"),
        coingecko_native_id: "binancecoin",
        fallback_gas: FallbackGas { slow_gwei: 3.0, standard_gwei: 5.0, fast_gwei: 10.0, native_usd: 600.0 },
    },
    ChainInfo {
        chain_id: POLYGON,
        name: "Polygon",
        native_symbol: "MATIC",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174",
        wrapped_native: "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270",
        rpc_urls: &[
            "https://polygon-rpc.com",
            "https://polygon-bor-rpc.publicnode.com",
        ],
        explorer: "https://polygonscan.com",
        coingecko_platform: Some("polygon-pos"),
        coingecko_native_id: "matic-network",
        fallback_gas: FallbackGas { slow_gwei: 30.0, standard_gwei: 50.0, fast_gwei: 100.0, native_usd: 0.5 },
    },
    ChainInfo {
        chain_id: FANTOM,
        name: "Fantom",
        native_symbol: "FTM",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x04068DA6C83AFCFA0e13ba15A6696662335D5B75",
        wrapped_native: "0x21be370D5312f44cB42ce377BC9b8a0cEF1A4C83",
        rpc_urls: &[
            "https://rpc.ftm.tools",
            "https://fantom-rpc.publicnode.com",
        ],
        explorer: "https://ftmscan.com",
        coingecko_platform: Some("fantom"),
        coingecko_native_id: "fantom",
        fallback_gas: FallbackGas { slow_gwei: 10.0, standard_gwei: 25.0, fast_gwei: 50.0, native_usd: 0.5 },
    },
    ChainInfo {
        chain_id: ZKSYNC,
        name: "zkSync Era",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x3355df6D4c9C3035724Fd0e3914dE96A5a83aaf4",
        wrapped_native: "0x5AEa5775959fBC2557Cc8789bC1bf90A239D9a91",
        rpc_urls: &[
            "https://mainnet.era.zksync.io",
        ],
        explorer: "https://explorer.zksync.io",
        coingecko_platform: Some("zksync"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 0.25, standard_gwei: 0.25, fast_gwei: 0.5, native_usd: 3000.0 },
    },
    ChainInfo {
        chain_id: BASE,
        name: "Base",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        wrapped_native: "0x4200000000000000000000000000000000000006",
        rpc_urls: &[
            "https://mainnet.base.org",
            "https://base-rpc.publicnode.com",
        ],
        explorer: "https://basescan.org",
        coingecko_platform: Some("base"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 0.005, standard_gwei: 0.01, fast_gwei: 0.05, native_usd: 3000.0 },
    },
    ChainInfo {
        chain_id: ARBITRUM,
        name: "Arbitrum One",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
        wrapped_native: "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1",
        rpc_urls: &[
            "https://arb1.arbitrum.io/rpc",
            "https://arbitrum-one-rpc.publicnode.com",
        ],
        explorer: "https://arbiscan.io",
        coingecko_platform: Some("arbitrum-one"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 0.1, standard_gwei: 0.1, fast_gwei: 0.25, native_usd: 3000.0 },
    },
    ChainInfo {
        chain_id: AVALANCHE,
        name: "Avalanche",
        native_symbol: "AVAX",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        wrapped_native: "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7",
        rpc_urls: &[
            "https://api.avax.network/ext/bc/C/rpc",
            "https://avalanche-c-chain-rpc.publicnode.com",
        ],
        explorer: "https://snowtrace.io",
        coingecko_platform: Some("avalanche"),
        coingecko_native_id: "avalanche-2",
        fallback_gas: FallbackGas { slow_gwei: 25.0, standard_gwei: 30.0, fast_gwei: 40.0, native_usd: 30.0 },
    },
    ChainInfo {
        chain_id: LINEA,
        name: "Linea",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x176211869cA2b568f2A7D4EE941E073a821EE1ff",
        wrapped_native: "0xe5D7C2a44FfDDf6b295A15c148167daaAf5Cf34f",
        rpc_urls: &[
            "https://rpc.linea.build",
        ],
        explorer: "https://lineascan.build",
        coingecko_platform: Some("linea"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 0.5, standard_gwei: 1.0, fast_gwei: 2.0, native_usd: 3000.0 },
    },
    ChainInfo {
        chain_id: SCROLL,
        name: "Scroll",
        native_symbol: "ETH",
        native_decimals: 18,
        supports_eip1559: true,
        usdc: "0x06eFdBFf2a14a7c8E15944D1F4A48F9F95F663A4",
        wrapped_native: "0x5300000000000000000000000000000000000004",
        rpc_urls: &[
            "https://rpc.scroll.io",
        ],
        explorer: "https://scrollscan.com",
        coingecko_platform: Some("scroll"),
        coingecko_native_id: "ethereum",
        fallback_gas: FallbackGas { slow_gwei: 0.2, standard_gwei: 0.5, fast_gwei: 1.0, native_usd: 3000.0 },
    },
];

pub fn chain_info(chain_id: u64) -> Option<&'static ChainInfo> {
    CHAINS.iter().find(|c| c.chain_id == chain_id)
}

pub fn is_supported_chain(chain_id: u64) -> bool {
    chain_info(chain_id).is_some()
}

pub fn supported_chains() -> Vec<u64> {
    CHAINS.iter().map(|c| c.chain_id).collect()
}

pub fn chain_name(chain_id: u64) -> Option<&'static str> {
    chain_info(chain_id).map(|c| c.name)
}

/// Block-explorer URL for a transaction hash.
pub fn explorer_tx_url(chain_id: u64, tx_hash: &str) -> Option<String> {
    chain_info(chain_id).map(|c| format!("{}/tx/{}", c.explorer, tx_hash))
}

pub fn usdc_address(chain_id: u64) -> Option<Address> {
    chain_info(chain_id).map(|c| Address::from_str(c.usdc).unwrap())
}

pub fn wrapped_native_address(chain_id: u64) -> Option<Address> {
    chain_info(chain_id).map(|c| Address::from_str(c.wrapped_native).unwrap())
}

/// Canonical USDC token for a chain. USDC is 6 decimals on every chain we support.
pub fn usdc_token(chain_id: u64) -> Option<Token> {
    chain_info(chain_id).map(|c| Token {
        address: Address::from_str(c.usdc).unwrap(),
        chain_id,
        symbol: "USDC".to_string(),
        decimals: 6,
        name: Some("USD Coin".to_string()),
        logo_uri: None,
        price_usd: None,
    })
}

/// Native currency of a chain, under the sentinel address.
pub fn native_token(chain_id: u64) -> Option<Token> {
    chain_info(chain_id).map(|c| Token {
        address: native_sentinel(),
        chain_id,
        symbol: c.native_symbol.to_string(),
        decimals: c.native_decimals,
        name: Some(c.name.to_string()),
        logo_uri: None,
        price_usd: None,
    })
}

/// Symbols the engine treats as USD stablecoins when pricing degrades.
pub fn is_stablecoin_symbol(symbol: &str) -> bool {
    matches!(symbol.to_uppercase().as_str(), "USDC" | "USDT" | "DAI" | "USDC.E" | "BUSD" | "FRAX")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_chains() {
        assert!(is_supported_chain(ETHEREUM));
        assert!(is_supported_chain(POLYGON));
        assert!(is_supported_chain(ARBITRUM));
        assert!(!is_supported_chain(4242));
        assert_eq!(supported_chains().len(), 11);
    }

    #[test]
    fn test_registry_addresses_parse() {
        for chain in supported_chains() {
            assert!(usdc_address(chain).is_some());
            assert!(wrapped_native_address(chain).is_some());
            assert!(chain_name(chain).is_some());
        }
    }

    #[test]
    fn test_native_sentinel() {
        assert!(is_native_address(Address::ZERO));
        assert!(is_native_address(native_sentinel()));
        assert!(!is_native_address(usdc_address(ETHEREUM).unwrap()));
    }

    #[test]
    fn test_usdc_token_shape() {
        let usdc = usdc_token(ETHEREUM).unwrap();
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.chain_id, ETHEREUM);
    }

    #[test]
    fn test_explorer_url() {
        let url = explorer_tx_url(ETHEREUM, "0xabc").unwrap();
        assert_eq!(url, "https://etherscan.io/tx/0xabc");
        assert!(explorer_tx_url(4242, "0xabc").is_none());
    }

    #[test]
    fn test_eip1559_flags() {
        assert!(chain_info(ETHEREUM).unwrap().supports_eip1559);
        assert!(!chain_info(BSC).unwrap().supports_eip1559);
    }
}
