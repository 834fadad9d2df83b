//! EVM chain primitives.
//!
//! Core types for working with EIP-155 chains: chain identifiers, token
//! asset information, and per-network configuration.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An EIP-155 chain ID (e.g., 8453 for Base, 84532 for Base Sepolia).
pub type ChainId = u64;

/// Formats a chain ID as a CAIP-2 identifier.
///
/// Example: `caip2(8453)` returns `"eip155:8453"`.
#[must_use]
pub fn caip2(chain_id: ChainId) -> String {
    format!("eip155:{chain_id}")
}

/// Parses a CAIP-2 identifier into an EIP-155 chain ID.
///
/// Returns `None` if the input is not a valid `eip155:` prefixed string.
#[must_use]
pub fn parse_caip2(caip: &str) -> Option<ChainId> {
    caip.strip_prefix("eip155:").and_then(|s| s.parse().ok())
}

/// Asset information for a token on a specific network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Contract address.
    pub address: Address,
    /// EIP-712 domain name for the token contract.
    pub name: String,
    /// EIP-712 domain version for the token contract.
    pub version: String,
    /// Number of decimals (e.g., 6 for USDC).
    pub decimals: u8,
    /// Whether the token implements EIP-3009 `transferWithAuthorization`.
    ///
    /// When set, this static flag short-circuits the on-chain capability
    /// probe.
    pub supports_eip3009: bool,
}

/// Configuration for a known EVM network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Canonical CAIP-2 network identifier (e.g., `"eip155:8453"`).
    pub network: String,
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// The network's default payment asset.
    pub default_asset: AssetInfo,
    /// Additional assets keyed by upper-case symbol.
    pub supported_assets: HashMap<String, AssetInfo>,
}

impl NetworkConfig {
    /// Finds an asset by its contract address.
    ///
    /// Address comparison is binary, so hex case differences never matter.
    #[must_use]
    pub fn find_asset(&self, address: Address) -> Option<&AssetInfo> {
        if self.default_asset.address == address {
            return Some(&self.default_asset);
        }
        self.supported_assets
            .values()
            .find(|a| a.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caip2_roundtrip() {
        assert_eq!(caip2(8453), "eip155:8453");
        assert_eq!(parse_caip2("eip155:8453"), Some(8453));
        assert_eq!(parse_caip2("eip155:x"), None);
        assert_eq!(parse_caip2("solana:mainnet"), None);
    }

    #[test]
    fn test_find_asset_is_case_insensitive() {
        let asset = AssetInfo {
            address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
                .parse()
                .unwrap(),
            name: "USDC".into(),
            version: "2".into(),
            decimals: 6,
            supports_eip3009: true,
        };
        let config = NetworkConfig {
            network: "eip155:84532".into(),
            chain_id: 84532,
            default_asset: asset.clone(),
            supported_assets: HashMap::new(),
        };

        let lower: Address = "0x036cbd53842c5426634e7929541ec2318f3dcf7e"
            .parse()
            .unwrap();
        assert_eq!(config.find_asset(lower), Some(&asset));
    }
}
