//! Known EVM network definitions and token deployments.
//!
//! [`EvmNetworks`] is the process-wide network table described by the
//! protocol: canonical CAIP-2 keys, USDC deployments, legacy alias
//! normalization, and the facilitator contract address. It is built once
//! (typically via [`EvmNetworks::from_env`]) and injected into the schemes at
//! construction; it is read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, address};

use crate::chain::{AssetInfo, ChainId, NetworkConfig, parse_caip2};

/// Facilitator contract address deployed at the same address on all
/// supported networks. Override with `EVM_FACILITATOR_CONTRACT_ADDRESS`.
pub const DEFAULT_FACILITATOR_CONTRACT: Address =
    address!("0x555e3311a9893c9B17444C1Ff0d88192a57Ef13e");

/// USDC on Ethereum mainnet.
const USDC_MAINNET: Address = address!("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
/// USDC on Base.
const USDC_BASE: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
/// USDC on Base Sepolia. Override with `EVM_USDC_ADDRESS`.
const USDC_BASE_SEPOLIA: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

/// Resolves legacy network aliases to their canonical CAIP-2 form.
#[must_use]
pub fn normalize_network(network: &str) -> &str {
    match network {
        "ethereum" | "mainnet" => "eip155:1",
        "base" | "base-mainnet" => "eip155:8453",
        "base-sepolia" => "eip155:84532",
        other => other,
    }
}

fn usdc(address: Address, name: &str) -> AssetInfo {
    AssetInfo {
        address,
        name: name.to_owned(),
        version: "2".to_owned(),
        decimals: 6,
        supports_eip3009: true,
    }
}

fn network(network: &str, chain_id: ChainId, default_asset: AssetInfo) -> NetworkConfig {
    let mut supported_assets = HashMap::with_capacity(1);
    supported_assets.insert("USDC".to_owned(), default_asset.clone());
    NetworkConfig {
        network: network.to_owned(),
        chain_id,
        default_asset,
        supported_assets,
    }
}

/// The table of EVM networks and assets a deployment knows about.
///
/// Holds the per-network configuration plus the facilitator contract address
/// used for the generic ERC-20 authorization flow.
#[derive(Debug, Clone)]
pub struct EvmNetworks {
    configs: HashMap<String, NetworkConfig>,
    facilitator_contract: Address,
}

impl Default for EvmNetworks {
    fn default() -> Self {
        Self::builtin()
    }
}

impl EvmNetworks {
    /// Builds the table from the built-in constants, ignoring the
    /// environment.
    #[must_use]
    pub fn builtin() -> Self {
        let mut configs = HashMap::with_capacity(3);
        for config in [
            network("eip155:1", 1, usdc(USDC_MAINNET, "USD Coin")),
            network("eip155:8453", 8453, usdc(USDC_BASE, "USD Coin")),
            network("eip155:84532", 84532, usdc(USDC_BASE_SEPOLIA, "USDC")),
        ] {
            configs.insert(config.network.clone(), config);
        }
        Self {
            configs,
            facilitator_contract: DEFAULT_FACILITATOR_CONTRACT,
        }
    }

    /// Builds the table from the built-in constants plus environment
    /// overrides.
    ///
    /// - `EVM_FACILITATOR_CONTRACT_ADDRESS` replaces the facilitator
    ///   contract address.
    /// - `EVM_USDC_ADDRESS` replaces the test-network (Base Sepolia) USDC
    ///   address, for sandbox deployments.
    ///
    /// Unparseable override values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut networks = Self::builtin();

        if let Ok(raw) = std::env::var("EVM_FACILITATOR_CONTRACT_ADDRESS") {
            match raw.parse::<Address>() {
                Ok(addr) => networks.facilitator_contract = addr,
                Err(e) => {
                    tracing::warn!("Ignoring invalid EVM_FACILITATOR_CONTRACT_ADDRESS: {e}");
                }
            }
        }

        if let Ok(raw) = std::env::var("EVM_USDC_ADDRESS") {
            match raw.parse::<Address>() {
                Ok(addr) => networks.override_usdc("eip155:84532", addr),
                Err(e) => tracing::warn!("Ignoring invalid EVM_USDC_ADDRESS: {e}"),
            }
        }

        networks
    }

    /// Creates a table from explicit configurations.
    #[must_use]
    pub fn with_configs(configs: Vec<NetworkConfig>, facilitator_contract: Address) -> Self {
        let configs = configs
            .into_iter()
            .map(|c| (c.network.clone(), c))
            .collect();
        Self {
            configs,
            facilitator_contract,
        }
    }

    /// Returns the facilitator contract address.
    #[must_use]
    pub const fn facilitator_contract(&self) -> Address {
        self.facilitator_contract
    }

    /// Looks up a network configuration, resolving legacy aliases.
    #[must_use]
    pub fn config(&self, network: &str) -> Option<&NetworkConfig> {
        self.configs.get(normalize_network(network))
    }

    /// Returns `true` if the network resolves to a known configuration.
    #[must_use]
    pub fn is_valid_network(&self, network: &str) -> bool {
        self.config(network).is_some()
    }

    /// Resolves a network to its chain ID.
    ///
    /// Falls back to parsing the CAIP-2 reference for networks without a
    /// stored configuration.
    #[must_use]
    pub fn chain_id(&self, network: &str) -> Option<ChainId> {
        self.config(network)
            .map(|c| c.chain_id)
            .or_else(|| parse_caip2(normalize_network(network)))
    }

    /// Resolves asset information by address or symbol.
    ///
    /// An address that matches a known deployment returns that deployment;
    /// an unknown address returns a generic ERC-20 descriptor (18 decimals,
    /// no EIP-3009) to be refined by the capability probe. A symbol is looked
    /// up case-insensitively; anything else falls back to the network's
    /// default asset.
    #[must_use]
    pub fn asset_info(&self, network: &str, asset: &str) -> Option<AssetInfo> {
        let config = self.config(network)?;

        if let Ok(address) = asset.parse::<Address>() {
            if let Some(known) = config.find_asset(address) {
                return Some(known.clone());
            }
            return Some(AssetInfo {
                address,
                name: "Unknown Token".to_owned(),
                version: "1".to_owned(),
                decimals: 18,
                supports_eip3009: false,
            });
        }

        if let Some(known) = config.supported_assets.get(&asset.to_uppercase()) {
            return Some(known.clone());
        }

        Some(config.default_asset.clone())
    }

    /// Replaces the USDC deployment address on a network (sandbox override).
    fn override_usdc(&mut self, network: &str, address: Address) {
        if let Some(config) = self.configs.get_mut(network) {
            config.default_asset.address = address;
            if let Some(asset) = config.supported_assets.get_mut("USDC") {
                asset.address = address;
            }
        }
    }

    /// Returns all canonical network identifiers in the table.
    #[must_use]
    pub fn network_ids(&self) -> Vec<String> {
        self.configs.keys().cloned().collect()
    }

    /// Wraps the table in an [`Arc`] for sharing across schemes.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
