//! EVM (EIP-155) payment mechanisms for the x402 payment protocol.
//!
//! Implements the `exact` payment scheme on EVM-compatible chains for both
//! protocol versions, with two on-chain settlement paths:
//!
//! - **EIP-3009** `transferWithAuthorization` for tokens that support it
//!   (USDC and friends) — fully gasless for the payer.
//! - A **generic ERC-20** path through the facilitator contract, backed by a
//!   one-time allowance, for everything else.
//!
//! Signatures are accepted from EOAs, deployed smart wallets (EIP-1271), and
//! counterfactual smart wallets (ERC-6492, with deployment-on-demand at
//! settlement).
//!
//! # Architecture
//!
//! Leaves first: [`signers`] (capability traits over key material and RPC) →
//! [`eip712`] (typed-data hashing) → [`verify`] (EOA/1271/6492 verifiers) →
//! [`capability`] (EIP-3009 probe cache) → [`exact`] (client, server, and
//! facilitator scheme implementations). [`networks`] carries the injected
//! network/asset table and [`provider`] the production facilitator signer.

pub mod capability;
pub mod chain;
pub mod eip712;
pub mod exact;
pub mod networks;
pub mod provider;
pub mod signers;
pub mod verify;

pub use capability::CapabilityCache;
pub use chain::{AssetInfo, NetworkConfig, caip2, parse_caip2};
pub use exact::{
    ExactEvmClient, ExactEvmClientV1, ExactEvmConfig, ExactEvmFacilitator, ExactEvmFacilitatorV1,
    ExactEvmServer, SCHEME_EXACT,
};
pub use networks::EvmNetworks;
pub use provider::{ChainProviderConfig, EvmFacilitatorSigner};
pub use signers::{ClientEvmSigner, ContractReader, FacilitatorEvmSigner, LocalClientSigner};
