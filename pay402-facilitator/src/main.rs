//! x402 Facilitator HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in the current directory)
//! cargo run -p pay402-facilitator --release
//!
//! # Run with a custom config path
//! CONFIG=/path/to/config.toml cargo run -p pay402-facilitator
//!
//! # Configure logging
//! RUST_LOG=info cargo run -p pay402-facilitator
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to the TOML configuration file (default: `config.toml`)
//! - `HOST` / `PORT` — Override the bind address
//! - `RUST_LOG` — Log level filter (default: `info`)
//! - `EVM_FACILITATOR_CONTRACT_ADDRESS` — Override the facilitator contract
//! - `EVM_USDC_ADDRESS` — Override the test-network USDC address

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy_network::EthereumWallet;
use alloy_rpc_client::RpcClient;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use alloy_transport_http::reqwest::{Client as ReqwestClient, Url};
use axum::http::Method;
use pay402::facilitator::X402Facilitator;
use pay402_evm::capability::CapabilityCache;
use pay402_evm::exact::{ExactEvmConfig, ExactEvmFacilitator, ExactEvmFacilitatorV1};
use pay402_evm::networks::EvmNetworks;
use pay402_evm::provider::{ChainProviderConfig, EvmFacilitatorSigner};
use pay402_evm::signers::FacilitatorEvmSigner;
use tower_http::cors;
use tracing_subscriber::EnvFilter;

use pay402_facilitator::config::{ChainConfig, FacilitatorConfig};
use pay402_facilitator::handlers::{FacilitatorState, facilitator_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = FacilitatorConfig::load()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        chains = config.chains.len(),
        "Loaded configuration"
    );

    if config.chains.is_empty() {
        tracing::warn!("No chains configured — facilitator will report no supported schemes");
    }

    let networks = EvmNetworks::from_env().shared();
    let capabilities = CapabilityCache::shared();
    let evm_config = ExactEvmConfig {
        deploy_erc4337_with_eip6492: config.deploy_erc4337_with_eip6492,
    };

    let mut facilitator = X402Facilitator::new();

    for (network_id, chain_cfg) in &config.chains {
        let Some(expected_chain_id) = networks.chain_id(network_id) else {
            tracing::warn!(network = %network_id, "Skipping chain: invalid network identifier");
            continue;
        };

        let Some(wallet) = build_wallet(network_id, chain_cfg) else {
            continue;
        };

        let Some(signer) = create_signer(network_id, chain_cfg, expected_chain_id, wallet).await
        else {
            tracing::error!(network = %network_id, "RPC endpoint failed — skipping chain");
            continue;
        };
        let signer = Arc::new(signer);

        tracing::info!(
            network = %network_id,
            signers = ?signer.addresses(),
            "Registered EVM exact scheme"
        );

        let v2 = ExactEvmFacilitator::with_config(
            Arc::clone(&signer),
            Arc::clone(&networks),
            evm_config,
        )
        .with_capabilities(Arc::clone(&capabilities));
        facilitator.register(vec![network_id.clone()], Arc::new(v2));

        // Legacy clients address networks by name.
        let v1_networks = legacy_names(network_id);
        if !v1_networks.is_empty() {
            let v1 = ExactEvmFacilitatorV1::with_config(
                Arc::clone(&signer),
                Arc::clone(&networks),
                evm_config,
            );
            facilitator.register_v1(v1_networks, Arc::new(v1));
        }
    }

    let state: FacilitatorState = Arc::new(facilitator);

    let app = facilitator_router(Arc::clone(&state)).layer(
        cors::CorsLayer::new()
            .allow_origin(cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(cors::Any),
    );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Facilitator shut down gracefully");
    Ok(())
}

/// Parses the chain's signer keys into a wallet.
fn build_wallet(network_id: &str, chain_cfg: &ChainConfig) -> Option<EthereumWallet> {
    let signer_keys = chain_cfg.effective_signer_keys();
    if signer_keys.is_empty() {
        tracing::warn!(network = %network_id, "Skipping chain: no signer keys configured");
        return None;
    }

    let mut signers: Vec<PrivateKeySigner> = Vec::with_capacity(signer_keys.len());
    for (i, key_str) in signer_keys.iter().enumerate() {
        let trimmed = key_str.trim();
        if trimmed.is_empty() || trimmed.starts_with('$') {
            tracing::warn!(
                network = %network_id, signer_index = i,
                "Skipping chain: signer key not resolved (missing env var?)"
            );
            return None;
        }
        match trimmed.parse::<PrivateKeySigner>() {
            Ok(s) => signers.push(s),
            Err(e) => {
                tracing::warn!(
                    network = %network_id, signer_index = i,
                    "Skipping chain: invalid signer key: {e}"
                );
                return None;
            }
        }
    }

    let mut wallet = EthereumWallet::from(signers.remove(0));
    for s in signers {
        wallet.register_signer(s);
    }
    Some(wallet)
}

/// Creates the provider-backed signer for one chain, with an optional
/// startup `eth_chainId` health check.
async fn create_signer(
    network_id: &str,
    chain_cfg: &ChainConfig,
    expected_chain_id: u64,
    wallet: EthereumWallet,
) -> Option<EvmFacilitatorSigner> {
    let rpc_url: Url = match chain_cfg.rpc_url.parse() {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(network = %network_id, url = %chain_cfg.rpc_url, "Invalid RPC URL: {e}");
            return None;
        }
    };

    let http_client = match ReqwestClient::builder()
        .timeout(Duration::from_secs(chain_cfg.timeout_seconds))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(network = %network_id, "Failed to build HTTP client: {e}");
            return None;
        }
    };
    let transport = Http::with_client(http_client, rpc_url);
    let rpc_client = RpcClient::new(transport, false);

    let provider_config = ChainProviderConfig {
        eip1559: chain_cfg.eip1559,
        receipt_timeout_secs: chain_cfg.receipt_timeout_secs,
    };
    let signer = EvmFacilitatorSigner::new(rpc_client, wallet, provider_config);

    if chain_cfg.health_check {
        match signer.get_chain_id().await {
            Ok(id) if id == expected_chain_id => {
                tracing::info!(
                    network = %network_id, chain_id = id,
                    "RPC health check passed"
                );
            }
            Ok(id) => {
                tracing::warn!(
                    network = %network_id,
                    expected = expected_chain_id, actual = id,
                    "Chain ID mismatch"
                );
                return None;
            }
            Err(e) => {
                tracing::warn!(network = %network_id, "RPC health check failed: {e}");
                return None;
            }
        }
    }

    Some(signer)
}

/// Legacy (V1) network names for a canonical CAIP-2 identifier.
fn legacy_names(network_id: &str) -> Vec<String> {
    let names: &[&str] = match network_id {
        "eip155:1" => &["ethereum"],
        "eip155:8453" => &["base", "base-mainnet"],
        "eip155:84532" => &["base-sepolia"],
        _ => &[],
    };
    names.iter().map(ToString::to_string).collect()
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
