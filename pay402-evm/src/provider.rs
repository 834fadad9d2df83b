//! Production EVM provider implementing [`FacilitatorEvmSigner`].
//!
//! Wraps a fully-composed alloy provider with:
//! - [`PendingNonceManager`] for concurrent nonce tracking with pending queries
//! - Gas / blob-gas / nonce / chain-id / wallet fillers
//! - Multiple signer support with round-robin selection
//! - Automatic nonce reset on transaction failures
//! - Configurable EIP-1559/legacy gas and receipt timeouts

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_network::{Ethereum, EthereumWallet, Network, NetworkWallet};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, NonceManager,
    WalletFiller,
};
use alloy_provider::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_sol_types::SolCall;
use alloy_transport::TransportResult;
use dashmap::DashMap;
use futures::lock::Mutex;
use pay402::scheme::BoxFuture;

use crate::exact::contract::balanceOfCall;
use crate::signers::{ContractReader, FacilitatorEvmSigner, SignerError, TransactionReceipt};

/// Nonce manager that queries pending transactions for the initial nonce.
///
/// Unlike alloy's default `CachedNonceManager` which uses the `latest`
/// transaction count, this manager queries with `.pending()` on first use,
/// which includes transactions still in the mempool. This prevents
/// "nonce too low" errors when the facilitator restarts while settlement
/// transactions are still pending.
///
/// - **First call per address**: queries with `.pending()` from RPC
/// - **Subsequent calls**: increments the cached nonce locally
/// - **On failure**: [`reset_nonce`](Self::reset_nonce) forces a re-query
#[derive(Clone, Debug, Default)]
pub struct PendingNonceManager {
    nonces: Arc<DashMap<Address, Arc<Mutex<u64>>>>,
}

const NONCE_UNSET: u64 = u64::MAX;

#[async_trait::async_trait]
impl NonceManager for PendingNonceManager {
    async fn get_next_nonce<P, N>(&self, provider: &P, address: Address) -> TransportResult<u64>
    where
        P: Provider<N>,
        N: Network,
    {
        let slot = {
            let entry = self
                .nonces
                .entry(address)
                .or_insert_with(|| Arc::new(Mutex::new(NONCE_UNSET)));
            Arc::clone(entry.value())
        };

        let mut nonce = slot.lock().await;
        let new_nonce = if *nonce == NONCE_UNSET {
            provider.get_transaction_count(address).pending().await?
        } else {
            *nonce + 1
        };
        *nonce = new_nonce;
        Ok(new_nonce)
    }
}

impl PendingNonceManager {
    /// Resets the cached nonce for an address, forcing a fresh RPC query on
    /// next use.
    ///
    /// Call this when a transaction fails: the on-chain state is uncertain
    /// (the transaction may or may not have reached the mempool).
    pub async fn reset_nonce(&self, address: Address) {
        if let Some(nonce_lock) = self.nonces.get(&address) {
            let mut nonce = nonce_lock.lock().await;
            *nonce = NONCE_UNSET;
        }
    }
}

/// Combined filler type: gas + blob gas + nonce + chain ID.
pub type InnerFiller = JoinFill<
    GasFiller,
    JoinFill<BlobGasFiller, JoinFill<NonceFiller<PendingNonceManager>, ChainIdFiller>>,
>;

/// Fully composed Ethereum provider with all fillers and wallet signing.
pub type FullProvider = FillProvider<
    JoinFill<JoinFill<Identity, InnerFiller>, WalletFiller<EthereumWallet>>,
    RootProvider,
>;

/// Configuration for [`EvmFacilitatorSigner`].
#[derive(Debug, Clone, Copy)]
pub struct ChainProviderConfig {
    /// Whether the chain supports EIP-1559 gas pricing (default: `true`).
    pub eip1559: bool,
    /// Seconds to wait for a transaction receipt (default: 30).
    pub receipt_timeout_secs: u64,
}

impl Default for ChainProviderConfig {
    fn default() -> Self {
        Self {
            eip1559: true,
            receipt_timeout_secs: 30,
        }
    }
}

/// Production facilitator signer over a fully-composed alloy provider.
///
/// Settlement transactions rotate among the wallet's signer addresses for
/// load distribution; nonces are tracked per address and reset on failure.
#[derive(Debug)]
pub struct EvmFacilitatorSigner {
    inner: FullProvider,
    eip1559: bool,
    receipt_timeout_secs: u64,
    signer_addrs: Arc<Vec<Address>>,
    signer_cursor: Arc<AtomicUsize>,
    nonce_manager: PendingNonceManager,
}

impl EvmFacilitatorSigner {
    /// Creates a new signer from a pre-built RPC client and wallet.
    ///
    /// The `rpc_client` should already be configured with transport-level
    /// concerns (timeouts, fallback, rate limits). The `wallet` should
    /// contain all signers for this chain.
    #[must_use]
    pub fn new(rpc_client: RpcClient, wallet: EthereumWallet, config: ChainProviderConfig) -> Self {
        let signer_addrs: Vec<Address> =
            NetworkWallet::<Ethereum>::signer_addresses(&wallet).collect();
        let signer_addrs = Arc::new(signer_addrs);
        let nonce_manager = PendingNonceManager::default();

        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(nonce_manager.clone()),
                    ChainIdFiller::default(),
                ),
            ),
        );

        let inner: FullProvider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(rpc_client);

        Self {
            inner,
            eip1559: config.eip1559,
            receipt_timeout_secs: config.receipt_timeout_secs,
            signer_addrs,
            signer_cursor: Arc::new(AtomicUsize::new(0)),
            nonce_manager,
        }
    }

    /// Returns the underlying provider for read operations.
    #[must_use]
    pub const fn read_provider(&self) -> &FullProvider {
        &self.inner
    }

    /// Selects the next signer address using round-robin rotation.
    fn next_signer(&self) -> Address {
        if self.signer_addrs.len() == 1 {
            self.signer_addrs[0]
        } else {
            let idx = self.signer_cursor.fetch_add(1, Ordering::Relaxed) % self.signer_addrs.len();
            self.signer_addrs[idx]
        }
    }
}

impl ContractReader for EvmFacilitatorSigner {
    fn call(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        Box::pin(async move {
            let tx = TransactionRequest::default().to(to).input(calldata.into());
            self.inner
                .call(tx)
                .await
                .map_err(SignerError::from_transport)
        })
    }
}

impl FacilitatorEvmSigner for EvmFacilitatorSigner {
    fn addresses(&self) -> Vec<Address> {
        self.signer_addrs.as_ref().clone()
    }

    fn get_code(&self, address: Address) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        Box::pin(async move {
            self.inner
                .get_code_at(address)
                .await
                .map_err(SignerError::from_transport)
        })
    }

    fn get_chain_id(&self) -> BoxFuture<'_, Result<u64, SignerError>> {
        Box::pin(async move {
            self.inner
                .get_chain_id()
                .await
                .map_err(SignerError::from_transport)
        })
    }

    fn get_balance(
        &self,
        account: Address,
        token: Address,
    ) -> BoxFuture<'_, Result<U256, SignerError>> {
        Box::pin(async move {
            let calldata = balanceOfCall { account }.abi_encode();
            let ret = self
                .inner
                .call(TransactionRequest::default().to(token).input(calldata.into()))
                .await
                .map_err(SignerError::from_transport)?;
            balanceOfCall::abi_decode_returns(&ret)
                .map_err(|e| SignerError::Call(format!("invalid balanceOf return: {e}")))
        })
    }

    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>> {
        Box::pin(async move {
            let from_address = self.next_signer();

            let mut txr = TransactionRequest::default()
                .from(from_address)
                .to(to)
                .input(calldata.into());

            // Legacy gas pricing for non-EIP-1559 chains
            if !self.eip1559 {
                let gas = self
                    .inner
                    .get_gas_price()
                    .await
                    .map_err(SignerError::from_transport)?;
                txr.gas_price = Some(gas);
            }

            // Send with nonce reset on failure
            let pending = match self.inner.send_transaction(txr).await {
                Ok(pending) => pending,
                Err(e) => {
                    self.nonce_manager.reset_nonce(from_address).await;
                    return Err(SignerError::from_transport(e));
                }
            };

            // Wait for receipt with timeout
            let timeout = std::time::Duration::from_secs(self.receipt_timeout_secs);
            let watcher = pending
                .with_required_confirmations(1)
                .with_timeout(Some(timeout));

            match watcher.get_receipt().await {
                Ok(receipt) => Ok(TransactionReceipt {
                    transaction_hash: receipt.transaction_hash,
                    status: receipt.status(),
                    block_number: receipt.block_number,
                }),
                Err(e) => {
                    self.nonce_manager.reset_nonce(from_address).await;
                    Err(SignerError::Receipt(e.to_string()))
                }
            }
        })
    }
}
