//! EVM signer abstractions.
//!
//! The payment mechanisms never hold key material or speak JSON-RPC
//! directly; they consume the two capability sets defined here. A client
//! signer can produce EIP-712 signatures and submit its own transactions
//! (ERC-20 approvals); a facilitator signer can additionally inspect chain
//! state (`get_code`) and submit settlement transactions from a rotating set
//! of addresses.
//!
//! `send_transaction` submits and blocks until the receipt is available.
//! Cancelling a caller after submission does not cancel the on-chain
//! transaction; the settlement is durable and may complete out-of-band, so
//! a cancelled settlement must be treated as "outcome unknown".

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, Signature, TxHash, U256};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::TransportError;
use pay402::scheme::BoxFuture;

/// Errors produced by signer implementations.
///
/// Only [`SignerError::Contract`] attributes a failure to contract logic: it
/// carries a revert that came back *with* return data. A bare error response
/// without revert data ([`SignerError::Call`]) and a transport failure
/// ([`SignerError::Transport`]) cannot be blamed on the contract, so callers
/// must not report them as payment rejections.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// RPC transport failure (network unreachable, timeout, bad response).
    #[error("transport error: {0}")]
    Transport(String),

    /// Contract execution reverted with return data.
    #[error("execution reverted: {0}")]
    Contract(String),

    /// JSON-RPC error response without revert data (bare revert, missing
    /// selector, node-side rejection).
    #[error("call failed: {0}")]
    Call(String),

    /// Signing failed (bad key, rejected request).
    #[error("signing failed: {0}")]
    Signing(String),

    /// Transaction submitted but the receipt could not be obtained.
    #[error("receipt unavailable: {0}")]
    Receipt(String),
}

impl SignerError {
    /// Classifies a transport error.
    ///
    /// A JSON-RPC error response means the node evaluated the call:
    /// [`Self::Contract`] when it carries revert data, [`Self::Call`] when it
    /// does not (a bare revert looks identical to a rejected selector from
    /// out here). Everything else is [`Self::Transport`].
    #[must_use]
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::ErrorResp(payload) => {
                let data = payload
                    .data
                    .as_ref()
                    .map(|raw| raw.get().trim_matches('"').to_owned());
                match data {
                    Some(data) if !data.is_empty() && data != "0x" && data != "null" => {
                        Self::Contract(format!("{} ({data})", payload.message))
                    }
                    _ => Self::Call(payload.message.to_string()),
                }
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Receipt of a mined transaction.
///
/// Ephemeral: produced once per settlement and consumed by the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Transaction hash.
    pub transaction_hash: TxHash,
    /// `true` when the transaction succeeded (status 1).
    pub status: bool,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

/// Read-only contract call capability shared by both signer roles.
///
/// `call` performs an `eth_call` simulation; reverts surface as
/// [`SignerError::Contract`] carrying the revert message.
pub trait ContractReader: Send + Sync {
    /// Simulates a contract call and returns the raw return data.
    fn call(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>>;
}

/// Client-side EVM signing operations.
pub trait ClientEvmSigner: ContractReader {
    /// Returns the signer's address.
    fn address(&self) -> Address;

    /// Signs EIP-712 typed data.
    ///
    /// The result is always 65 bytes, laid out `r || s || v` with
    /// `v ∈ {27, 28}` (raw recovery ids below 27 are normalized by adding
    /// 27). Verifiers must nevertheless accept `v ∈ {0, 1}` from foreign
    /// implementations.
    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, SignerError>>;

    /// Submits a transaction and blocks until it is mined.
    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>>;
}

/// Facilitator-side EVM operations.
///
/// Supports multiple signing addresses for load balancing and key rotation.
pub trait FacilitatorEvmSigner: ContractReader {
    /// Returns all addresses this facilitator can settle from.
    fn addresses(&self) -> Vec<Address>;

    /// Returns the bytecode at an address (empty for EOAs).
    fn get_code(&self, address: Address) -> BoxFuture<'_, Result<Bytes, SignerError>>;

    /// Returns the chain ID of the connected network.
    fn get_chain_id(&self) -> BoxFuture<'_, Result<u64, SignerError>>;

    /// Returns the ERC-20 token balance of an address.
    fn get_balance(
        &self,
        account: Address,
        token: Address,
    ) -> BoxFuture<'_, Result<U256, SignerError>>;

    /// Submits a transaction and blocks until it is mined.
    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>>;

    /// Verifies an EIP-712 signature against an expected EOA signer.
    ///
    /// Hashes the typed data and recovers the signer locally; smart-wallet
    /// signatures go through the universal verification path instead.
    fn verify_typed_data<'a>(
        &'a self,
        address: Address,
        typed_data: &'a TypedData,
        signature: &'a [u8],
    ) -> BoxFuture<'a, Result<bool, SignerError>> {
        Box::pin(async move {
            let hash = typed_data
                .eip712_signing_hash()
                .map_err(|e| SignerError::Signing(e.to_string()))?;
            let parsed = Signature::from_raw(signature)
                .map_err(|e| SignerError::Signing(e.to_string()))?;
            let recovered = parsed
                .recover_address_from_prehash(&hash)
                .map_err(|e| SignerError::Signing(e.to_string()))?;
            Ok(recovered == address)
        })
    }
}

impl<T: ContractReader + ?Sized> ContractReader for std::sync::Arc<T> {
    fn call(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        (**self).call(to, calldata)
    }
}

impl<T: FacilitatorEvmSigner + ?Sized> FacilitatorEvmSigner for std::sync::Arc<T> {
    fn addresses(&self) -> Vec<Address> {
        (**self).addresses()
    }

    fn get_code(&self, address: Address) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        (**self).get_code(address)
    }

    fn get_chain_id(&self) -> BoxFuture<'_, Result<u64, SignerError>> {
        (**self).get_chain_id()
    }

    fn get_balance(
        &self,
        account: Address,
        token: Address,
    ) -> BoxFuture<'_, Result<U256, SignerError>> {
        (**self).get_balance(account, token)
    }

    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>> {
        (**self).send_transaction(to, calldata)
    }
}

/// Serializes a signature into the canonical 65-byte `r || s || v` layout
/// with `v ∈ {27, 28}`.
#[must_use]
pub fn normalize_signature(signature: &Signature) -> Bytes {
    let mut out = Vec::with_capacity(65);
    out.extend_from_slice(&signature.r().to_be_bytes::<32>());
    out.extend_from_slice(&signature.s().to_be_bytes::<32>());
    out.push(27 + u8::from(signature.v()));
    out.into()
}

/// A [`ClientEvmSigner`] backed by a local private key and an alloy provider.
///
/// The provider is optional: an offline signer can still produce EIP-3009
/// payloads (no RPC needed), but allowance checks, capability probes, and
/// approval transactions require a connection. For the approval flow the
/// provider must be wallet-configured so it can sign outgoing transactions.
pub struct LocalClientSigner<P> {
    signer: PrivateKeySigner,
    provider: Option<P>,
}

impl<P> std::fmt::Debug for LocalClientSigner<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClientSigner")
            .field("address", &self.signer.address())
            .field("connected", &self.provider.is_some())
            .finish()
    }
}

impl<P> LocalClientSigner<P> {
    /// Creates a signer connected to an RPC provider.
    pub const fn new(signer: PrivateKeySigner, provider: P) -> Self {
        Self {
            signer,
            provider: Some(provider),
        }
    }

    /// Creates an offline signer (EIP-3009 flow only).
    pub const fn offline(signer: PrivateKeySigner) -> Self {
        Self {
            signer,
            provider: None,
        }
    }

    fn provider(&self) -> Result<&P, SignerError> {
        self.provider
            .as_ref()
            .ok_or_else(|| SignerError::Transport("no RPC connection configured".to_owned()))
    }
}

impl<P> ContractReader for LocalClientSigner<P>
where
    P: alloy_provider::Provider + Send + Sync,
{
    fn call(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        Box::pin(async move {
            let provider = self.provider()?;
            let tx = TransactionRequest::default().to(to).input(calldata.into());
            provider.call(tx).await.map_err(SignerError::from_transport)
        })
    }
}

impl<P> ClientEvmSigner for LocalClientSigner<P>
where
    P: alloy_provider::Provider + Send + Sync,
{
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, SignerError>> {
        Box::pin(async move {
            let signature = self
                .signer
                .sign_dynamic_typed_data(typed_data)
                .await
                .map_err(|e| SignerError::Signing(e.to_string()))?;
            Ok(normalize_signature(&signature))
        })
    }

    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>> {
        Box::pin(async move {
            let provider = self.provider()?;
            let tx = TransactionRequest::default()
                .from(self.signer.address())
                .to(to)
                .input(calldata.into());
            let pending = provider
                .send_transaction(tx)
                .await
                .map_err(SignerError::from_transport)?;
            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| SignerError::Receipt(e.to_string()))?;
            Ok(TransactionReceipt {
                transaction_hash: receipt.transaction_hash,
                status: receipt.status(),
                block_number: receipt.block_number,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_json_rpc::ErrorPayload;
    use alloy_primitives::B256;

    fn error_resp(data: Option<&str>) -> TransportError {
        TransportError::ErrorResp(ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: data.map(|d| serde_json::value::to_raw_value(d).unwrap()),
        })
    }

    #[test]
    fn test_from_transport_revert_with_data_is_contract() {
        let err = SignerError::from_transport(error_resp(Some("0x08c379a0")));
        assert!(matches!(err, SignerError::Contract(_)));
    }

    #[test]
    fn test_from_transport_bare_error_response_is_call() {
        let err = SignerError::from_transport(error_resp(None));
        assert!(matches!(err, SignerError::Call(_)));

        // Empty revert data is the same as no data.
        let err = SignerError::from_transport(error_resp(Some("0x")));
        assert!(matches!(err, SignerError::Call(_)));
    }

    #[tokio::test]
    async fn test_normalize_signature_layout() {
        let signer = PrivateKeySigner::random();
        let hash = B256::repeat_byte(0x42);
        let signature = signer.sign_hash(&hash).await.unwrap();
        let bytes = normalize_signature(&signature);

        assert_eq!(bytes.len(), 65);
        let v = bytes[64];
        assert!(v == 27 || v == 28);
        assert_eq!(&bytes[..32], signature.r().to_be_bytes::<32>().as_slice());
        assert_eq!(&bytes[32..64], signature.s().to_be_bytes::<32>().as_slice());
    }

    #[tokio::test]
    async fn test_signing_is_deterministic() {
        // RFC 6979 nonces: same key + same digest => bytewise-equal signatures.
        let signer = PrivateKeySigner::random();
        let hash = B256::repeat_byte(0x17);
        let first = normalize_signature(&signer.sign_hash(&hash).await.unwrap());
        let second = normalize_signature(&signer.sign_hash(&hash).await.unwrap());
        assert_eq!(first, second);
    }
}
