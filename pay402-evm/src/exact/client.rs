//! Client-side payment construction for the exact scheme.
//!
//! [`ExactEvmClient`] turns a selected requirements tuple into a signed inner
//! payload. The flow splits on token capability:
//!
//! - **EIP-3009**: sign `TransferWithAuthorization` against the token's own
//!   EIP-712 domain. Fully off-chain; works with an offline signer.
//! - **ERC-20**: make sure the facilitator contract holds a sufficient
//!   allowance (issuing an `approve` transaction and blocking on its receipt
//!   when it does not), then sign `tokenTransferWithAuthorization` against
//!   the facilitator's domain.

use std::sync::Arc;

use alloy_primitives::{U256, hex};
use alloy_sol_types::SolCall;
use pay402::proto::{PaymentRequirements, PaymentRequirementsV1};
use pay402::scheme::{BoxFuture, SchemeClient, SchemeClientV1, SchemeError};
use rand::Rng;
use serde_json::Value;

use super::contract::{allowanceCall, approveCall};
use super::types::{
    Eip3009Authorization, Eip3009Payload, Erc20Authorization, Erc20Payload, ExactPayload,
};
use super::{SCHEME_EXACT, ValidityPolicy, unix_now};
use crate::capability::{CapabilityCache, verify_eip3009_support};
use crate::networks::EvmNetworks;
use crate::signers::ClientEvmSigner;

/// Generates a random 32-byte nonce as `0x`-prefixed hex.
fn create_nonce() -> String {
    let nonce: [u8; 32] = rand::rng().random();
    hex::encode_prefixed(nonce)
}

/// V2 client for the EVM exact scheme.
pub struct ExactEvmClient<S> {
    signer: S,
    networks: Arc<EvmNetworks>,
    capabilities: Arc<CapabilityCache>,
    validity: ValidityPolicy,
}

impl<S> std::fmt::Debug for ExactEvmClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmClient")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl<S: ClientEvmSigner> ExactEvmClient<S> {
    /// Creates a client with the V2 validity policy and a fresh capability
    /// cache.
    pub fn new(signer: S, networks: Arc<EvmNetworks>) -> Self {
        Self {
            signer,
            networks,
            capabilities: CapabilityCache::shared(),
            validity: ValidityPolicy::V2,
        }
    }

    /// Shares a capability cache with other components.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Arc<CapabilityCache>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Overrides the validity-window policy.
    #[must_use]
    pub const fn with_validity(mut self, validity: ValidityPolicy) -> Self {
        self.validity = validity;
        self
    }

    /// Builds the signed inner payload for one requirements tuple.
    async fn build_payload(
        &self,
        network: &str,
        asset: &str,
        amount: &str,
        pay_to: &str,
        max_timeout_seconds: u64,
        extra: Option<&Value>,
    ) -> Result<Value, SchemeError> {
        let config = self
            .networks
            .config(network)
            .ok_or_else(|| -> SchemeError { format!("unsupported network: {network}").into() })?;
        let asset_info = self
            .networks
            .asset_info(network, asset)
            .ok_or_else(|| -> SchemeError { format!("unknown asset: {asset}").into() })?;

        let value = U256::from_str_radix(amount, 10)
            .map_err(|e| -> SchemeError { format!("invalid amount '{amount}': {e}").into() })?;

        let nonce = create_nonce();
        let (valid_after, valid_before) = self.validity.window(unix_now(), max_timeout_seconds);

        // The seller may pin the token's EIP-712 domain parameters in extra.
        let token_name = extra
            .and_then(|e| e.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(asset_info.name.as_str());
        let token_version = extra
            .and_then(|e| e.get("version"))
            .and_then(Value::as_str)
            .unwrap_or(asset_info.version.as_str());

        // Prefer the gasless EIP-3009 flow when the token supports it. The
        // static flag short-circuits the probe; a probe that cannot reach the
        // chain reports unsupported, which safely lands us on the ERC-20
        // flow.
        let supports_eip3009 = asset_info.supports_eip3009
            || verify_eip3009_support(
                &self.signer,
                &self.capabilities,
                config.chain_id,
                self.signer.address(),
                asset_info.address,
            )
            .await;

        let payload = if supports_eip3009 {
            let authorization = Eip3009Authorization {
                from: self.signer.address().to_string(),
                to: pay_to.to_owned(),
                value: value.to_string(),
                valid_after: valid_after.to_string(),
                valid_before: valid_before.to_string(),
                nonce,
            };

            let message = authorization
                .to_message()
                .map_err(|e| -> SchemeError { e.to_string().into() })?;
            let domain = crate::eip712::eip3009_domain(
                token_name,
                token_version,
                config.chain_id,
                asset_info.address,
            );
            let typed_data = crate::eip712::typed_data_for(&message, &domain);
            let signature = self
                .signer
                .sign_typed_data(&typed_data)
                .await
                .map_err(|e| -> SchemeError { format!("failed to sign authorization: {e}").into() })?;

            ExactPayload::Eip3009(Eip3009Payload {
                signature: hex::encode_prefixed(&signature),
                authorization,
            })
        } else {
            self.ensure_allowance(asset_info.address, value).await?;

            let facilitator = self.networks.facilitator_contract();
            let authorization = Erc20Authorization {
                token: asset_info.address.to_string(),
                from: self.signer.address().to_string(),
                to: pay_to.to_owned(),
                value: value.to_string(),
                valid_after: valid_after.to_string(),
                valid_before: valid_before.to_string(),
                nonce,
                need_approve: true,
            };

            let message = authorization
                .to_message()
                .map_err(|e| -> SchemeError { e.to_string().into() })?;
            let domain = crate::eip712::facilitator_domain(config.chain_id, facilitator);
            let typed_data = crate::eip712::typed_data_for(&message, &domain);
            let signature = self
                .signer
                .sign_typed_data(&typed_data)
                .await
                .map_err(|e| -> SchemeError { format!("failed to sign authorization: {e}").into() })?;

            ExactPayload::Erc20(Erc20Payload {
                signature: hex::encode_prefixed(&signature),
                authorization,
            })
        };

        Ok(serde_json::to_value(payload)?)
    }

    /// Grants the facilitator contract an allowance covering `value`.
    ///
    /// Reads the current allowance and, when short, issues an `approve`
    /// transaction and blocks on its receipt. An already-ample allowance
    /// issues no transaction, so a second payment of the same size needs no
    /// second approval.
    async fn ensure_allowance(
        &self,
        token: alloy_primitives::Address,
        value: U256,
    ) -> Result<(), SchemeError> {
        let facilitator = self.networks.facilitator_contract();
        let owner = self.signer.address();

        let call = allowanceCall {
            owner,
            spender: facilitator,
        };
        let ret = self
            .signer
            .call(token, call.abi_encode().into())
            .await
            .map_err(|e| -> SchemeError { format!("failed to check allowance: {e}").into() })?;
        let allowance = allowanceCall::abi_decode_returns(&ret)
            .map_err(|e| -> SchemeError { format!("invalid allowance return: {e}").into() })?;

        if allowance >= value {
            return Ok(());
        }

        tracing::info!(token = %token, amount = %value, "Approving facilitator allowance");
        let approve = approveCall {
            spender: facilitator,
            value,
        };
        let receipt = self
            .signer
            .send_transaction(token, approve.abi_encode().into())
            .await
            .map_err(|e| -> SchemeError {
                format!("failed to send approve transaction: {e}").into()
            })?;

        if !receipt.status {
            return Err("approve transaction failed".into());
        }

        Ok(())
    }
}

impl<S: ClientEvmSigner + 'static> SchemeClient for ExactEvmClient<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            let extra = if requirements.extra.is_null() {
                None
            } else {
                Some(&requirements.extra)
            };
            self.build_payload(
                &requirements.network,
                &requirements.asset,
                &requirements.amount,
                &requirements.pay_to,
                requirements.max_timeout_seconds,
                extra,
            )
            .await
        })
    }
}

/// V1 client for the EVM exact scheme.
///
/// Same construction flow as [`ExactEvmClient`], with the V1 validity policy
/// and the legacy requirements framing.
pub struct ExactEvmClientV1<S> {
    inner: ExactEvmClient<S>,
}

impl<S> std::fmt::Debug for ExactEvmClientV1<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmClientV1").finish_non_exhaustive()
    }
}

impl<S: ClientEvmSigner> ExactEvmClientV1<S> {
    /// Creates a V1 client.
    pub fn new(signer: S, networks: Arc<EvmNetworks>) -> Self {
        Self {
            inner: ExactEvmClient::new(signer, networks).with_validity(ValidityPolicy::V1),
        }
    }
}

impl<S: ClientEvmSigner + 'static> SchemeClientV1 for ExactEvmClientV1<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move {
            self.inner
                .build_payload(
                    &requirements.network,
                    &requirements.asset,
                    &requirements.max_amount_required,
                    &requirements.pay_to,
                    requirements.max_timeout_seconds,
                    requirements.extra.as_ref(),
                )
                .await
        })
    }
}
