//! Facilitator-side verification and settlement for the exact scheme.
//!
//! Verification is purely off-chain: payload shape, recipient, amount, and
//! validity-window checks followed by universal signature verification
//! (EOA / EIP-1271 / ERC-6492). Settlement re-verifies, deploys
//! counterfactual wallets on demand (behind a configuration switch), and
//! invokes `settlePayment` on the facilitator contract — which is the ground
//! truth for window freshness, nonce uniqueness, and allowance.
//!
//! Business rejections come back as invalid/error responses carrying a
//! machine-readable reason; transport failures propagate as errors so they
//! are never misreported as signature failures.

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::{SolCall, SolStruct};
use pay402::proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    VerifyResponse,
};
use pay402::scheme::{
    BoxFuture, SchemeError, SchemeFacilitator, SchemeFacilitatorV1,
};
use serde_json::Value;

use super::contract::settlePaymentCall;
use super::types::{Erc20Payload, ExactPayload, parse_hex_bytes};
use super::{CAIP_FAMILY_EIP155, PAYLOAD_TYPE_EIP3009, PAYLOAD_TYPE_ERC20, SCHEME_EXACT, reason, unix_now};
use crate::capability::{CapabilityCache, verify_eip3009_support};
use crate::chain::AssetInfo;
use crate::eip712::{eip3009_domain, facilitator_domain};
use crate::networks::EvmNetworks;
use crate::signers::{FacilitatorEvmSigner, SignerError};
use crate::verify::{SignatureVerificationError, verify_universal_signature};

/// Configuration for [`ExactEvmFacilitator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactEvmConfig {
    /// Deploy ERC-4337 smart wallets via their ERC-6492 factory calldata
    /// when an undeployed-wallet signature reaches settlement.
    ///
    /// When disabled, such settlements fail with
    /// [`reason::UNDEPLOYED_SMART_WALLET`].
    pub deploy_erc4337_with_eip6492: bool,
}

/// EVM facilitator implementation for the exact payment scheme.
pub struct ExactEvmFacilitator<S> {
    signer: S,
    networks: Arc<EvmNetworks>,
    capabilities: Arc<CapabilityCache>,
    config: ExactEvmConfig,
}

impl<S> std::fmt::Debug for ExactEvmFacilitator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmFacilitator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Fully validated payment data needed by settlement.
struct Analyzed {
    payer: Address,
    payer_str: String,
    hash: B256,
    signature: Vec<u8>,
    asset_info: AssetInfo,
    exact: ExactPayload,
}

/// Outcome of the off-chain verification pipeline.
enum Checked {
    Valid(Analyzed),
    Invalid(VerifyResponse),
}

impl Checked {
    fn invalid(reason: &str, message: impl Into<String>) -> Self {
        Self::Invalid(VerifyResponse::invalid(reason, message))
    }

    fn invalid_with_payer(reason: &str, message: impl Into<String>, payer: &str) -> Self {
        Self::Invalid(VerifyResponse::invalid_with_payer(reason, message, payer))
    }
}

impl<S: FacilitatorEvmSigner> ExactEvmFacilitator<S> {
    /// Creates a facilitator with default configuration.
    pub fn new(signer: S, networks: Arc<EvmNetworks>) -> Self {
        Self::with_config(signer, networks, ExactEvmConfig::default())
    }

    /// Creates a facilitator with explicit configuration.
    pub fn with_config(signer: S, networks: Arc<EvmNetworks>, config: ExactEvmConfig) -> Self {
        Self {
            signer,
            networks,
            capabilities: CapabilityCache::shared(),
            config,
        }
    }

    /// Shares a capability cache with other components.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Arc<CapabilityCache>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Runs the full off-chain verification pipeline.
    ///
    /// Business failures come back as [`Checked::Invalid`]; the `Err` layer
    /// carries system failures only.
    #[allow(clippy::too_many_lines)]
    async fn analyze(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<Checked, SchemeError> {
        if payload.accepted.scheme != SCHEME_EXACT {
            return Ok(Checked::invalid(
                reason::INVALID_SCHEME,
                "expected exact scheme",
            ));
        }

        if payload.accepted.network != requirements.network {
            return Ok(Checked::invalid(
                reason::NETWORK_MISMATCH,
                "payload network does not match requirements",
            ));
        }

        let Some(config) = self.networks.config(&requirements.network) else {
            return Ok(Checked::invalid(
                reason::FAILED_TO_GET_NETWORK_CONFIG,
                format!("unsupported network: {}", requirements.network),
            ));
        };
        let chain_id = config.chain_id;

        let Some(asset_info) = self.networks.asset_info(&requirements.network, &requirements.asset)
        else {
            return Ok(Checked::invalid(
                reason::FAILED_TO_GET_ASSET_INFO,
                format!("unknown asset: {}", requirements.asset),
            ));
        };

        // Reject unknown type tags before attempting the full parse so the
        // failure is distinguishable from a malformed body.
        if let Some(tag) = payload.payload.get("type").and_then(Value::as_str) {
            if tag != PAYLOAD_TYPE_EIP3009 && tag != PAYLOAD_TYPE_ERC20 {
                return Ok(Checked::invalid(
                    reason::INVALID_PAYLOAD_TYPE,
                    format!("unknown payload type: {tag}"),
                ));
            }
        }

        let exact: ExactPayload = match serde_json::from_value(payload.payload.clone()) {
            Ok(p) => p,
            Err(e) => return Ok(Checked::invalid(reason::INVALID_PAYLOAD, e.to_string())),
        };

        let payer_str = exact.from().to_owned();

        if exact.signature().is_empty() {
            return Ok(Checked::invalid_with_payer(
                reason::MISSING_SIGNATURE,
                "payload carries no signature",
                &payer_str,
            ));
        }

        let Ok(payer) = exact.from().parse::<Address>() else {
            return Ok(Checked::invalid(
                reason::INVALID_PAYLOAD,
                format!("invalid payer address: {}", exact.from()),
            ));
        };

        if !exact.to().eq_ignore_ascii_case(&requirements.pay_to) {
            return Ok(Checked::invalid_with_payer(
                reason::RECIPIENT_MISMATCH,
                "authorization recipient does not match payTo",
                &payer_str,
            ));
        }

        let Ok(auth_value) = exact.value().parse::<u128>() else {
            return Ok(Checked::invalid_with_payer(
                reason::INVALID_AUTHORIZATION_VALUE,
                format!("cannot parse authorization value: {}", exact.value()),
                &payer_str,
            ));
        };
        let Ok(required_value) = requirements.amount.parse::<u128>() else {
            return Ok(Checked::invalid_with_payer(
                reason::INVALID_REQUIRED_AMOUNT,
                format!("cannot parse required amount: {}", requirements.amount),
                &payer_str,
            ));
        };
        if auth_value < required_value {
            return Ok(Checked::invalid_with_payer(
                reason::INSUFFICIENT_AMOUNT,
                "authorization amount is less than required",
                &payer_str,
            ));
        }

        // The window is inclusive on both ends, mirroring the on-chain check.
        let now = unix_now();
        let (Ok(valid_after), Ok(valid_before)) = (
            exact.valid_after().parse::<u64>(),
            exact.valid_before().parse::<u64>(),
        ) else {
            return Ok(Checked::invalid_with_payer(
                reason::INVALID_AUTHORIZATION_VALUE,
                "cannot parse authorization validity window",
                &payer_str,
            ));
        };
        if now < valid_after {
            return Ok(Checked::invalid_with_payer(
                reason::VALID_AFTER_IN_FUTURE,
                "authorization is not yet valid",
                &payer_str,
            ));
        }
        if now > valid_before {
            return Ok(Checked::invalid_with_payer(
                reason::VALID_BEFORE_IN_PAST,
                "authorization has expired",
                &payer_str,
            ));
        }

        // Resolve the flow: explicit type tag first, capability probe for
        // untyped legacy payloads (probe failure lands on the ERC-20 flow).
        let exact = match exact {
            ExactPayload::Untyped(p) => {
                let supported = verify_eip3009_support(
                    &self.signer,
                    &self.capabilities,
                    chain_id,
                    payer,
                    asset_info.address,
                )
                .await;
                if supported {
                    ExactPayload::Untyped(p)
                } else {
                    match serde_json::from_value::<Erc20Payload>(payload.payload.clone()) {
                        Ok(erc20) => ExactPayload::Erc20(erc20),
                        Err(e) => {
                            return Ok(Checked::invalid_with_payer(
                                reason::INVALID_PAYLOAD,
                                format!("cannot parse ERC-20 authorization: {e}"),
                                &payer_str,
                            ));
                        }
                    }
                }
            }
            tagged => tagged,
        };

        // Hash the typed data the client signed. EIP-3009 signs against the
        // token's domain; the ERC-20 flow signs against the facilitator
        // contract's domain.
        let hash = match &exact {
            ExactPayload::Eip3009(p) | ExactPayload::Untyped(p) => {
                let token_name = payload
                    .accepted
                    .extra
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(asset_info.name.as_str());
                let token_version = payload
                    .accepted
                    .extra
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or(asset_info.version.as_str());
                let message = match p.authorization.to_message() {
                    Ok(m) => m,
                    Err(e) => {
                        return Ok(Checked::invalid_with_payer(
                            reason::INVALID_PAYLOAD,
                            e.to_string(),
                            &payer_str,
                        ));
                    }
                };
                let domain =
                    eip3009_domain(token_name, token_version, chain_id, asset_info.address);
                message.eip712_signing_hash(&domain)
            }
            ExactPayload::Erc20(p) => {
                if !p
                    .authorization
                    .token
                    .eq_ignore_ascii_case(&asset_info.address.to_string())
                {
                    return Ok(Checked::invalid_with_payer(
                        reason::ASSET_MISMATCH,
                        "authorized token does not match requirements asset",
                        &payer_str,
                    ));
                }
                let message = match p.authorization.to_message() {
                    Ok(m) => m,
                    Err(e) => {
                        return Ok(Checked::invalid_with_payer(
                            reason::INVALID_PAYLOAD,
                            e.to_string(),
                            &payer_str,
                        ));
                    }
                };
                let domain =
                    facilitator_domain(chain_id, self.networks.facilitator_contract());
                message.eip712_signing_hash(&domain)
            }
        };

        let signature = match parse_hex_bytes(exact.signature()) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(Checked::invalid_with_payer(
                    reason::INVALID_SIGNATURE_FORMAT,
                    e,
                    &payer_str,
                ));
            }
        };

        match verify_universal_signature(&self.signer, payer, hash, &signature, true).await {
            Ok((true, _)) => Ok(Checked::Valid(Analyzed {
                payer,
                payer_str,
                hash,
                signature,
                asset_info,
                exact,
            })),
            Ok((false, _)) => Ok(Checked::invalid_with_payer(
                reason::INVALID_SIGNATURE,
                "signature does not recover to the payer",
                &payer_str,
            )),
            Err(SignatureVerificationError::Erc6492(e)) => Ok(Checked::invalid_with_payer(
                reason::INVALID_SIGNATURE_FORMAT,
                e.to_string(),
                &payer_str,
            )),
            Err(
                e @ (SignatureVerificationError::InvalidEoaLength(_)
                | SignatureVerificationError::Recovery(_)),
            ) => Ok(Checked::invalid_with_payer(
                reason::INVALID_SIGNATURE,
                e.to_string(),
                &payer_str,
            )),
            Err(SignatureVerificationError::UndeployedNotAllowed) => {
                Ok(Checked::invalid_with_payer(
                    reason::UNDEPLOYED_SMART_WALLET,
                    "undeployed smart wallet not allowed",
                    &payer_str,
                ))
            }
            Err(SignatureVerificationError::Signer(e)) => Err(Box::new(e)),
        }
    }

    async fn verify_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, SchemeError> {
        match self.analyze(payload, requirements).await? {
            Checked::Valid(analyzed) => Ok(VerifyResponse::valid(analyzed.payer_str)),
            Checked::Invalid(response) => Ok(response),
        }
    }

    #[allow(clippy::too_many_lines)]
    async fn settle_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, SchemeError> {
        let network = payload.accepted.network.clone();

        // Re-verify; a failed verification becomes a settle error preserving
        // the reason and payer.
        let analyzed = match self.analyze(payload, requirements).await? {
            Checked::Valid(analyzed) => analyzed,
            Checked::Invalid(verify) => {
                let reason = verify
                    .invalid_reason
                    .unwrap_or_else(|| reason::VERIFICATION_FAILED.to_owned());
                let message = verify.invalid_message.unwrap_or_default();
                let mut response = SettleResponse::error(reason, message, network);
                if let Some(payer) = verify.payer {
                    response = response.with_payer(payer);
                }
                return Ok(response);
            }
        };

        // Deploy-on-demand for counterfactual wallets.
        let envelope = match crate::verify::parse_erc6492_signature(&analyzed.signature) {
            Ok(envelope) => envelope,
            Err(e) => {
                return Ok(SettleResponse::error(
                    reason::INVALID_SIGNATURE_FORMAT,
                    e.to_string(),
                    network,
                )
                .with_payer(analyzed.payer_str));
            }
        };

        if envelope.has_deployment_info() {
            let code = self
                .signer
                .get_code(analyzed.payer)
                .await
                .map_err(|e| -> SchemeError { Box::new(e) })?;

            if code.is_empty() {
                if !self.config.deploy_erc4337_with_eip6492 {
                    return Ok(SettleResponse::error(
                        reason::UNDEPLOYED_SMART_WALLET,
                        "smart wallet deployment is disabled",
                        network,
                    )
                    .with_payer(analyzed.payer_str));
                }

                match self
                    .signer
                    .send_transaction(envelope.factory, envelope.factory_calldata.clone())
                    .await
                {
                    Ok(receipt) if receipt.status => {
                        tracing::info!(
                            wallet = %analyzed.payer,
                            tx = %receipt.transaction_hash,
                            "Deployed smart wallet via ERC-6492 factory"
                        );
                    }
                    Ok(receipt) => {
                        return Ok(SettleResponse::error(
                            reason::SMART_WALLET_DEPLOYMENT_FAILED,
                            "deployment transaction reverted",
                            network,
                        )
                        .with_payer(analyzed.payer_str)
                        .with_transaction(receipt.transaction_hash.to_string()));
                    }
                    Err(SignerError::Contract(message) | SignerError::Call(message)) => {
                        return Ok(SettleResponse::error(
                            reason::SMART_WALLET_DEPLOYMENT_FAILED,
                            message,
                            network,
                        )
                        .with_payer(analyzed.payer_str));
                    }
                    Err(e) => return Err(Box::new(e)),
                }

                // The wallet now exists: re-verify without the undeployed
                // allowance so a wallet that rejects the signature after
                // deployment cannot settle.
                match verify_universal_signature(
                    &self.signer,
                    analyzed.payer,
                    analyzed.hash,
                    &analyzed.signature,
                    false,
                )
                .await
                {
                    Ok((true, _)) => {}
                    Ok((false, _)) | Err(SignatureVerificationError::UndeployedNotAllowed) => {
                        return Ok(SettleResponse::error(
                            reason::INVALID_SIGNATURE,
                            "signature rejected after wallet deployment",
                            network,
                        )
                        .with_payer(analyzed.payer_str));
                    }
                    Err(SignatureVerificationError::Signer(e)) => return Err(Box::new(e)),
                    Err(e) => {
                        return Ok(SettleResponse::error(
                            reason::INVALID_SIGNATURE,
                            e.to_string(),
                            network,
                        )
                        .with_payer(analyzed.payer_str));
                    }
                }
            }
        }

        let Ok(pay_to) = requirements.pay_to.parse::<Address>() else {
            return Ok(SettleResponse::error(
                reason::INVALID_PAYLOAD,
                format!("invalid payTo address: {}", requirements.pay_to),
                network,
            )
            .with_payer(analyzed.payer_str));
        };

        let message_fields = match &analyzed.exact {
            ExactPayload::Eip3009(p) | ExactPayload::Untyped(p) => {
                p.authorization.to_message().map(|m| {
                    (m.value, m.validAfter, m.validBefore, m.nonce)
                })
            }
            ExactPayload::Erc20(p) => p.authorization.to_message().map(|m| {
                (m.value, m.validAfter, m.validBefore, m.nonce)
            }),
        };
        let Ok((value, valid_after, valid_before, nonce)) = message_fields else {
            return Ok(SettleResponse::error(
                reason::INVALID_PAYLOAD,
                "authorization fields failed to parse",
                network,
            )
            .with_payer(analyzed.payer_str));
        };

        // The full (possibly 6492-wrapped) signature goes on-chain; the
        // facilitator contract unwraps as needed.
        let call = settlePaymentCall {
            token: analyzed.asset_info.address,
            from: analyzed.payer,
            to: pay_to,
            value,
            validAfter: valid_after,
            validBefore: valid_before,
            nonce,
            signature: Bytes::from(analyzed.signature.clone()),
        };

        match self
            .signer
            .send_transaction(self.networks.facilitator_contract(), call.abi_encode().into())
            .await
        {
            Ok(receipt) if receipt.status => Ok(SettleResponse::success(
                receipt.transaction_hash.to_string(),
                network,
                analyzed.payer_str,
            )),
            Ok(receipt) => Ok(SettleResponse::error(
                reason::TRANSACTION_FAILED,
                "settlement transaction reverted",
                network,
            )
            .with_payer(analyzed.payer_str)
            .with_transaction(receipt.transaction_hash.to_string())),
            Err(SignerError::Contract(message) | SignerError::Call(message)) => {
                Ok(SettleResponse::error(
                    reason::FAILED_TO_EXECUTE_TRANSFER,
                    message,
                    network,
                )
                .with_payer(analyzed.payer_str))
            }
            Err(SignerError::Receipt(message)) => Ok(SettleResponse::error(
                reason::FAILED_TO_GET_RECEIPT,
                message,
                network,
            )
            .with_payer(analyzed.payer_str)),
            Err(e) => Err(Box::new(e)),
        }
    }
}

impl<S: FacilitatorEvmSigner + 'static> SchemeFacilitator for ExactEvmFacilitator<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        CAIP_FAMILY_EIP155
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        None
    }

    fn get_signers(&self, _network: &str) -> Vec<String> {
        self.signer
            .addresses()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(self.verify_inner(payload, requirements))
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(self.settle_inner(payload, requirements))
    }
}

/// V1 facade over [`ExactEvmFacilitator`].
///
/// Adapts the legacy framing (top-level scheme/network, `maxAmountRequired`)
/// onto the shared verification and settlement flow.
pub struct ExactEvmFacilitatorV1<S> {
    inner: ExactEvmFacilitator<S>,
}

impl<S> std::fmt::Debug for ExactEvmFacilitatorV1<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactEvmFacilitatorV1").finish_non_exhaustive()
    }
}

impl<S: FacilitatorEvmSigner> ExactEvmFacilitatorV1<S> {
    /// Creates a V1 facade.
    pub fn new(signer: S, networks: Arc<EvmNetworks>) -> Self {
        Self {
            inner: ExactEvmFacilitator::new(signer, networks),
        }
    }

    /// Creates a V1 facade with explicit configuration.
    pub fn with_config(signer: S, networks: Arc<EvmNetworks>, config: ExactEvmConfig) -> Self {
        Self {
            inner: ExactEvmFacilitator::with_config(signer, networks, config),
        }
    }

    fn adapt(
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> (PaymentPayload, PaymentRequirements) {
        let adapted_requirements = PaymentRequirements {
            scheme: requirements.scheme.clone(),
            network: requirements.network.clone(),
            amount: requirements.max_amount_required.clone(),
            pay_to: requirements.pay_to.clone(),
            max_timeout_seconds: requirements.max_timeout_seconds,
            asset: requirements.asset.clone(),
            extra: requirements.extra.clone().unwrap_or(Value::Null),
        };
        let accepted = PaymentRequirements {
            scheme: payload.scheme.clone(),
            network: payload.network.clone(),
            ..adapted_requirements.clone()
        };
        let adapted_payload = PaymentPayload {
            x402_version: 1,
            accepted,
            payload: payload.payload.clone(),
            resource: None,
            extensions: None,
        };
        (adapted_payload, adapted_requirements)
    }
}

impl<S: FacilitatorEvmSigner + 'static> SchemeFacilitatorV1 for ExactEvmFacilitatorV1<S> {
    fn scheme(&self) -> &str {
        SCHEME_EXACT
    }

    fn caip_family(&self) -> &str {
        CAIP_FAMILY_EIP155
    }

    fn get_extra(&self, _network: &str) -> Option<Value> {
        None
    }

    fn get_signers(&self, network: &str) -> Vec<String> {
        self.inner.get_signers(network)
    }

    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        Box::pin(async move {
            let (payload, requirements) = Self::adapt(payload, requirements);
            self.inner.verify_inner(&payload, &requirements).await
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        Box::pin(async move {
            let (payload, requirements) = Self::adapt(payload, requirements);
            self.inner.settle_inner(&payload, &requirements).await
        })
    }
}
