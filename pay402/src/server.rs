//! x402 resource server state machine.
//!
//! [`X402ResourceServer`] drives a request through the payment exchange:
//!
//! ```text
//! Unpaid -> Challenged -> PaymentPresented -> Verified -> Settled -> Reply
//! ```
//!
//! - A request with no decodable payment header is answered with a 402 whose
//!   `PAYMENT-REQUIRED` header (base64 JSON) enumerates acceptable
//!   requirement tuples built from the route's [`ResourceConfig`].
//! - A retry carrying `PAYMENT-SIGNATURE` is decoded, matched against the
//!   advertised tuples, and verified with the facilitator; failure produces a
//!   402 echoing the machine-readable reason.
//! - After the downstream handler succeeds, the payment is settled and the
//!   result is attached as the `PAYMENT-RESPONSE` header. A settlement
//!   failure at this point is surfaced as an error the transport adapter
//!   maps to a 5xx; whether the already-produced response body is discarded
//!   or returned with a warning is the adapter's policy — both outcomes pass
//!   through the settle hooks first.
//!
//! Transport adapters (HTTP middleware) sit outside this crate and only need
//! the narrow contract above: header bytes in, header strings and responses
//! out.

use std::collections::HashMap;

use crate::config::ResourceConfig;
use crate::encoding::Base64Bytes;
use crate::error::{PaymentAbortedError, PaymentError, SchemeNotFoundError};
use crate::hooks::{
    PaymentHooks, PayloadView, RequirementsView, SettleContext, SettleFailureContext,
    SettleResultContext, VerifyContext, VerifyFailureContext, VerifyResultContext,
};
use crate::proto::helpers::{find_by_network, match_payload_to_requirements};
use crate::proto::{
    Network, PaymentPayload, PaymentRequired, PaymentRequirements, ProtocolError, ResourceInfo,
    SettleResponse, SupportedResponse, VerifyResponse,
};
use crate::scheme::{AssetAmount, BoxFuture, SchemeError, SchemeServer};

/// Async facilitator client trait for resource servers.
///
/// Resource servers delegate verify/settle to a facilitator via this trait.
/// Implementations typically call a remote facilitator service over HTTP, or
/// wrap a local [`X402Facilitator`](crate::facilitator::X402Facilitator).
pub trait FacilitatorClient: Send + Sync {
    /// Verifies a V2 payment asynchronously.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>>;

    /// Settles a V2 payment asynchronously.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>>;

    /// Returns the supported payment kinds asynchronously.
    ///
    /// Called during [`X402ResourceServer::initialize`] to discover which
    /// (scheme, network) pairs the facilitator can handle.
    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>>;
}

/// Async-first x402 resource server with scheme registration, facilitator
/// client initialization, requirement building, and verify/settle delegation.
pub struct X402ResourceServer {
    facilitator_clients: Vec<Box<dyn FacilitatorClient>>,
    schemes: HashMap<Network, HashMap<String, Box<dyn SchemeServer>>>,
    facilitator_map: HashMap<Network, HashMap<String, usize>>,
    hooks: PaymentHooks,
    initialized: bool,
}

impl std::fmt::Debug for X402ResourceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402ResourceServer")
            .field("facilitator_clients_count", &self.facilitator_clients.len())
            .field("schemes_networks", &self.schemes.keys().collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Default for X402ResourceServer {
    fn default() -> Self {
        Self::new()
    }
}

impl X402ResourceServer {
    /// Creates a new resource server with no facilitator clients.
    #[must_use]
    pub fn new() -> Self {
        Self {
            facilitator_clients: Vec::new(),
            schemes: HashMap::new(),
            facilitator_map: HashMap::new(),
            hooks: PaymentHooks::default(),
            initialized: false,
        }
    }

    /// Creates a new resource server with one facilitator client.
    #[must_use]
    pub fn with_facilitator(client: Box<dyn FacilitatorClient>) -> Self {
        let mut server = Self::new();
        server.facilitator_clients.push(client);
        server
    }

    /// Adds a facilitator client.
    pub fn add_facilitator(&mut self, client: Box<dyn FacilitatorClient>) -> &mut Self {
        self.facilitator_clients.push(client);
        self
    }

    /// Registers a V2 scheme server for a network (or wildcard pattern).
    pub fn register(&mut self, network: Network, server: Box<dyn SchemeServer>) -> &mut Self {
        let scheme = server.scheme().to_owned();
        self.schemes
            .entry(network)
            .or_default()
            .insert(scheme, server);
        self
    }

    /// Mutable access to the hook registrations.
    pub fn hooks_mut(&mut self) -> &mut PaymentHooks {
        &mut self.hooks
    }

    /// Initializes the server by fetching supported kinds from all registered
    /// facilitator clients.
    ///
    /// Must be called before [`Self::verify_payment`] / [`Self::settle_payment`].
    ///
    /// # Errors
    ///
    /// Returns an error if any facilitator client fails to respond.
    pub async fn initialize(&mut self) -> Result<(), SchemeError> {
        for (idx, client) in self.facilitator_clients.iter().enumerate() {
            let supported = client.get_supported().await?;
            tracing::debug!(
                facilitator = idx,
                kinds = supported.kinds.len(),
                "Discovered facilitator capabilities"
            );

            for kind in &supported.kinds {
                self.facilitator_map
                    .entry(kind.network.clone())
                    .or_default()
                    .entry(kind.scheme.clone())
                    .or_insert(idx);
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Returns whether the server has been initialized.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Builds payment requirements for a protected resource.
    ///
    /// Parses the route's price through the registered scheme server and
    /// enhances the result with scheme-specific data.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, the scheme is not
    /// registered, or price parsing fails.
    pub fn build_payment_requirements(
        &self,
        config: &ResourceConfig,
    ) -> Result<Vec<PaymentRequirements>, SchemeError> {
        if !self.initialized {
            return Err("Server not initialized. Call initialize() first.".into());
        }

        let schemes = find_by_network(&self.schemes, &config.network)
            .ok_or_else(|| SchemeNotFoundError::new(&config.scheme, &config.network))?;

        let server = schemes
            .get(&config.scheme)
            .ok_or_else(|| SchemeNotFoundError::new(&config.scheme, &config.network))?;

        let AssetAmount {
            amount,
            asset,
            extra,
        } = server.parse_price(&config.price, &config.network)?;

        let base = PaymentRequirements {
            scheme: config.scheme.clone(),
            network: config.network.clone(),
            asset,
            amount,
            pay_to: config.pay_to.clone(),
            max_timeout_seconds: config.max_timeout_seconds.unwrap_or(300),
            extra: extra.unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
        };

        Ok(vec![server.enhance_payment_requirements(base)])
    }

    /// Creates a 402 Payment Required body from a list of requirements.
    #[must_use]
    pub const fn create_payment_required(
        &self,
        requirements: Vec<PaymentRequirements>,
        resource: Option<ResourceInfo>,
        error: Option<String>,
    ) -> PaymentRequired {
        PaymentRequired {
            x402_version: 2,
            error,
            resource,
            accepts: requirements,
            extensions: None,
        }
    }

    /// Encodes a 402 body for the `PAYMENT-REQUIRED` header.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn payment_required_header(
        &self,
        payment_required: &PaymentRequired,
    ) -> Result<String, ProtocolError> {
        let json = serde_json::to_vec(payment_required)?;
        Ok(Base64Bytes::encode(json).to_string())
    }

    /// Decodes a `PAYMENT-SIGNATURE` header into a V2 payment payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is not base64(JSON) of a payload.
    pub fn decode_payment_header(&self, header: &[u8]) -> Result<PaymentPayload, ProtocolError> {
        let raw = Base64Bytes::from(header).decode()?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Encodes a settlement result for the `PAYMENT-RESPONSE` header.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn settlement_header(&self, settlement: &SettleResponse) -> Result<String, ProtocolError> {
        let json = serde_json::to_vec(settlement)?;
        Ok(Base64Bytes::encode(json).to_string())
    }

    /// Finds the advertised requirements entry that a payload accepted.
    ///
    /// Matches on the five protocol-critical fields (scheme, network, amount,
    /// asset, `payTo`); the server only accepts payments against terms it
    /// actually advertised.
    #[must_use]
    pub fn find_matching_requirements<'a>(
        &self,
        available: &'a [PaymentRequirements],
        payload: &PaymentPayload,
    ) -> Option<&'a PaymentRequirements> {
        available
            .iter()
            .find(|req| match_payload_to_requirements(payload, req))
    }

    /// Verifies a V2 payment via the appropriate facilitator client, with the
    /// full hook lifecycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, no facilitator is
    /// registered for the payload's scheme/network, a hook aborts, or the
    /// facilitator fails with a system error.
    pub async fn verify_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Scheme(
                "Server not initialized. Call initialize() first.".into(),
            ));
        }

        let ctx = VerifyContext {
            payload: PayloadView::V2(Box::new(payload.clone())),
            requirements: RequirementsView::V2(Box::new(requirements.clone())),
        };

        if let Some(abort) = self.hooks.run_before_verify(&ctx).await {
            return Err(PaymentAbortedError::new(abort.reason).into());
        }

        let client = self.find_facilitator_client(payload.scheme(), payload.network())?;
        let result = client.verify(payload, requirements).await;

        match result {
            Ok(response) if response.is_valid => {
                let result_ctx = VerifyResultContext {
                    payload: ctx.payload,
                    requirements: ctx.requirements,
                    result: response.clone(),
                };
                self.hooks.run_after_verify(&result_ctx).await;
                Ok(response)
            }
            Ok(response) => {
                let failure_ctx = VerifyFailureContext {
                    payload: ctx.payload,
                    requirements: ctx.requirements,
                    error: response.invalid_reason.clone().unwrap_or_default(),
                };
                if let Some(recovered) = self.hooks.run_verify_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Ok(response)
            }
            Err(e) => {
                let failure_ctx = VerifyFailureContext {
                    payload: ctx.payload,
                    requirements: ctx.requirements,
                    error: e.to_string(),
                };
                if let Some(recovered) = self.hooks.run_verify_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Err(PaymentError::Scheme(e))
            }
        }
    }

    /// Settles a V2 payment via the appropriate facilitator client, with the
    /// full hook lifecycle.
    ///
    /// Within a request, settlement must only be attempted after a successful
    /// [`Self::verify_payment`] and a successful downstream handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, no facilitator is
    /// registered for the payload's scheme/network, a hook aborts, or the
    /// facilitator fails with a system error.
    pub async fn settle_payment(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        if !self.initialized {
            return Err(PaymentError::Scheme(
                "Server not initialized. Call initialize() first.".into(),
            ));
        }

        let ctx = SettleContext {
            payload: PayloadView::V2(Box::new(payload.clone())),
            requirements: RequirementsView::V2(Box::new(requirements.clone())),
        };

        if let Some(abort) = self.hooks.run_before_settle(&ctx).await {
            return Err(PaymentAbortedError::new(abort.reason).into());
        }

        let client = self.find_facilitator_client(payload.scheme(), payload.network())?;
        let result = client.settle(payload, requirements).await;

        match result {
            Ok(response) if response.success => {
                let result_ctx = SettleResultContext {
                    payload: ctx.payload,
                    requirements: ctx.requirements,
                    result: response.clone(),
                };
                self.hooks.run_after_settle(&result_ctx).await;
                Ok(response)
            }
            Ok(response) => {
                let failure_ctx = SettleFailureContext {
                    payload: ctx.payload,
                    requirements: ctx.requirements,
                    error: response.error_reason.clone().unwrap_or_default(),
                };
                if let Some(recovered) = self.hooks.run_settle_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Ok(response)
            }
            Err(e) => {
                let failure_ctx = SettleFailureContext {
                    payload: ctx.payload,
                    requirements: ctx.requirements,
                    error: e.to_string(),
                };
                if let Some(recovered) = self.hooks.run_settle_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Err(PaymentError::Scheme(e))
            }
        }
    }

    /// Finds the facilitator client for a given scheme/network.
    fn find_facilitator_client(
        &self,
        scheme: &str,
        network: &str,
    ) -> Result<&dyn FacilitatorClient, SchemeNotFoundError> {
        let idx = find_by_network(&self.facilitator_map, network)
            .and_then(|m| m.get(scheme))
            .copied()
            .ok_or_else(|| SchemeNotFoundError::new(scheme, network))?;

        self.facilitator_clients
            .get(idx)
            .map(AsRef::as_ref)
            .ok_or_else(|| SchemeNotFoundError::new(scheme, network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::SupportedKind;
    use serde_json::Value;

    struct StubFacilitatorClient;

    impl FacilitatorClient for StubFacilitatorClient {
        fn verify<'a>(
            &'a self,
            payload: &'a PaymentPayload,
            requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
            Box::pin(async move {
                if payload.accepted.amount == requirements.amount {
                    Ok(VerifyResponse::valid("0xPayer"))
                } else {
                    Ok(VerifyResponse::invalid("insufficient_amount", "too low"))
                }
            })
        }

        fn settle<'a>(
            &'a self,
            _payload: &'a PaymentPayload,
            requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
            Box::pin(async move {
                Ok(SettleResponse::success(
                    "0xTxHash",
                    requirements.network.clone(),
                    "0xPayer",
                ))
            })
        }

        fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>> {
            Box::pin(async {
                Ok(SupportedResponse {
                    kinds: vec![SupportedKind {
                        x402_version: 2,
                        scheme: "exact".into(),
                        network: "eip155:*".into(),
                        extra: None,
                    }],
                    extensions: Vec::new(),
                    signers: HashMap::new(),
                })
            })
        }
    }

    struct StubSchemeServer;

    impl SchemeServer for StubSchemeServer {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn parse_price(&self, price: &Value, _network: &str) -> Result<AssetAmount, SchemeError> {
            Ok(AssetAmount {
                amount: price.as_str().unwrap_or("0").to_owned(),
                asset: "0xToken".into(),
                extra: None,
            })
        }

        fn enhance_payment_requirements(
            &self,
            requirements: PaymentRequirements,
        ) -> PaymentRequirements {
            requirements
        }
    }

    async fn initialized_server() -> X402ResourceServer {
        let mut server = X402ResourceServer::with_facilitator(Box::new(StubFacilitatorClient));
        server.register("eip155:*".into(), Box::new(StubSchemeServer));
        server.initialize().await.unwrap();
        server
    }

    fn route() -> ResourceConfig {
        ResourceConfig {
            scheme: "exact".into(),
            pay_to: "0xPayee".into(),
            price: serde_json::json!("1000000"),
            network: "eip155:84532".into(),
            max_timeout_seconds: None,
        }
    }

    #[tokio::test]
    async fn test_challenge_and_retry_roundtrip() {
        let server = initialized_server().await;

        // Challenge: build requirements and encode the 402 header.
        let accepts = server.build_payment_requirements(&route()).unwrap();
        let required = server.create_payment_required(accepts.clone(), None, None);
        let header = server.payment_required_header(&required).unwrap();

        // Client side: decode the header, copy the accepted tuple.
        let decoded = Base64Bytes(header.into_bytes()).decode().unwrap();
        let required_back: PaymentRequired = serde_json::from_slice(&decoded).unwrap();
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: required_back.accepts[0].clone(),
            payload: Value::Null,
            resource: None,
            extensions: None,
        };

        // Retry: payload matches advertised requirements and verifies.
        let matched = server
            .find_matching_requirements(&accepts, &payload)
            .unwrap();
        let verify = server.verify_payment(&payload, matched).await.unwrap();
        assert!(verify.is_valid);

        // Settle and encode the response header.
        let settle = server.settle_payment(&payload, matched).await.unwrap();
        assert!(settle.success);
        let response_header = server.settlement_header(&settle).unwrap();
        let decoded = Base64Bytes(response_header.into_bytes()).decode().unwrap();
        let settle_back: SettleResponse = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(settle_back.transaction, "0xTxHash");
    }

    #[tokio::test]
    async fn test_tampered_payload_does_not_match_requirements() {
        let server = initialized_server().await;
        let accepts = server.build_payment_requirements(&route()).unwrap();

        let mut accepted = accepts[0].clone();
        accepted.amount = "1".into();
        let payload = PaymentPayload {
            x402_version: 2,
            accepted,
            payload: Value::Null,
            resource: None,
            extensions: None,
        };

        assert!(
            server
                .find_matching_requirements(&accepts, &payload)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_verify_requires_initialization() {
        let server = X402ResourceServer::new();
        let accepts = vec![PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1".into(),
            pay_to: "0xPayee".into(),
            max_timeout_seconds: 300,
            asset: "0xToken".into(),
            extra: Value::Null,
        }];
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: accepts[0].clone(),
            payload: Value::Null,
            resource: None,
            extensions: None,
        };
        assert!(server.verify_payment(&payload, &accepts[0]).await.is_err());
    }

    #[tokio::test]
    async fn test_decode_payment_header_rejects_garbage() {
        let server = X402ResourceServer::new();
        assert!(server.decode_payment_header(b"!!!not-base64").is_err());
    }
}
