//! x402 facilitator router.
//!
//! [`X402Facilitator`] owns the registered scheme implementations and routes
//! verify/settle requests to them by (scheme, network), with V1 and V2
//! protocol versions coexisting on separate routing tables.
//!
//! Registration keys may be exact CAIP-2 identifiers (`"eip155:8453"`) or
//! namespace wildcards (`"eip155:*"`); dispatch prefers an exact match over a
//! wildcard. The router is build-once: register all schemes before serving;
//! mutation after the first request is unsupported.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PaymentAbortedError, PaymentError, SchemeNotFoundError};
use crate::hooks::{
    PaymentHooks, PayloadView, RequirementsView, SettleContext, SettleFailureContext,
    SettleResultContext, VerifyContext, VerifyFailureContext, VerifyResultContext,
};
use crate::proto::helpers::find_by_network;
use crate::proto::{
    Network, PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1,
    SettleResponse, SupportedKind, SupportedResponse, VerifyResponse,
};
use crate::scheme::{SchemeFacilitator, SchemeFacilitatorV1};

/// Facilitator router holding V2 and V1 scheme tables.
#[derive(Default)]
pub struct X402Facilitator {
    v2: HashMap<Network, HashMap<String, Arc<dyn SchemeFacilitator>>>,
    v1: HashMap<Network, HashMap<String, Arc<dyn SchemeFacilitatorV1>>>,
    extensions: Vec<String>,
    hooks: PaymentHooks,
}

impl std::fmt::Debug for X402Facilitator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Facilitator")
            .field("v2_networks", &self.v2.keys().collect::<Vec<_>>())
            .field("v1_networks", &self.v1.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl X402Facilitator {
    /// Creates an empty facilitator router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a V2 scheme facilitator under each of the given networks.
    ///
    /// Networks may be exact CAIP-2 identifiers or wildcard patterns.
    pub fn register(
        &mut self,
        networks: impl IntoIterator<Item = Network>,
        facilitator: Arc<dyn SchemeFacilitator>,
    ) -> &mut Self {
        let scheme = facilitator.scheme().to_owned();
        for network in networks {
            tracing::debug!(%network, scheme = %scheme, "Registered V2 scheme facilitator");
            self.v2
                .entry(network)
                .or_default()
                .insert(scheme.clone(), Arc::clone(&facilitator));
        }
        self
    }

    /// Registers a V1 scheme facilitator under each of the given networks.
    pub fn register_v1(
        &mut self,
        networks: impl IntoIterator<Item = Network>,
        facilitator: Arc<dyn SchemeFacilitatorV1>,
    ) -> &mut Self {
        let scheme = facilitator.scheme().to_owned();
        for network in networks {
            self.v1
                .entry(network)
                .or_default()
                .insert(scheme.clone(), Arc::clone(&facilitator));
        }
        self
    }

    /// Declares a supported protocol extension key.
    pub fn declare_extension(&mut self, key: impl Into<String>) -> &mut Self {
        self.extensions.push(key.into());
        self
    }

    /// Mutable access to the hook registrations.
    pub fn hooks_mut(&mut self) -> &mut PaymentHooks {
        &mut self.hooks
    }

    /// Enumerates all registered (version, scheme, network) kinds and signers.
    #[must_use]
    pub fn get_supported(&self) -> SupportedResponse {
        let mut kinds = Vec::new();
        let mut signers: HashMap<String, Vec<String>> = HashMap::new();

        for (network, schemes) in &self.v2 {
            for (scheme, handler) in schemes {
                kinds.push(SupportedKind {
                    x402_version: 2,
                    scheme: scheme.clone(),
                    network: network.clone(),
                    extra: handler.get_extra(network),
                });
                signers
                    .entry(handler.caip_family().to_owned())
                    .or_insert_with(|| handler.get_signers(network));
            }
        }

        for (network, schemes) in &self.v1 {
            for (scheme, handler) in schemes {
                kinds.push(SupportedKind {
                    x402_version: 1,
                    scheme: scheme.clone(),
                    network: network.clone(),
                    extra: handler.get_extra(network),
                });
                signers
                    .entry(handler.caip_family().to_owned())
                    .or_insert_with(|| handler.get_signers(network));
            }
        }

        kinds.sort_by(|a, b| {
            (a.x402_version, &a.network, &a.scheme).cmp(&(b.x402_version, &b.network, &b.scheme))
        });

        SupportedResponse {
            kinds,
            extensions: self.extensions.clone(),
            signers,
        }
    }

    /// Verifies a V2 payment, running the hook lifecycle around the scheme.
    ///
    /// # Errors
    ///
    /// Returns an error when no scheme handler matches, a before-hook aborts,
    /// or the handler fails with a system error (and no failure hook
    /// recovers).
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        let ctx = VerifyContext {
            payload: PayloadView::V2(Box::new(payload.clone())),
            requirements: RequirementsView::V2(Box::new(requirements.clone())),
        };

        if let Some(abort) = self.hooks.run_before_verify(&ctx).await {
            return Err(PaymentAbortedError::new(abort.reason).into());
        }

        let handler = self.find_v2(payload.scheme(), payload.network())?;
        let result = handler.verify(payload, requirements).await;
        self.conclude_verify(ctx, result).await
    }

    /// Verifies a V1 payment.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::verify`].
    pub async fn verify_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<VerifyResponse, PaymentError> {
        let ctx = VerifyContext {
            payload: PayloadView::V1(Box::new(payload.clone())),
            requirements: RequirementsView::V1(Box::new(requirements.clone())),
        };

        if let Some(abort) = self.hooks.run_before_verify(&ctx).await {
            return Err(PaymentAbortedError::new(abort.reason).into());
        }

        let handler = self.find_v1(&payload.scheme, &payload.network)?;
        let result = handler.verify(payload, requirements).await;
        self.conclude_verify(ctx, result).await
    }

    /// Settles a V2 payment, running the hook lifecycle around the scheme.
    ///
    /// # Errors
    ///
    /// Returns an error when no scheme handler matches, a before-hook aborts,
    /// or the handler fails with a system error (and no failure hook
    /// recovers).
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        let ctx = SettleContext {
            payload: PayloadView::V2(Box::new(payload.clone())),
            requirements: RequirementsView::V2(Box::new(requirements.clone())),
        };

        if let Some(abort) = self.hooks.run_before_settle(&ctx).await {
            return Err(PaymentAbortedError::new(abort.reason).into());
        }

        let handler = self.find_v2(payload.scheme(), payload.network())?;
        let result = handler.settle(payload, requirements).await;
        self.conclude_settle(ctx, result).await
    }

    /// Settles a V1 payment.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::settle`].
    pub async fn settle_v1(
        &self,
        payload: &PaymentPayloadV1,
        requirements: &PaymentRequirementsV1,
    ) -> Result<SettleResponse, PaymentError> {
        let ctx = SettleContext {
            payload: PayloadView::V1(Box::new(payload.clone())),
            requirements: RequirementsView::V1(Box::new(requirements.clone())),
        };

        if let Some(abort) = self.hooks.run_before_settle(&ctx).await {
            return Err(PaymentAbortedError::new(abort.reason).into());
        }

        let handler = self.find_v1(&payload.scheme, &payload.network)?;
        let result = handler.settle(payload, requirements).await;
        self.conclude_settle(ctx, result).await
    }

    fn find_v2(
        &self,
        scheme: &str,
        network: &str,
    ) -> Result<&Arc<dyn SchemeFacilitator>, SchemeNotFoundError> {
        find_by_network(&self.v2, network)
            .and_then(|schemes| schemes.get(scheme))
            .ok_or_else(|| SchemeNotFoundError::new(scheme, network))
    }

    fn find_v1(
        &self,
        scheme: &str,
        network: &str,
    ) -> Result<&Arc<dyn SchemeFacilitatorV1>, SchemeNotFoundError> {
        find_by_network(&self.v1, network)
            .and_then(|schemes| schemes.get(scheme))
            .ok_or_else(|| SchemeNotFoundError::new(scheme, network))
    }

    async fn conclude_verify(
        &self,
        ctx: VerifyContext,
        result: Result<VerifyResponse, crate::scheme::SchemeError>,
    ) -> Result<VerifyResponse, PaymentError> {
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

    async fn conclude_settle(
        &self,
        ctx: SettleContext,
        result: Result<SettleResponse, crate::scheme::SchemeError>,
    ) -> Result<SettleResponse, PaymentError> {
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
}

/// An in-process facilitator doubles as a [`FacilitatorClient`], so a
/// resource server can verify and settle without an HTTP hop.
impl crate::server::FacilitatorClient for Arc<X402Facilitator> {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> crate::scheme::BoxFuture<'a, Result<VerifyResponse, crate::scheme::SchemeError>> {
        Box::pin(async move {
            X402Facilitator::verify(self, payload, requirements)
                .await
                .map_err(|e| -> crate::scheme::SchemeError { Box::new(e) })
        })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> crate::scheme::BoxFuture<'a, Result<SettleResponse, crate::scheme::SchemeError>> {
        Box::pin(async move {
            X402Facilitator::settle(self, payload, requirements)
                .await
                .map_err(|e| -> crate::scheme::SchemeError { Box::new(e) })
        })
    }

    fn get_supported(
        &self,
    ) -> crate::scheme::BoxFuture<'_, Result<SupportedResponse, crate::scheme::SchemeError>> {
        Box::pin(async move { Ok(X402Facilitator::get_supported(self)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheme::{BoxFuture, SchemeError};
    use serde_json::Value;

    struct StubFacilitator {
        label: &'static str,
    }

    impl SchemeFacilitator for StubFacilitator {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn caip_family(&self) -> &str {
            "eip155:*"
        }

        fn get_extra(&self, _network: &str) -> Option<Value> {
            None
        }

        fn get_signers(&self, _network: &str) -> Vec<String> {
            vec!["0xSigner".into()]
        }

        fn verify<'a>(
            &'a self,
            _payload: &'a PaymentPayload,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
            Box::pin(async move { Ok(VerifyResponse::valid(self.label)) })
        }

        fn settle<'a>(
            &'a self,
            _payload: &'a PaymentPayload,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
            Box::pin(async move { Ok(SettleResponse::success("0xTx", "eip155:84532", self.label)) })
        }
    }

    fn payload(network: &str) -> (PaymentPayload, PaymentRequirements) {
        let requirements = PaymentRequirements {
            scheme: "exact".into(),
            network: network.into(),
            amount: "1000000".into(),
            pay_to: "0xPayee".into(),
            max_timeout_seconds: 300,
            asset: "0xToken".into(),
            extra: Value::Null,
        };
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: requirements.clone(),
            payload: Value::Null,
            resource: None,
            extensions: None,
        };
        (payload, requirements)
    }

    #[tokio::test]
    async fn test_dispatch_prefers_exact_network_over_wildcard() {
        let mut facilitator = X402Facilitator::new();
        facilitator.register(
            vec!["eip155:*".to_owned()],
            Arc::new(StubFacilitator { label: "wildcard" }),
        );
        facilitator.register(
            vec!["eip155:8453".to_owned()],
            Arc::new(StubFacilitator { label: "exact" }),
        );

        let (p, r) = payload("eip155:8453");
        let response = facilitator.verify(&p, &r).await.unwrap();
        assert_eq!(response.payer.as_deref(), Some("exact"));

        let (p, r) = payload("eip155:84532");
        let response = facilitator.verify(&p, &r).await.unwrap();
        assert_eq!(response.payer.as_deref(), Some("wildcard"));
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_an_error() {
        let facilitator = X402Facilitator::new();
        let (p, r) = payload("eip155:8453");
        let err = facilitator.verify(&p, &r).await.unwrap_err();
        assert!(err.to_string().contains("No scheme"));
    }

    #[tokio::test]
    async fn test_get_supported_enumerates_kinds_and_signers() {
        let mut facilitator = X402Facilitator::new();
        facilitator.register(
            vec!["eip155:8453".to_owned(), "eip155:84532".to_owned()],
            Arc::new(StubFacilitator { label: "evm" }),
        );

        let supported = facilitator.get_supported();
        assert_eq!(supported.kinds.len(), 2);
        assert!(supported.kinds.iter().all(|k| k.x402_version == 2));
        assert_eq!(supported.signers["eip155:*"], vec!["0xSigner".to_owned()]);
    }

    #[tokio::test]
    async fn test_before_verify_hook_aborts() {
        let mut facilitator = X402Facilitator::new();
        facilitator.register(
            vec!["eip155:*".to_owned()],
            Arc::new(StubFacilitator { label: "evm" }),
        );
        facilitator
            .hooks_mut()
            .before_verify
            .push(Box::new(|_ctx| {
                Box::pin(async { Some(crate::hooks::AbortResult::new("blocked")) })
            }));

        let (p, r) = payload("eip155:8453");
        let err = facilitator.verify(&p, &r).await.unwrap_err();
        assert!(err.to_string().contains("blocked"));
    }

    struct FailingFacilitator;

    impl SchemeFacilitator for FailingFacilitator {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn caip_family(&self) -> &str {
            "eip155:*"
        }

        fn get_extra(&self, _network: &str) -> Option<Value> {
            None
        }

        fn get_signers(&self, _network: &str) -> Vec<String> {
            Vec::new()
        }

        fn verify<'a>(
            &'a self,
            _payload: &'a PaymentPayload,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
            Box::pin(async { Err("rpc unreachable".into()) })
        }

        fn settle<'a>(
            &'a self,
            _payload: &'a PaymentPayload,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
            Box::pin(async { Err("rpc unreachable".into()) })
        }
    }

    #[tokio::test]
    async fn test_failure_hook_recovers_verify() {
        let mut facilitator = X402Facilitator::new();
        facilitator.register(vec!["eip155:*".to_owned()], Arc::new(FailingFacilitator));
        facilitator
            .hooks_mut()
            .on_verify_failure
            .push(Box::new(|ctx| {
                let error = ctx.error.clone();
                Box::pin(async move {
                    assert!(error.contains("rpc unreachable"));
                    Some(crate::hooks::RecoveredVerifyResult {
                        result: VerifyResponse::valid("0xRecovered"),
                    })
                })
            }));

        let (p, r) = payload("eip155:8453");
        let response = facilitator.verify(&p, &r).await.unwrap();
        assert!(response.is_valid);
        assert_eq!(response.payer.as_deref(), Some("0xRecovered"));
    }
}
