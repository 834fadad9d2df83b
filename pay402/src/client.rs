//! x402 client base logic.
//!
//! Shared logic for client implementations: scheme registration, requirement
//! selection policies, and payment payload creation with lifecycle hooks.

use std::collections::HashMap;

use crate::error::{NoMatchingRequirementsError, PaymentAbortedError, PaymentError, SchemeNotFoundError};
use crate::hooks::{AfterPaymentHook, BeforePaymentHook, PaymentCreationContext, RequirementsView};
use crate::proto::helpers::find_by_network;
use crate::proto::{
    Network, PaymentPayload, PaymentPayloadV1, PaymentRequired, PaymentRequiredV1,
    PaymentRequirements, PaymentRequirementsV1,
};
use crate::scheme::{SchemeClient, SchemeClientV1};

/// Policy function that filters and reorders requirements.
///
/// Takes the protocol version and a list of requirements, returns a
/// filtered/reordered list.
pub type PaymentPolicy =
    Box<dyn Fn(u32, Vec<RequirementsView>) -> Vec<RequirementsView> + Send + Sync>;

/// Selector function that picks the final requirement from a filtered list.
pub type PaymentRequirementsSelector = Box<dyn Fn(u32, &[RequirementsView]) -> usize + Send + Sync>;

/// Creates a policy that prefers a specific network.
///
/// Requirements matching the given network are placed first.
#[must_use]
pub fn prefer_network(network: Network) -> PaymentPolicy {
    Box::new(move |_version, reqs| {
        let (mut preferred, others): (Vec<_>, Vec<_>) =
            reqs.into_iter().partition(|r| r.network() == network);
        preferred.extend(others);
        preferred
    })
}

/// Creates a policy that prefers a specific scheme.
///
/// Requirements matching the given scheme are placed first.
#[must_use]
pub fn prefer_scheme(scheme: String) -> PaymentPolicy {
    Box::new(move |_version, reqs| {
        let (mut preferred, others): (Vec<_>, Vec<_>) =
            reqs.into_iter().partition(|r| r.scheme() == scheme);
        preferred.extend(others);
        preferred
    })
}

/// Creates a policy that filters by maximum amount.
///
/// Only requirements with `amount <= max_value` are kept.
#[must_use]
pub fn max_amount(max_value: u128) -> PaymentPolicy {
    Box::new(move |_version, reqs| {
        reqs.into_iter()
            .filter(|r| r.amount().parse::<u128>().is_ok_and(|a| a <= max_value))
            .collect()
    })
}

/// Default selector: returns the first requirement.
const fn default_selector(_version: u32, _reqs: &[RequirementsView]) -> usize {
    0
}

/// x402 client with scheme registration, policy, and selection logic.
///
/// Drives the client side of the payment exchange: given a 402 response,
/// select one of the advertised requirement tuples (filtered through
/// registered policies) and ask the matching scheme client to construct a
/// signed payment payload.
pub struct X402Client {
    schemes_v2: HashMap<Network, HashMap<String, Box<dyn SchemeClient>>>,
    schemes_v1: HashMap<Network, HashMap<String, Box<dyn SchemeClientV1>>>,
    policies: Vec<PaymentPolicy>,
    selector: PaymentRequirementsSelector,
    before_payment_hooks: Vec<BeforePaymentHook>,
    after_payment_hooks: Vec<AfterPaymentHook>,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field(
                "schemes_v2_networks",
                &self.schemes_v2.keys().collect::<Vec<_>>(),
            )
            .field(
                "schemes_v1_networks",
                &self.schemes_v1.keys().collect::<Vec<_>>(),
            )
            .field("policies_count", &self.policies.len())
            .finish_non_exhaustive()
    }
}

impl Default for X402Client {
    fn default() -> Self {
        Self::new()
    }
}

impl X402Client {
    /// Creates a new client with the default (first-match) selector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemes_v2: HashMap::new(),
            schemes_v1: HashMap::new(),
            policies: Vec::new(),
            selector: Box::new(default_selector),
            before_payment_hooks: Vec::new(),
            after_payment_hooks: Vec::new(),
        }
    }

    /// Creates a new client with a custom selector.
    #[must_use]
    pub fn with_selector(selector: PaymentRequirementsSelector) -> Self {
        Self {
            selector,
            ..Self::new()
        }
    }

    /// Registers a V2 scheme client for a network (or wildcard pattern).
    pub fn register(&mut self, network: Network, client: Box<dyn SchemeClient>) -> &mut Self {
        let scheme = client.scheme().to_owned();
        self.schemes_v2
            .entry(network)
            .or_default()
            .insert(scheme, client);
        self
    }

    /// Registers a V1 scheme client for a network (or wildcard pattern).
    pub fn register_v1(&mut self, network: Network, client: Box<dyn SchemeClientV1>) -> &mut Self {
        let scheme = client.scheme().to_owned();
        self.schemes_v1
            .entry(network)
            .or_default()
            .insert(scheme, client);
        self
    }

    /// Adds a requirement filter policy.
    pub fn register_policy(&mut self, policy: PaymentPolicy) -> &mut Self {
        self.policies.push(policy);
        self
    }

    /// Registers a before-payment-creation hook.
    pub fn on_before_payment(&mut self, hook: BeforePaymentHook) -> &mut Self {
        self.before_payment_hooks.push(hook);
        self
    }

    /// Registers an after-payment-creation hook.
    pub fn on_after_payment(&mut self, hook: AfterPaymentHook) -> &mut Self {
        self.after_payment_hooks.push(hook);
        self
    }

    /// Selects V2 requirements using registered policies and the selector.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatchingRequirementsError`] if no requirements match.
    pub fn select_requirements_v2(
        &self,
        requirements: &[PaymentRequirements],
    ) -> Result<PaymentRequirements, NoMatchingRequirementsError> {
        let supported: Vec<RequirementsView> = requirements
            .iter()
            .filter(|req| {
                find_by_network(&self.schemes_v2, &req.network)
                    .is_some_and(|schemes| schemes.contains_key(&req.scheme))
            })
            .cloned()
            .map(|r| RequirementsView::V2(Box::new(r)))
            .collect();

        let filtered = self.apply_policies(2, supported)?;

        let idx = (self.selector)(2, &filtered);
        match filtered.into_iter().nth(idx) {
            Some(RequirementsView::V2(r)) => Ok(*r),
            _ => Err(NoMatchingRequirementsError::new(
                "Selector returned invalid index",
            )),
        }
    }

    /// Selects V1 requirements using registered policies and the selector.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatchingRequirementsError`] if no requirements match.
    pub fn select_requirements_v1(
        &self,
        requirements: &[PaymentRequirementsV1],
    ) -> Result<PaymentRequirementsV1, NoMatchingRequirementsError> {
        let supported: Vec<RequirementsView> = requirements
            .iter()
            .filter(|req| {
                find_by_network(&self.schemes_v1, &req.network)
                    .is_some_and(|schemes| schemes.contains_key(&req.scheme))
            })
            .cloned()
            .map(|r| RequirementsView::V1(Box::new(r)))
            .collect();

        let filtered = self.apply_policies(1, supported)?;

        let idx = (self.selector)(1, &filtered);
        match filtered.into_iter().nth(idx) {
            Some(RequirementsView::V1(r)) => Ok(*r),
            _ => Err(NoMatchingRequirementsError::new(
                "Selector returned invalid index",
            )),
        }
    }

    /// Creates a V2 payment payload from a 402 response.
    ///
    /// Selects one of the advertised requirement tuples, runs payment-creation
    /// hooks, and delegates to the matching scheme client. The `accepted`
    /// field of the result is a verbatim copy of the selected tuple.
    ///
    /// # Errors
    ///
    /// Returns an error if requirement selection fails, a hook aborts, or the
    /// scheme client fails to produce a payload.
    pub async fn create_payment_payload_v2(
        &self,
        payment_required: &PaymentRequired,
    ) -> Result<PaymentPayload, PaymentError> {
        let selected = self.select_requirements_v2(&payment_required.accepts)?;

        let ctx = PaymentCreationContext {
            requirements: RequirementsView::V2(Box::new(selected.clone())),
        };
        for hook in &self.before_payment_hooks {
            if let Some(abort) = hook(&ctx).await {
                return Err(PaymentAbortedError::new(abort.reason).into());
            }
        }

        let schemes = find_by_network(&self.schemes_v2, &selected.network)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;
        let client = schemes
            .get(&selected.scheme)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;

        let inner_payload = client.create_payment_payload(&selected).await?;

        for hook in &self.after_payment_hooks {
            hook(&ctx).await;
        }

        Ok(PaymentPayload {
            x402_version: 2,
            payload: inner_payload,
            resource: payment_required.resource.clone(),
            extensions: payment_required.extensions.clone(),
            accepted: selected,
        })
    }

    /// Creates a V1 payment payload from a V1 402 response.
    ///
    /// # Errors
    ///
    /// Returns an error if requirement selection fails, a hook aborts, or the
    /// scheme client fails to produce a payload.
    pub async fn create_payment_payload_v1(
        &self,
        payment_required: &PaymentRequiredV1,
    ) -> Result<PaymentPayloadV1, PaymentError> {
        let selected = self.select_requirements_v1(&payment_required.accepts)?;

        let ctx = PaymentCreationContext {
            requirements: RequirementsView::V1(Box::new(selected.clone())),
        };
        for hook in &self.before_payment_hooks {
            if let Some(abort) = hook(&ctx).await {
                return Err(PaymentAbortedError::new(abort.reason).into());
            }
        }

        let schemes = find_by_network(&self.schemes_v1, &selected.network)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;
        let client = schemes
            .get(&selected.scheme)
            .ok_or_else(|| SchemeNotFoundError::new(&selected.scheme, &selected.network))?;

        let inner_payload = client.create_payment_payload(&selected).await?;

        for hook in &self.after_payment_hooks {
            hook(&ctx).await;
        }

        Ok(PaymentPayloadV1 {
            x402_version: 1,
            scheme: selected.scheme,
            network: selected.network,
            payload: inner_payload,
        })
    }

    fn apply_policies(
        &self,
        version: u32,
        supported: Vec<RequirementsView>,
    ) -> Result<Vec<RequirementsView>, NoMatchingRequirementsError> {
        if supported.is_empty() {
            return Err(NoMatchingRequirementsError::new(
                "No payment requirements match registered schemes",
            ));
        }

        let mut filtered = supported;
        for policy in &self.policies {
            filtered = policy(version, filtered);
            if filtered.is_empty() {
                return Err(NoMatchingRequirementsError::new(
                    "All requirements filtered out by policies",
                ));
            }
        }
        Ok(filtered)
    }
}
