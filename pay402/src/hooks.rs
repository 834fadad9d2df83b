//! Lifecycle hooks for x402 payment operations.
//!
//! Every stage of the payment flow — payload creation on the client,
//! verification and settlement on the resource server and facilitator —
//! exposes three interception points:
//!
//! - **Before**: inspect or abort the operation before it executes
//! - **After**: observe the result of a successful operation
//! - **On failure**: observe or recover from a failed operation
//!
//! Hooks execute in registration order. The first abort wins and skips the
//! remaining before-hooks; after-hooks are observe-only; the first recovery
//! wins and substitutes its result for the failure.
//!
//! Contexts carry immutable snapshots of the payload and requirements (and,
//! where applicable, the intermediate result), so hooks can inspect any field
//! regardless of protocol version without being able to mutate in-flight
//! state.

use crate::proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    VerifyResponse,
};
use crate::scheme::BoxFuture;

/// A version-agnostic snapshot of a payment payload.
#[derive(Debug, Clone)]
pub enum PayloadView {
    /// V1 payload.
    V1(Box<PaymentPayloadV1>),
    /// V2 payload.
    V2(Box<PaymentPayload>),
}

impl PayloadView {
    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::V1(p) => &p.scheme,
            Self::V2(p) => p.scheme(),
        }
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &str {
        match self {
            Self::V1(p) => &p.network,
            Self::V2(p) => p.network(),
        }
    }
}

/// A version-agnostic snapshot of payment requirements.
#[derive(Debug, Clone)]
pub enum RequirementsView {
    /// V1 requirements.
    V1(Box<PaymentRequirementsV1>),
    /// V2 requirements.
    V2(Box<PaymentRequirements>),
}

impl RequirementsView {
    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::V1(r) => &r.scheme,
            Self::V2(r) => &r.scheme,
        }
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &str {
        match self {
            Self::V1(r) => &r.network,
            Self::V2(r) => &r.network,
        }
    }

    /// Returns the payment amount as a string.
    #[must_use]
    pub fn amount(&self) -> &str {
        match self {
            Self::V1(r) => r.amount(),
            Self::V2(r) => r.amount(),
        }
    }
}

/// Returned by a before-hook to abort the operation.
#[derive(Debug, Clone)]
pub struct AbortResult {
    /// Machine-readable reason for aborting (e.g., `"kyt_blocked"`).
    pub reason: String,
    /// Optional human-readable message.
    pub message: Option<String>,
}

impl AbortResult {
    /// Creates an abort result with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: None,
        }
    }
}

/// Returned by a verify-failure hook to substitute a successful result.
#[derive(Debug, Clone)]
pub struct RecoveredVerifyResult {
    /// The substitute verification result.
    pub result: VerifyResponse,
}

/// Returned by a settle-failure hook to substitute a successful result.
#[derive(Debug, Clone)]
pub struct RecoveredSettleResult {
    /// The substitute settlement result.
    pub result: SettleResponse,
}

/// Context passed to verify lifecycle hooks.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    /// The payment payload under verification.
    pub payload: PayloadView,
    /// The requirements the payload is verified against.
    pub requirements: RequirementsView,
}

/// Context passed to after-verify hooks.
#[derive(Debug, Clone)]
pub struct VerifyResultContext {
    /// The payment payload that was verified.
    pub payload: PayloadView,
    /// The requirements it was verified against.
    pub requirements: RequirementsView,
    /// The verification result.
    pub result: VerifyResponse,
}

/// Context passed to verify-failure hooks.
#[derive(Debug, Clone)]
pub struct VerifyFailureContext {
    /// The payment payload that failed verification.
    pub payload: PayloadView,
    /// The requirements it was verified against.
    pub requirements: RequirementsView,
    /// The failure reason (invalid reason or system error text).
    pub error: String,
}

/// Context passed to settle lifecycle hooks.
#[derive(Debug, Clone)]
pub struct SettleContext {
    /// The payment payload under settlement.
    pub payload: PayloadView,
    /// The requirements the payload is settled against.
    pub requirements: RequirementsView,
}

/// Context passed to after-settle hooks.
#[derive(Debug, Clone)]
pub struct SettleResultContext {
    /// The payment payload that was settled.
    pub payload: PayloadView,
    /// The requirements it was settled against.
    pub requirements: RequirementsView,
    /// The settlement result.
    pub result: SettleResponse,
}

/// Context passed to settle-failure hooks.
#[derive(Debug, Clone)]
pub struct SettleFailureContext {
    /// The payment payload that failed settlement.
    pub payload: PayloadView,
    /// The requirements it was settled against.
    pub requirements: RequirementsView,
    /// The failure reason (error reason or system error text).
    pub error: String,
}

/// Context passed to client payment-creation hooks.
#[derive(Debug, Clone)]
pub struct PaymentCreationContext {
    /// The requirements selected for payment.
    pub requirements: RequirementsView,
}

/// Async hook called before verification. Return `Some(AbortResult)` to abort.
pub type BeforeVerifyHook =
    Box<dyn Fn(&VerifyContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after successful verification.
pub type AfterVerifyHook = Box<dyn Fn(&VerifyResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Async hook called on verification failure. Return a recovery to override.
pub type OnVerifyFailureHook = Box<
    dyn Fn(&VerifyFailureContext) -> BoxFuture<'_, Option<RecoveredVerifyResult>> + Send + Sync,
>;

/// Async hook called before settlement. Return `Some(AbortResult)` to abort.
pub type BeforeSettleHook =
    Box<dyn Fn(&SettleContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after successful settlement.
pub type AfterSettleHook = Box<dyn Fn(&SettleResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Async hook called on settlement failure. Return a recovery to override.
pub type OnSettleFailureHook = Box<
    dyn Fn(&SettleFailureContext) -> BoxFuture<'_, Option<RecoveredSettleResult>> + Send + Sync,
>;

/// Async hook called before client payload creation. Return `Some(AbortResult)` to abort.
pub type BeforePaymentHook =
    Box<dyn Fn(&PaymentCreationContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after client payload creation.
pub type AfterPaymentHook =
    Box<dyn Fn(&PaymentCreationContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Hook registrations for verify/settle lifecycles.
///
/// Shared by the resource server and the facilitator router so both stages
/// expose the same interception surface.
#[derive(Default)]
pub struct PaymentHooks {
    /// Before-verify hooks (first abort wins).
    pub before_verify: Vec<BeforeVerifyHook>,
    /// After-verify hooks (observe-only).
    pub after_verify: Vec<AfterVerifyHook>,
    /// Verify-failure hooks (first recovery wins).
    pub on_verify_failure: Vec<OnVerifyFailureHook>,
    /// Before-settle hooks (first abort wins).
    pub before_settle: Vec<BeforeSettleHook>,
    /// After-settle hooks (observe-only).
    pub after_settle: Vec<AfterSettleHook>,
    /// Settle-failure hooks (first recovery wins).
    pub on_settle_failure: Vec<OnSettleFailureHook>,
}

impl std::fmt::Debug for PaymentHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentHooks")
            .field("before_verify", &self.before_verify.len())
            .field("after_verify", &self.after_verify.len())
            .field("on_verify_failure", &self.on_verify_failure.len())
            .field("before_settle", &self.before_settle.len())
            .field("after_settle", &self.after_settle.len())
            .field("on_settle_failure", &self.on_settle_failure.len())
            .finish()
    }
}

impl PaymentHooks {
    /// Runs before-verify hooks in registration order; first abort wins.
    pub async fn run_before_verify(&self, ctx: &VerifyContext) -> Option<AbortResult> {
        for hook in &self.before_verify {
            if let Some(abort) = hook(ctx).await {
                return Some(abort);
            }
        }
        None
    }

    /// Runs after-verify hooks in registration order.
    pub async fn run_after_verify(&self, ctx: &VerifyResultContext) {
        for hook in &self.after_verify {
            hook(ctx).await;
        }
    }

    /// Runs verify-failure hooks in registration order; first recovery wins.
    pub async fn run_verify_failure(
        &self,
        ctx: &VerifyFailureContext,
    ) -> Option<RecoveredVerifyResult> {
        for hook in &self.on_verify_failure {
            if let Some(recovered) = hook(ctx).await {
                return Some(recovered);
            }
        }
        None
    }

    /// Runs before-settle hooks in registration order; first abort wins.
    pub async fn run_before_settle(&self, ctx: &SettleContext) -> Option<AbortResult> {
        for hook in &self.before_settle {
            if let Some(abort) = hook(ctx).await {
                return Some(abort);
            }
        }
        None
    }

    /// Runs after-settle hooks in registration order.
    pub async fn run_after_settle(&self, ctx: &SettleResultContext) {
        for hook in &self.after_settle {
            hook(ctx).await;
        }
    }

    /// Runs settle-failure hooks in registration order; first recovery wins.
    pub async fn run_settle_failure(
        &self,
        ctx: &SettleFailureContext,
    ) -> Option<RecoveredSettleResult> {
        for hook in &self.on_settle_failure {
            if let Some(recovered) = hook(ctx).await {
                return Some(recovered);
            }
        }
        None
    }
}
