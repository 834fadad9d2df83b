//! Payment scheme protocol definitions.
//!
//! Defines the traits that payment scheme implementations must satisfy to
//! integrate with the x402 client, resource server, and facilitator roles.
//!
//! All I/O-bound methods are **async-first**. We use [`BoxFuture`] return
//! types so that traits remain dyn-compatible (required for dynamic scheme
//! registration). No sync variants are provided.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, PaymentRequirementsV1, SettleResponse,
    VerifyResponse,
};

/// Boxed, `Send` future — the standard dyn-compatible async return type.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed error type used across scheme trait boundaries.
pub type SchemeError = Box<dyn std::error::Error + Send + Sync>;

/// V2 client-side payment mechanism.
///
/// Implementations create signed payment payloads for a specific scheme.
/// The returned value is the scheme-specific inner payload; the x402 client
/// wraps it into a full [`PaymentPayload`].
pub trait SchemeClient: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Creates the scheme-specific inner payload.
    ///
    /// Async because it may involve RPC calls (allowance checks, approval
    /// transactions) or hardware wallet interactions.
    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>>;
}

/// V1 (legacy) client-side payment mechanism.
///
/// Same as [`SchemeClient`] but operates on V1 protocol types.
pub trait SchemeClientV1: Send + Sync {
    /// Payment scheme identifier.
    fn scheme(&self) -> &str;

    /// Creates the scheme-specific inner payload for V1.
    fn create_payment_payload<'a>(
        &'a self,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<Value, SchemeError>>;
}

/// V2 server-side payment mechanism.
///
/// Implementations handle price parsing and requirement enhancement for a
/// specific scheme. Verification and settlement are delegated to a
/// facilitator; these methods are sync because they are pure computation.
pub trait SchemeServer: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Converts a human-friendly price to an atomic asset amount.
    ///
    /// For example, converts `"1.50"` USD to `"1500000"` for USDC (6 decimals).
    ///
    /// # Errors
    ///
    /// Returns an error if the price format is invalid or the network is
    /// unsupported.
    fn parse_price(&self, price: &Value, network: &str) -> Result<AssetAmount, SchemeError>;

    /// Adds scheme-specific fields to payment requirements.
    ///
    /// For EVM, this fills the default asset and adds EIP-712 domain
    /// parameters (`name`, `version`) to the `extra` field.
    fn enhance_payment_requirements(&self, requirements: PaymentRequirements)
    -> PaymentRequirements;
}

/// V2 facilitator-side payment mechanism.
///
/// Implementations verify and settle payments for a specific scheme.
///
/// The `Result` layer carries **system** errors only (RPC unreachable,
/// timeouts); business rejections are reported inside the `Ok` value with
/// `is_valid = false` / `success = false` and a machine-readable reason.
/// Conflating the two would make transient infrastructure failures look like
/// signature failures to clients.
pub trait SchemeFacilitator: Send + Sync {
    /// Payment scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// CAIP family pattern (e.g., `"eip155:*"` for EVM).
    fn caip_family(&self) -> &str;

    /// Returns extra data advertised in the supported kinds.
    fn get_extra(&self, network: &str) -> Option<Value>;

    /// Returns signer addresses for a given network.
    fn get_signers(&self, network: &str) -> Vec<String>;

    /// Verifies a payment off-chain.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>>;

    /// Settles a payment on-chain.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>>;
}

/// V1 (legacy) facilitator-side payment mechanism.
pub trait SchemeFacilitatorV1: Send + Sync {
    /// Payment scheme identifier.
    fn scheme(&self) -> &str;

    /// CAIP family pattern.
    fn caip_family(&self) -> &str;

    /// Returns extra data advertised in the supported kinds.
    fn get_extra(&self, network: &str) -> Option<Value>;

    /// Returns signer addresses for a given network.
    fn get_signers(&self, network: &str) -> Vec<String>;

    /// Verifies a V1 payment off-chain.
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>>;

    /// Settles a V1 payment on-chain.
    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayloadV1,
        requirements: &'a PaymentRequirementsV1,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>>;
}

/// Amount in smallest unit with asset identifier.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    /// Amount in smallest unit (e.g., `"1500000"` for 1.5 USDC).
    pub amount: String,

    /// Asset address/identifier.
    pub asset: String,

    /// Optional additional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}
