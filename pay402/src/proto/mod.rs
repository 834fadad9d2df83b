//! Wire format types for the x402 payment protocol.
//!
//! Defines the serialization-level data structures used by the protocol,
//! covering both V1 (legacy) and V2 (current) formats, plus the facilitator
//! response types shared by both.
//!
//! # Modules
//!
//! - [`v2`] — Current protocol types (`PaymentRequirements`, `PaymentPayload`, etc.)
//! - [`v1`] — Legacy protocol types (`PaymentRequirementsV1`, `PaymentPayloadV1`, etc.)
//! - [`responses`] — Facilitator responses (`VerifyResponse`, `SettleResponse`, etc.)
//! - [`helpers`] — Version detection, parsing, and network pattern matching
//!
//! All types serialize to JSON with camelCase field names. Big integers are
//! base-10 strings on the wire so that JavaScript peers never lose precision.

pub mod helpers;
pub mod responses;
pub mod v1;
pub mod v2;

pub use responses::{SettleResponse, SupportedKind, SupportedResponse, VerifyResponse};
pub use v1::{
    PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1, SettleRequestV1, VerifyRequestV1,
};
pub use v2::{
    PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo, SettleRequest,
    VerifyRequest,
};

/// Current protocol version.
pub const X402_VERSION: u32 = 2;

/// Response header carrying base64(JSON [`PaymentRequired`]) on 402 responses.
pub const HEADER_PAYMENT_REQUIRED: &str = "PAYMENT-REQUIRED";

/// Request header carrying base64(JSON [`PaymentPayload`]) on V2 retries.
pub const HEADER_PAYMENT_SIGNATURE: &str = "PAYMENT-SIGNATURE";

/// Response header carrying base64(JSON [`SettleResponse`]) on paid 200 responses.
pub const HEADER_PAYMENT_RESPONSE: &str = "PAYMENT-RESPONSE";

/// Request header carrying the V1 (legacy) payment payload.
pub const HEADER_PAYMENT_V1: &str = "X-PAYMENT";

/// Network identifier (CAIP-2 chain ID like `"eip155:8453"`, a legacy alias
/// like `"base-sepolia"`, or a wildcard pattern like `"eip155:*"`).
pub type Network = String;

/// Errors that can occur when parsing x402 protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The `x402Version` field is missing from the JSON data.
    #[error("missing x402Version field")]
    MissingVersion,

    /// The `x402Version` field has an unsupported value.
    #[error("invalid x402Version: {0}")]
    InvalidVersion(u32),

    /// A required field is missing from the JSON data.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The payload is not valid base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
