//! V2 payment types for the x402 protocol.
//!
//! V2 uses CAIP-2 chain IDs (e.g., `"eip155:8453"`) instead of network names
//! and embeds the accepted requirements inside the payment payload, so the
//! facilitator can check that the buyer agreed to the exact terms the seller
//! advertised.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::Network;

/// Payment requirements set by the seller (V2).
///
/// One entry of the `accepts` list in a 402 response. The client copies the
/// entry it pays against into [`PaymentPayload::accepted`] verbatim.
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "eip155:84532",
///   "amount": "1000000",
///   "payTo": "0x...",
///   "maxTimeoutSeconds": 300,
///   "asset": "0x...",
///   "extra": {"name": "USDC", "version": "2"}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// CAIP-2 network identifier (e.g., `"eip155:8453"`).
    pub network: Network,

    /// Amount in the token's smallest unit, as a base-10 string.
    pub amount: String,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,

    /// Asset address or symbol.
    pub asset: String,

    /// Scheme-specific extra data (e.g., EIP-712 domain parameters).
    #[serde(default)]
    pub extra: Value,
}

impl PaymentRequirements {
    /// Returns the payment amount.
    #[must_use]
    pub fn amount(&self) -> &str {
        &self.amount
    }
}

/// Metadata about the resource being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the resource.
    pub url: String,

    /// Human-readable description of the resource.
    #[serde(default)]
    pub description: String,

    /// MIME type of the resource content.
    #[serde(default)]
    pub mime_type: String,
}

/// HTTP 402 Payment Required response body (V2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 2 for V2).
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// Optional error message (machine-readable reason on retries).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Information about the resource being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// List of acceptable payment methods.
    pub accepts: Vec<PaymentRequirements>,

    /// Optional protocol extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// A signed payment authorization from the buyer (V2).
///
/// `accepted` is the requirements entry the buyer is paying against;
/// `payload` is the scheme-specific signed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always 2 for V2).
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// The payment requirements the buyer accepted.
    pub accepted: PaymentRequirements,

    /// The scheme-specific signed payload.
    pub payload: Value,

    /// Information about the resource being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Optional protocol extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl PaymentPayload {
    /// Returns the payment scheme the buyer accepted.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.accepted.scheme
    }

    /// Returns the network the buyer accepted.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.accepted.network
    }
}

/// Request to verify a V2 payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// The payment payload to verify.
    pub payment_payload: PaymentPayload,

    /// The requirements to verify against.
    pub payment_requirements: PaymentRequirements,
}

/// Request to settle a V2 payment.
///
/// Structurally identical to [`VerifyRequest`] on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// The payment payload to settle.
    pub payment_payload: PaymentPayload,

    /// The requirements for settlement.
    pub payment_requirements: PaymentRequirements,
}

const fn default_v2() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:84532".into(),
            amount: "1000000".into(),
            pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: serde_json::json!({"name": "USDC", "version": "2"}),
        }
    }

    #[test]
    fn test_requirements_wire_names_are_camel_case() {
        let json = serde_json::to_value(requirements()).unwrap();
        assert!(json.get("payTo").is_some());
        assert!(json.get("maxTimeoutSeconds").is_some());
        assert!(json.get("pay_to").is_none());
    }

    #[test]
    fn test_payment_payload_roundtrip() {
        let payload = PaymentPayload {
            x402_version: 2,
            accepted: requirements(),
            payload: serde_json::json!({"signature": "0xabcd"}),
            resource: Some(ResourceInfo {
                url: "https://api.example.com/data".into(),
                description: "weather data".into(),
                mime_type: "application/json".into(),
            }),
            extensions: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        let back: PaymentPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, back);
        assert_eq!(back.scheme(), "exact");
        assert_eq!(back.network(), "eip155:84532");
    }

    #[test]
    fn test_payment_required_version_defaults_to_2() {
        let body: PaymentRequired = serde_json::from_value(serde_json::json!({
            "accepts": [requirements()],
        }))
        .unwrap();
        assert_eq!(body.x402_version, 2);
        assert_eq!(body.accepts.len(), 1);
    }
}
