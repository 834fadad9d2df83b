//! V1 legacy payment types for the x402 protocol.
//!
//! V1 uses human-readable network names (`"base-sepolia"`) and a flat payload
//! structure with `scheme` and `network` at the top level. The field carrying
//! the amount is `maxAmountRequired` rather than V2's `amount`, and resource
//! metadata is inlined into the requirements.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::Network;

/// V1 payment requirements (legacy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsV1 {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// Network identifier (legacy format, e.g., `"base-sepolia"`).
    pub network: Network,

    /// Maximum amount in the token's smallest unit.
    pub max_amount_required: String,

    /// Resource URL.
    pub resource: String,

    /// Optional resource description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,

    /// Asset address or symbol.
    pub asset: String,

    /// Additional scheme-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirementsV1 {
    /// Returns the payment amount (V1 uses `maxAmountRequired`).
    #[must_use]
    pub fn amount(&self) -> &str {
        &self.max_amount_required
    }
}

/// V1 402 response body (legacy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredV1 {
    /// Protocol version (always 1 for V1).
    #[serde(default = "default_v1")]
    pub x402_version: u32,

    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// List of accepted payment requirements.
    pub accepts: Vec<PaymentRequirementsV1>,
}

/// V1 payment payload (legacy).
///
/// In V1, `scheme` and `network` sit at the top level rather than nested
/// inside an `accepted` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayloadV1 {
    /// Protocol version (always 1 for V1).
    #[serde(default = "default_v1")]
    pub x402_version: u32,

    /// Payment scheme identifier.
    pub scheme: String,

    /// Network identifier.
    pub network: Network,

    /// Scheme-specific payload data.
    pub payload: Value,
}

/// V1 request to verify a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequestV1 {
    /// The payment payload to verify.
    pub payment_payload: PaymentPayloadV1,

    /// The requirements to verify against.
    pub payment_requirements: PaymentRequirementsV1,
}

/// V1 request to settle a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequestV1 {
    /// The payment payload to settle.
    pub payment_payload: PaymentPayloadV1,

    /// The requirements for settlement.
    pub payment_requirements: PaymentRequirementsV1,
}

const fn default_v1() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_requirements_use_max_amount_required() {
        let req = PaymentRequirementsV1 {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "1000000".into(),
            resource: "/api/data".into(),
            description: None,
            mime_type: None,
            pay_to: "0xabc".into(),
            max_timeout_seconds: 300,
            asset: "0xdef".into(),
            extra: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["maxAmountRequired"], "1000000");
        assert_eq!(req.amount(), "1000000");
    }

    #[test]
    fn test_v1_payload_has_top_level_scheme_and_network() {
        let payload: PaymentPayloadV1 = serde_json::from_value(serde_json::json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": {"signature": "0x00"},
        }))
        .unwrap();
        assert_eq!(payload.scheme, "exact");
        assert_eq!(payload.network, "base-sepolia");
    }
}
