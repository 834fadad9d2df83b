//! Facilitator response types for the x402 protocol.
//!
//! These types travel between resource servers and facilitators during
//! payment verification and settlement, and describe what a facilitator
//! supports. A response with `is_valid: false` / `success: false` is a
//! business rejection; transport-level failures are surfaced as errors by
//! the caller instead and must never be reported through these types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::Network;

/// Response from payment verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment is valid.
    pub is_valid: bool,

    /// Machine-readable reason for invalidity (if `is_valid` is false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    /// Human-readable message for invalidity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_message: Option<String>,

    /// The payer's address (if known).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    /// Creates a valid verification response.
    #[must_use]
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            invalid_message: None,
            payer: Some(payer.into()),
        }
    }

    /// Creates an invalid verification response.
    #[must_use]
    pub fn invalid(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            invalid_message: Some(message.into()),
            payer: None,
        }
    }

    /// Creates an invalid response with a payer address.
    #[must_use]
    pub fn invalid_with_payer(
        reason: impl Into<String>,
        message: impl Into<String>,
        payer: impl Into<String>,
    ) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            invalid_message: Some(message.into()),
            payer: Some(payer.into()),
        }
    }
}

/// Response from payment settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement was successful.
    pub success: bool,

    /// Machine-readable reason for failure (if `success` is false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// Human-readable message for failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// The payer's address (if known).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Transaction hash (empty when settlement never reached the chain).
    pub transaction: String,

    /// Network where settlement occurred.
    pub network: Network,
}

impl SettleResponse {
    /// Creates a successful settlement response.
    #[must_use]
    pub fn success(
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            error_reason: None,
            error_message: None,
            payer: Some(payer.into()),
            transaction: transaction.into(),
            network: network.into(),
        }
    }

    /// Creates a failed settlement response.
    #[must_use]
    pub fn error(
        reason: impl Into<String>,
        message: impl Into<String>,
        network: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error_reason: Some(reason.into()),
            error_message: Some(message.into()),
            payer: None,
            transaction: String::new(),
            network: network.into(),
        }
    }

    /// Sets the payer address.
    #[must_use]
    pub fn with_payer(mut self, payer: impl Into<String>) -> Self {
        self.payer = Some(payer.into());
        self
    }

    /// Sets the transaction hash.
    #[must_use]
    pub fn with_transaction(mut self, tx: impl Into<String>) -> Self {
        self.transaction = tx.into();
        self
    }
}

/// A supported payment configuration.
///
/// Describes a single (version, scheme, network) combination that a
/// facilitator supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version for this kind (1 or 2).
    pub x402_version: u32,

    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// CAIP-2 network identifier or wildcard pattern (e.g., `"eip155:*"`).
    pub network: Network,

    /// Additional scheme-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Describes what payment kinds a facilitator supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    /// List of supported payment kinds.
    pub kinds: Vec<SupportedKind>,

    /// List of supported extension keys.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Map of CAIP family pattern to signer addresses.
    ///
    /// Example: `{"eip155:*": ["0xFacilitatorAddress"]}`
    #[serde(default)]
    pub signers: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_response_valid() {
        let response = VerifyResponse::valid("0xPayer");
        assert!(response.is_valid);
        assert_eq!(response.payer.as_deref(), Some("0xPayer"));
        assert!(response.invalid_reason.is_none());
    }

    #[test]
    fn test_verify_response_invalid_serializes_reason() {
        let response =
            VerifyResponse::invalid_with_payer("insufficient_amount", "999999 < 1000000", "0xA");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["invalidReason"], "insufficient_amount");
        assert_eq!(json["payer"], "0xA");
    }

    #[test]
    fn test_settle_response_error_has_empty_transaction() {
        let response = SettleResponse::error("transaction_failed", "revert", "eip155:84532");
        assert!(!response.success);
        assert!(response.transaction.is_empty());
        let tagged = response.with_transaction("0xdeadbeef");
        assert_eq!(tagged.transaction, "0xdeadbeef");
    }
}
