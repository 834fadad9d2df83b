//! Wire types for the exact scheme payload.
//!
//! Payloads arrive as JSON with string-typed numbers and hex-encoded byte
//! fields. The `type` tag distinguishes the EIP-3009 and ERC-20 flows;
//! legacy senders omit it, in which case the flow is resolved at verify time
//! by capability detection.

use alloy_primitives::{Address, B256, U256, hex};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{PAYLOAD_TYPE_EIP3009, PAYLOAD_TYPE_ERC20};
use crate::eip712::{TransferWithAuthorization, tokenTransferWithAuthorization};

/// EIP-3009 `TransferWithAuthorization` data as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Payer address (hex).
    pub from: String,
    /// Recipient address (hex).
    pub to: String,
    /// Amount in the token's smallest unit, base-10.
    pub value: String,
    /// Unix timestamp the authorization becomes valid (inclusive).
    pub valid_after: String,
    /// Unix timestamp the authorization expires (inclusive on-chain).
    pub valid_before: String,
    /// 32-byte nonce, `0x`-prefixed hex.
    pub nonce: String,
}

/// Generic ERC-20 transfer authorization as it travels on the wire.
///
/// Same shape as [`Eip3009Authorization`] plus the echoed token address
/// (the signature binds the token even though it is verified by the
/// facilitator contract) and the `needApprove` marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20Authorization {
    /// Token contract address (hex).
    pub token: String,
    /// Payer address (hex).
    pub from: String,
    /// Recipient address (hex).
    pub to: String,
    /// Amount in the token's smallest unit, base-10.
    pub value: String,
    /// Unix timestamp the authorization becomes valid (inclusive).
    pub valid_after: String,
    /// Unix timestamp the authorization expires (inclusive on-chain).
    pub valid_before: String,
    /// 32-byte nonce, `0x`-prefixed hex.
    pub nonce: String,
    /// Whether an on-chain approval backs this payment.
    pub need_approve: bool,
}

/// EIP-3009 flow payload: signature plus the authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Payload {
    /// Hex-encoded signature (EOA, EIP-1271, or ERC-6492-wrapped).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    /// The authorization that was signed.
    pub authorization: Eip3009Authorization,
}

/// ERC-20 flow payload: signature plus the authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Erc20Payload {
    /// Hex-encoded signature (EOA, EIP-1271, or ERC-6492-wrapped).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub signature: String,
    /// The authorization that was signed.
    pub authorization: Erc20Authorization,
}

/// The inner payload of an exact-scheme payment, keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactPayload {
    /// `type: "authorizationEip3009"` — settled via the token contract.
    Eip3009(Eip3009Payload),
    /// `type: "authorization"` — settled via the facilitator contract.
    Erc20(Erc20Payload),
    /// No `type` tag (legacy sender); the flow is resolved by capability
    /// detection at verify time.
    Untyped(Eip3009Payload),
}

impl ExactPayload {
    /// Returns the hex-encoded signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.signature,
            Self::Erc20(p) => &p.signature,
        }
    }

    /// Returns the payer (`from`) address string.
    #[must_use]
    pub fn from(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.authorization.from,
            Self::Erc20(p) => &p.authorization.from,
        }
    }

    /// Returns the recipient (`to`) address string.
    #[must_use]
    pub fn to(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.authorization.to,
            Self::Erc20(p) => &p.authorization.to,
        }
    }

    /// Returns the authorized value string.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.authorization.value,
            Self::Erc20(p) => &p.authorization.value,
        }
    }

    /// Returns the `validAfter` timestamp string.
    #[must_use]
    pub fn valid_after(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.authorization.valid_after,
            Self::Erc20(p) => &p.authorization.valid_after,
        }
    }

    /// Returns the `validBefore` timestamp string.
    #[must_use]
    pub fn valid_before(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.authorization.valid_before,
            Self::Erc20(p) => &p.authorization.valid_before,
        }
    }

    /// Returns the nonce hex string.
    #[must_use]
    pub fn nonce(&self) -> &str {
        match self {
            Self::Eip3009(p) | Self::Untyped(p) => &p.authorization.nonce,
            Self::Erc20(p) => &p.authorization.nonce,
        }
    }
}

impl Serialize for ExactPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (mut value, tag) = match self {
            Self::Eip3009(p) => (
                serde_json::to_value(p).map_err(serde::ser::Error::custom)?,
                Some(PAYLOAD_TYPE_EIP3009),
            ),
            Self::Erc20(p) => (
                serde_json::to_value(p).map_err(serde::ser::Error::custom)?,
                Some(PAYLOAD_TYPE_ERC20),
            ),
            Self::Untyped(p) => (
                serde_json::to_value(p).map_err(serde::ser::Error::custom)?,
                None,
            ),
        };
        if let (Some(tag), Some(map)) = (tag, value.as_object_mut()) {
            map.insert("type".to_owned(), Value::String(tag.to_owned()));
        }
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExactPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value.get("type").and_then(Value::as_str) {
            Some(PAYLOAD_TYPE_EIP3009) => serde_json::from_value(value)
                .map(Self::Eip3009)
                .map_err(D::Error::custom),
            Some(PAYLOAD_TYPE_ERC20) => serde_json::from_value(value)
                .map(Self::Erc20)
                .map_err(D::Error::custom),
            Some(other) => Err(D::Error::custom(format!("unknown payload type: {other}"))),
            None => serde_json::from_value(value)
                .map(Self::Untyped)
                .map_err(D::Error::custom),
        }
    }
}

/// Errors from converting wire strings to typed message fields.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationFormatError {
    /// An address field did not parse.
    #[error("invalid address: {0}")]
    Address(String),
    /// The value field is not a base-10 integer.
    #[error("invalid value: {0}")]
    Value(String),
    /// A timestamp field is not a base-10 integer.
    #[error("invalid timestamp: {0}")]
    Timestamp(String),
    /// The nonce is not 32 bytes of hex.
    #[error("invalid nonce: {0}")]
    Nonce(String),
}

impl Eip3009Authorization {
    /// Builds the EIP-712 message this authorization represents.
    ///
    /// # Errors
    ///
    /// Returns an error if any field fails to parse.
    pub fn to_message(&self) -> Result<TransferWithAuthorization, AuthorizationFormatError> {
        Ok(TransferWithAuthorization {
            from: parse_address(&self.from)?,
            to: parse_address(&self.to)?,
            value: parse_value(&self.value)?,
            validAfter: parse_timestamp(&self.valid_after)?,
            validBefore: parse_timestamp(&self.valid_before)?,
            nonce: parse_nonce(&self.nonce)?,
        })
    }
}

impl Erc20Authorization {
    /// Builds the EIP-712 message this authorization represents.
    ///
    /// # Errors
    ///
    /// Returns an error if any field fails to parse.
    pub fn to_message(&self) -> Result<tokenTransferWithAuthorization, AuthorizationFormatError> {
        Ok(tokenTransferWithAuthorization {
            token: parse_address(&self.token)?,
            from: parse_address(&self.from)?,
            to: parse_address(&self.to)?,
            value: parse_value(&self.value)?,
            validAfter: parse_timestamp(&self.valid_after)?,
            validBefore: parse_timestamp(&self.valid_before)?,
            nonce: parse_nonce(&self.nonce)?,
            needApprove: self.need_approve,
        })
    }
}

fn parse_address(raw: &str) -> Result<Address, AuthorizationFormatError> {
    raw.parse()
        .map_err(|_| AuthorizationFormatError::Address(raw.to_owned()))
}

fn parse_value(raw: &str) -> Result<U256, AuthorizationFormatError> {
    U256::from_str_radix(raw, 10).map_err(|_| AuthorizationFormatError::Value(raw.to_owned()))
}

fn parse_timestamp(raw: &str) -> Result<U256, AuthorizationFormatError> {
    let secs: u64 = raw
        .parse()
        .map_err(|_| AuthorizationFormatError::Timestamp(raw.to_owned()))?;
    Ok(U256::from(secs))
}

fn parse_nonce(raw: &str) -> Result<B256, AuthorizationFormatError> {
    let bytes =
        hex::decode(raw).map_err(|_| AuthorizationFormatError::Nonce(raw.to_owned()))?;
    if bytes.len() != 32 {
        return Err(AuthorizationFormatError::Nonce(raw.to_owned()));
    }
    Ok(B256::from_slice(&bytes))
}

/// Decodes a `0x`-prefixed hex string into bytes.
pub(crate) fn parse_hex_bytes(raw: &str) -> Result<Vec<u8>, String> {
    hex::decode(raw).map_err(|e| format!("invalid hex: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eip3009_payload() -> Eip3009Payload {
        Eip3009Payload {
            signature: "0xdeadbeef".into(),
            authorization: Eip3009Authorization {
                from: "0x857b06519E91e3A54538791bDbb0E22373e36b66".into(),
                to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
                value: "1000000".into(),
                valid_after: "1700000000".into(),
                valid_before: "1700003600".into(),
                nonce: format!("0x{}", "11".repeat(32)),
            },
        }
    }

    #[test]
    fn test_tagged_serialization_roundtrip() {
        let payload = ExactPayload::Eip3009(eip3009_payload());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "authorizationEip3009");
        assert_eq!(json["authorization"]["validAfter"], "1700000000");

        let back: ExactPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_erc20_tag_roundtrip() {
        let payload = ExactPayload::Erc20(Erc20Payload {
            signature: "0xdeadbeef".into(),
            authorization: Erc20Authorization {
                token: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
                from: "0x857b06519E91e3A54538791bDbb0E22373e36b66".into(),
                to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".into(),
                value: "1000000".into(),
                valid_after: "1700000000".into(),
                valid_before: "1700003600".into(),
                nonce: format!("0x{}", "22".repeat(32)),
                need_approve: true,
            },
        });
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "authorization");
        assert_eq!(json["authorization"]["needApprove"], true);

        let back: ExactPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_missing_type_parses_as_untyped() {
        let mut json = serde_json::to_value(eip3009_payload()).unwrap();
        json.as_object_mut().unwrap().remove("type");
        let parsed: ExactPayload = serde_json::from_value(json).unwrap();
        assert!(matches!(parsed, ExactPayload::Untyped(_)));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut json = serde_json::to_value(eip3009_payload()).unwrap();
        json.as_object_mut()
            .unwrap()
            .insert("type".into(), Value::String("permit2".into()));
        assert!(serde_json::from_value::<ExactPayload>(json).is_err());
    }

    #[test]
    fn test_to_message_parses_all_fields() {
        let message = eip3009_payload().authorization.to_message().unwrap();
        assert_eq!(message.value, U256::from(1_000_000u64));
        assert_eq!(message.nonce, B256::repeat_byte(0x11));
    }

    #[test]
    fn test_to_message_rejects_bad_nonce() {
        let mut auth = eip3009_payload().authorization;
        auth.nonce = "0x1234".into();
        assert!(matches!(
            auth.to_message(),
            Err(AuthorizationFormatError::Nonce(_))
        ));
    }
}
