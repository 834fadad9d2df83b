//! Utility functions for the x402 protocol.
//!
//! Version detection, payload parsing, and network pattern matching used
//! across the protocol stack.

use serde_json::Value;

use crate::proto::v1::{PaymentPayloadV1, PaymentRequirementsV1};
use crate::proto::v2::{PaymentPayload, PaymentRequirements};
use crate::proto::{Network, ProtocolError};

/// Extracts the `x402Version` field from JSON data.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingVersion`] if the field is absent, or
/// [`ProtocolError::InvalidVersion`] if the value is not 1 or 2.
pub fn detect_version(data: &Value) -> Result<u32, ProtocolError> {
    let version = data
        .get("x402Version")
        .ok_or(ProtocolError::MissingVersion)?;

    let version = version.as_u64().ok_or(ProtocolError::InvalidVersion(0))?;

    #[allow(clippy::cast_possible_truncation)]
    match version {
        1 | 2 => Ok(version as u32),
        _ => Err(ProtocolError::InvalidVersion(version as u32)),
    }
}

/// Extracts scheme and network from a payment payload.
///
/// - **V1**: `scheme` and `network` are at the top level.
/// - **V2**: `scheme` and `network` are inside the `accepted` field.
///
/// # Errors
///
/// Returns [`ProtocolError`] if required fields are missing.
pub fn get_scheme_and_network(
    version: u32,
    payload: &Value,
) -> Result<(String, String), ProtocolError> {
    let (scheme_val, network_val) = if version == 1 {
        (payload.get("scheme"), payload.get("network"))
    } else {
        let accepted = payload
            .get("accepted")
            .ok_or(ProtocolError::MissingField("accepted"))?;
        (accepted.get("scheme"), accepted.get("network"))
    };

    let scheme = scheme_val
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField("scheme"))?
        .to_owned();

    let network = network_val
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField("network"))?
        .to_owned();

    Ok((scheme, network))
}

/// Checks if a V2 payment payload matches the given requirements on the five
/// protocol-critical fields: scheme, network, amount, asset, and `payTo`.
///
/// `maxTimeoutSeconds` and `extra` are deliberately ignored so that
/// facilitator enrichment never causes false-negative rejections.
#[must_use]
pub fn match_payload_to_requirements(
    payload: &PaymentPayload,
    requirements: &PaymentRequirements,
) -> bool {
    payload.accepted.scheme == requirements.scheme
        && payload.accepted.network == requirements.network
        && payload.accepted.amount == requirements.amount
        && payload.accepted.asset == requirements.asset
        && payload.accepted.pay_to == requirements.pay_to
}

/// Checks if a V1 payment payload matches the given requirements.
///
/// V1 compares scheme and network only.
#[must_use]
pub fn match_payload_to_requirements_v1(
    payload: &PaymentPayloadV1,
    requirements: &PaymentRequirementsV1,
) -> bool {
    payload.scheme == requirements.scheme && payload.network == requirements.network
}

/// Checks if a network matches a pattern (supports wildcards).
///
/// Patterns ending with `:*` match any reference within the namespace.
#[must_use]
pub fn matches_network_pattern(network: &str, pattern: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or_else(|| pattern == network, |prefix| network.starts_with(prefix))
}

/// Finds a value registered for a network (with wildcard fallback).
///
/// Tries an exact key match first, then scans for wildcard patterns.
#[must_use]
pub fn find_by_network<'a, T, S: std::hash::BuildHasher>(
    entries: &'a std::collections::HashMap<Network, T, S>,
    network: &str,
) -> Option<&'a T> {
    if let Some(v) = entries.get(network) {
        return Some(v);
    }

    for (pattern, value) in entries {
        if pattern.ends_with(":*") && matches_network_pattern(network, pattern) {
            return Some(value);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_detect_version() {
        assert_eq!(
            detect_version(&serde_json::json!({"x402Version": 2})).unwrap(),
            2
        );
        assert_eq!(
            detect_version(&serde_json::json!({"x402Version": 1})).unwrap(),
            1
        );
        assert!(detect_version(&serde_json::json!({"x402Version": 7})).is_err());
        assert!(detect_version(&serde_json::json!({})).is_err());
    }

    #[test]
    fn test_get_scheme_and_network_v1_and_v2() {
        let v1 = serde_json::json!({"scheme": "exact", "network": "base-sepolia"});
        assert_eq!(
            get_scheme_and_network(1, &v1).unwrap(),
            ("exact".to_owned(), "base-sepolia".to_owned())
        );

        let v2 = serde_json::json!({"accepted": {"scheme": "exact", "network": "eip155:8453"}});
        assert_eq!(
            get_scheme_and_network(2, &v2).unwrap(),
            ("exact".to_owned(), "eip155:8453".to_owned())
        );

        assert!(get_scheme_and_network(2, &v1).is_err());
    }

    #[test]
    fn test_matches_network_pattern() {
        assert!(matches_network_pattern("eip155:8453", "eip155:*"));
        assert!(matches_network_pattern("eip155:8453", "eip155:8453"));
        assert!(!matches_network_pattern("eip155:8453", "eip155:1"));
        assert!(!matches_network_pattern("solana:mainnet", "eip155:*"));
    }

    #[test]
    fn test_find_by_network_prefers_exact_over_wildcard() {
        let mut entries: HashMap<String, &str> = HashMap::new();
        entries.insert("eip155:*".into(), "wildcard");
        entries.insert("eip155:8453".into(), "exact");

        assert_eq!(find_by_network(&entries, "eip155:8453"), Some(&"exact"));
        assert_eq!(find_by_network(&entries, "eip155:1"), Some(&"wildcard"));
        assert_eq!(find_by_network(&entries, "solana:mainnet"), None);
    }
}
