//! EVM "exact" payment scheme.
//!
//! Pays a fixed amount of an ERC-20 token to a fixed recipient, authorized
//! off-chain with an EIP-712 signature. Two on-chain mechanisms exist:
//!
//! - **EIP-3009 flow**: tokens with `transferWithAuthorization` (USDC et al.)
//!   settle gaslessly through the token contract itself. Payloads are tagged
//!   `authorizationEip3009`.
//! - **ERC-20 flow**: any other token settles through the facilitator
//!   contract, backed by an on-chain allowance the client grants up front.
//!   Payloads are tagged `authorization`.
//!
//! The flow is chosen by the static per-asset capability flag, falling back
//! to an on-chain probe (see [`crate::capability`]).

pub mod client;
pub mod contract;
pub mod facilitator;
pub mod server;
pub mod types;

pub use client::{ExactEvmClient, ExactEvmClientV1};
pub use facilitator::{ExactEvmConfig, ExactEvmFacilitator, ExactEvmFacilitatorV1};
pub use server::ExactEvmServer;
pub use types::{Eip3009Authorization, Erc20Authorization, ExactPayload};

/// Scheme identifier.
pub const SCHEME_EXACT: &str = "exact";

/// CAIP-2 family pattern for all EVM chains.
pub const CAIP_FAMILY_EIP155: &str = "eip155:*";

/// Payload type tag for the EIP-3009 flow.
pub const PAYLOAD_TYPE_EIP3009: &str = "authorizationEip3009";

/// Payload type tag for the generic ERC-20 flow.
pub const PAYLOAD_TYPE_ERC20: &str = "authorization";

/// Machine-readable error kinds surfaced in verify/settle responses.
///
/// These match the wire-level codes of the reference implementations, so a
/// client can handle failures uniformly across facilitators.
pub mod reason {
    /// Payload scheme is not `exact`.
    pub const INVALID_SCHEME: &str = "invalid_scheme";
    /// Payload network does not match the requirements.
    pub const NETWORK_MISMATCH: &str = "network_mismatch";
    /// Network has no configuration entry.
    pub const FAILED_TO_GET_NETWORK_CONFIG: &str = "failed_to_get_network_config";
    /// Asset could not be resolved.
    pub const FAILED_TO_GET_ASSET_INFO: &str = "failed_to_get_asset_info";
    /// Inner payload did not parse.
    pub const INVALID_PAYLOAD: &str = "invalid_payload";
    /// Inner payload carried an unknown `type` tag.
    pub const INVALID_PAYLOAD_TYPE: &str = "invalid_payload_type";
    /// Payload carries no signature.
    pub const MISSING_SIGNATURE: &str = "missing_signature";
    /// Signature is not valid hex.
    pub const INVALID_SIGNATURE_FORMAT: &str = "invalid_signature_format";
    /// Authorization recipient does not match `payTo`.
    pub const RECIPIENT_MISMATCH: &str = "recipient_mismatch";
    /// Authorized token does not match the requirements asset.
    pub const ASSET_MISMATCH: &str = "asset_mismatch";
    /// Authorization value is not a valid integer.
    pub const INVALID_AUTHORIZATION_VALUE: &str = "invalid_authorization_value";
    /// Required amount is not a valid integer.
    pub const INVALID_REQUIRED_AMOUNT: &str = "invalid_required_amount";
    /// Authorization value is below the required amount.
    pub const INSUFFICIENT_AMOUNT: &str = "insufficient_amount";
    /// Authorization window has not opened yet.
    pub const VALID_AFTER_IN_FUTURE: &str = "invalid_exact_evm_payload_authorization_valid_after";
    /// Authorization window has closed.
    pub const VALID_BEFORE_IN_PAST: &str = "invalid_exact_evm_payload_authorization_valid_before";
    /// Cryptographic verification rejected the signature.
    pub const INVALID_SIGNATURE: &str = "invalid_exact_evm_payload_signature";
    /// Signer is an undeployed smart wallet and policy disallows it.
    pub const UNDEPLOYED_SMART_WALLET: &str =
        "invalid_exact_evm_payload_undeployed_smart_wallet";
    /// Factory deployment of a smart wallet reverted.
    pub const SMART_WALLET_DEPLOYMENT_FAILED: &str = "smart_wallet_deployment_failed";
    /// Settlement transaction could not be submitted.
    pub const FAILED_TO_EXECUTE_TRANSFER: &str = "failed_to_execute_transfer";
    /// Settlement transaction reverted on-chain.
    pub const TRANSACTION_FAILED: &str = "transaction_failed";
    /// Settlement submitted but the receipt never arrived.
    pub const FAILED_TO_GET_RECEIPT: &str = "failed_to_get_receipt";
    /// Settlement rejected because re-verification failed.
    pub const VERIFICATION_FAILED: &str = "verification_failed";
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Validity-window policy for authorization construction.
///
/// V1 and V2 differ only in framing and default window; the shared flow is
/// parameterized by this policy instead of duplicating the scheme per
/// version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPolicy {
    /// Seconds to backdate `validAfter` (clock-skew allowance).
    pub backdate_secs: u64,
    /// Window length when the requirements carry no timeout.
    pub default_duration_secs: u64,
}

impl ValidityPolicy {
    /// V2 policy: 30 s backdate, 1 h default window.
    pub const V2: Self = Self {
        backdate_secs: 30,
        default_duration_secs: 3600,
    };

    /// V1 policy: 10 min window, with `validAfter` pushed a further 10 min
    /// into the past on top of the 30 s skew allowance.
    pub const V1: Self = Self {
        backdate_secs: 630,
        default_duration_secs: 600,
    };

    /// Computes the `[validAfter, validBefore]` window around `now`.
    ///
    /// Uses `max_timeout_seconds` when non-zero, the policy default
    /// otherwise.
    #[must_use]
    pub const fn window(&self, now: u64, max_timeout_seconds: u64) -> (u64, u64) {
        let duration = if max_timeout_seconds > 0 {
            max_timeout_seconds
        } else {
            self.default_duration_secs
        };
        (now.saturating_sub(self.backdate_secs), now + duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_window_backdates_thirty_seconds() {
        let (after, before) = ValidityPolicy::V2.window(10_000, 0);
        assert_eq!(after, 9_970);
        assert_eq!(before, 13_600);
    }

    #[test]
    fn test_v1_window_has_extra_backdate() {
        let (after, before) = ValidityPolicy::V1.window(10_000, 0);
        assert_eq!(after, 10_000 - 630);
        assert_eq!(before, 10_600);
    }

    #[test]
    fn test_timeout_overrides_default_duration() {
        let (_, before) = ValidityPolicy::V2.window(10_000, 120);
        assert_eq!(before, 10_120);
    }
}
