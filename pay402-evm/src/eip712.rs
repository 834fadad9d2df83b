//! EIP-712 typed data for payment authorizations.
//!
//! Two message types flow through the system:
//!
//! - [`TransferWithAuthorization`] — the EIP-3009 message, signed against the
//!   token contract's own domain (`name`/`version` from the token, the token
//!   address as the verifying contract).
//! - [`tokenTransferWithAuthorization`] — the generic ERC-20 message, signed
//!   against the facilitator contract's domain. The struct name is lowercase
//!   on purpose: the EIP-712 typehash is derived from it and must agree
//!   bit-exactly with the on-chain verifier.
//!
//! Both produce 32-byte digests via
//! `keccak256(0x19 || 0x01 || domainSeparator || structHash)`; signers that
//! want the full typed-data form (wallets, hardware signers) get it through
//! [`typed_data_for`], which carries the injected `EIP712Domain` type and
//! checksum-normalized addresses.

use alloy_dyn_abi::TypedData;
use alloy_primitives::Address;
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain, sol};
use serde::Serialize;

sol! {
    /// EIP-3009 `TransferWithAuthorization` message.
    ///
    /// Authorizes a transfer from `from` to `to` of `value` token units,
    /// valid only in the `[validAfter, validBefore]` window and identified
    /// by a unique 32-byte `nonce`.
    #[derive(serde::Serialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

sol! {
    /// Generic ERC-20 transfer authorization verified by the facilitator
    /// contract.
    ///
    /// Carries the token address (the signature binds the token even though
    /// the verifying contract is the facilitator) and the `needApprove`
    /// marker signalling that an on-chain allowance backs this payment.
    #[allow(non_camel_case_types)]
    #[derive(serde::Serialize)]
    struct tokenTransferWithAuthorization {
        address token;
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
        bool needApprove;
    }
}

/// EIP-712 domain for an EIP-3009 token contract.
#[must_use]
pub fn eip3009_domain(
    name: &str,
    version: &str,
    chain_id: u64,
    verifying_contract: Address,
) -> Eip712Domain {
    eip712_domain! {
        name: name.to_owned(),
        version: version.to_owned(),
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    }
}

/// EIP-712 domain for the facilitator settlement contract.
///
/// The deployed contract declares itself as `("Facilitator", "1")`; only the
/// address varies per deployment (and is taken from the injected network
/// table). If a future contract revision changes its domain, this is the one
/// place to update.
#[must_use]
pub fn facilitator_domain(chain_id: u64, verifying_contract: Address) -> Eip712Domain {
    eip712_domain! {
        name: "Facilitator",
        version: "1",
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    }
}

/// Builds the full typed-data form of a message for generic
/// `signTypedData`-style signers.
#[must_use]
pub fn typed_data_for<T: SolStruct + Serialize>(message: &T, domain: &Eip712Domain) -> TypedData {
    TypedData::from_struct(message, Some(domain.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256, address, b256};

    fn eip3009_message() -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: address!("0x857b06519E91e3A54538791bDbb0E22373e36b66"),
            to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"),
            value: U256::from(1_000_000u64),
            validAfter: U256::from(1_700_000_000u64),
            validBefore: U256::from(1_700_003_600u64),
            nonce: B256::repeat_byte(0x11),
        }
    }

    #[test]
    fn test_typehash_names_match_onchain_verifiers() {
        assert_eq!(
            TransferWithAuthorization::eip712_root_type(),
            "TransferWithAuthorization(address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce)"
        );
        assert_eq!(
            tokenTransferWithAuthorization::eip712_root_type(),
            "tokenTransferWithAuthorization(address token,address from,address to,uint256 value,uint256 validAfter,uint256 validBefore,bytes32 nonce,bool needApprove)"
        );
    }

    #[test]
    fn test_eip3009_digest_is_stable() {
        let domain = eip3009_domain(
            "USDC",
            "2",
            84532,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        );
        let first = eip3009_message().eip712_signing_hash(&domain);
        let second = eip3009_message().eip712_signing_hash(&domain);
        assert_eq!(first, second);
        assert_ne!(first, B256::ZERO);
    }

    #[test]
    fn test_domain_distinguishes_digests() {
        let message = eip3009_message();
        let base = eip3009_domain(
            "USDC",
            "2",
            8453,
            address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        );
        let sepolia = eip3009_domain(
            "USDC",
            "2",
            84532,
            address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
        );
        assert_ne!(
            message.eip712_signing_hash(&base),
            message.eip712_signing_hash(&sepolia)
        );
    }

    #[test]
    fn test_typed_data_agrees_with_struct_hash() {
        let domain = facilitator_domain(
            84532,
            address!("0x555e3311a9893c9B17444C1Ff0d88192a57Ef13e"),
        );
        let message = tokenTransferWithAuthorization {
            token: address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e"),
            from: address!("0x857b06519E91e3A54538791bDbb0E22373e36b66"),
            to: address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C"),
            value: U256::from(1_000_000u64),
            validAfter: U256::from(1_700_000_000u64),
            validBefore: U256::from(1_700_003_600u64),
            nonce: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            needApprove: true,
        };

        let direct = message.eip712_signing_hash(&domain);
        let via_typed_data = typed_data_for(&message, &domain)
            .eip712_signing_hash()
            .unwrap();
        assert_eq!(direct, via_typed_data);
    }
}
