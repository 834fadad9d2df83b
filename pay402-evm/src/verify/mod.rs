//! Signature verification for EVM payment authorizations.
//!
//! Three verifier code paths, unified by [`universal`]:
//!
//! - [`eoa`] — secp256k1 recovery for externally owned accounts
//! - [`eip1271`] — `isValidSignature` calls for deployed contract wallets
//! - [`erc6492`] — envelope parsing for counterfactual (undeployed) wallets
//!
//! All three must agree bit-exact with the on-chain verifiers; the digests
//! they check come from [`crate::eip712`].

pub mod eip1271;
pub mod eoa;
pub mod erc6492;
pub mod universal;

pub use eip1271::{EIP1271_MAGIC_VALUE, verify_eip1271_signature};
pub use eoa::verify_eoa_signature;
pub use erc6492::{
    ERC6492_MAGIC_SUFFIX, Erc6492ParseError, Erc6492SignatureData, is_erc6492_signature,
    parse_erc6492_signature, wrap_erc6492_signature,
};
pub use universal::verify_universal_signature;

use crate::signers::SignerError;

/// Errors from signature verification.
///
/// Everything except [`Self::Signer`] with a transport cause is a property of
/// the signature itself; callers map those to payment rejections while
/// transport failures stay system errors.
#[derive(Debug, thiserror::Error)]
pub enum SignatureVerificationError {
    /// An EOA signature must be exactly 65 bytes.
    #[error("invalid EOA signature length: expected 65 bytes, got {0}")]
    InvalidEoaLength(usize),

    /// Public key recovery failed (invalid curve point, bad recovery id).
    #[error("signature recovery failed: {0}")]
    Recovery(String),

    /// The signer is an undeployed smart wallet and the caller's policy
    /// disallows deferring verification to deployment.
    #[error("undeployed smart wallet not allowed")]
    UndeployedNotAllowed,

    /// The ERC-6492 wrapper could not be decoded.
    #[error(transparent)]
    Erc6492(#[from] Erc6492ParseError),

    /// The underlying signer failed.
    #[error(transparent)]
    Signer(#[from] SignerError),
}
