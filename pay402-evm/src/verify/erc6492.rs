//! ERC-6492 signature envelopes for counterfactual smart wallets.
//!
//! ERC-6492 wraps a signature together with the factory address and calldata
//! needed to deploy the signing contract, so signatures can be verified (and
//! the wallet deployed on demand) before the contract exists on-chain. The
//! wrapper is `abi.encode(factory, factoryCalldata, innerSig)` followed by a
//! fixed 32-byte magic suffix.

use alloy_primitives::{Address, Bytes, hex};
use alloy_sol_types::{SolValue, sol};

/// The fixed 32-byte magic suffix defined by
/// [ERC-6492](https://eips.ethereum.org/EIPS/eip-6492):
/// `bytes32(uint256(keccak256("erc6492.invalid.signature")) - 1)`.
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] =
    hex!("6492649264926492649264926492649264926492649264926492649264926492");

sol! {
    /// ABI-decodable prefix of an ERC-6492 wrapped signature.
    struct Sig6492 {
        address factory;
        bytes   factoryCalldata;
        bytes   innerSig;
    }
}

/// Parsed components of a (possibly wrapped) signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc6492SignatureData {
    /// CREATE2 factory address (zero when the signature was not wrapped).
    pub factory: Address,
    /// Calldata that deploys the wallet (empty when not wrapped).
    pub factory_calldata: Bytes,
    /// The actual signature (EOA or EIP-1271).
    pub inner_signature: Bytes,
}

impl Erc6492SignatureData {
    /// Returns `true` when the envelope carries usable deployment
    /// information: a non-zero factory **and** non-empty calldata.
    ///
    /// A wrapped signature with empty calldata is treated as having no
    /// deployment info.
    #[must_use]
    pub fn has_deployment_info(&self) -> bool {
        self.factory != Address::ZERO && !self.factory_calldata.is_empty()
    }
}

/// Errors from parsing an ERC-6492 wrapper.
#[derive(Debug, thiserror::Error)]
pub enum Erc6492ParseError {
    /// The magic suffix was present but the prefix did not ABI-decode.
    #[error("invalid ERC-6492 wrapper: {0}")]
    InvalidWrapper(#[from] alloy_sol_types::Error),
}

/// Checks whether a signature carries the ERC-6492 magic suffix.
#[must_use]
pub fn is_erc6492_signature(signature: &[u8]) -> bool {
    signature.len() >= 32 && signature[signature.len() - 32..] == ERC6492_MAGIC_SUFFIX
}

/// Unwraps an ERC-6492 signature into its components.
///
/// Unwrapped input passes through: the envelope carries the original bytes
/// as the inner signature with a zero factory.
///
/// # Errors
///
/// Returns an error if the magic suffix is present but the prefix does not
/// decode as `(address, bytes, bytes)`.
pub fn parse_erc6492_signature(
    signature: &[u8],
) -> Result<Erc6492SignatureData, Erc6492ParseError> {
    if !is_erc6492_signature(signature) {
        return Ok(Erc6492SignatureData {
            factory: Address::ZERO,
            factory_calldata: Bytes::new(),
            inner_signature: Bytes::copy_from_slice(signature),
        });
    }

    let body = &signature[..signature.len() - 32];
    let decoded = Sig6492::abi_decode_params(body)?;

    Ok(Erc6492SignatureData {
        factory: decoded.factory,
        factory_calldata: decoded.factoryCalldata,
        inner_signature: decoded.innerSig,
    })
}

/// Wraps a signature with ERC-6492 deployment information.
///
/// The inverse of [`parse_erc6492_signature`] for wrapped inputs.
#[must_use]
pub fn wrap_erc6492_signature(factory: Address, factory_calldata: Bytes, inner: Bytes) -> Bytes {
    let prefix = Sig6492 {
        factory,
        factoryCalldata: factory_calldata,
        innerSig: inner,
    }
    .abi_encode_params();

    let mut out = Vec::with_capacity(prefix.len() + 32);
    out.extend_from_slice(&prefix);
    out.extend_from_slice(&ERC6492_MAGIC_SUFFIX);
    out.into()
}
