//! Universal signature verification across EOA, EIP-1271, and ERC-6492.

use alloy_primitives::{Address, B256};

use super::eip1271::verify_eip1271_signature;
use super::eoa::verify_eoa_signature;
use super::erc6492::{Erc6492SignatureData, parse_erc6492_signature};
use super::SignatureVerificationError;
use crate::signers::FacilitatorEvmSigner;

/// Verifies a signature from any supported source.
///
/// The decision tree:
///
/// 1. Parse the ERC-6492 wrapper if present.
/// 2. A 65-byte inner signature with no factory is an EOA signature;
///    recovery runs locally with **no chain RPC** (a 65-byte signature
///    cannot be an EIP-1271 output, so the fast path is exact).
/// 3. Otherwise fetch the signer's code.
/// 4. Deployed contract: EIP-1271 verification over the inner signature.
/// 5. Undeployed with deployment info: valid-with-envelope when
///    `allow_undeployed` is set (actual deployment is deferred to
///    settlement); an error otherwise.
/// 6. Undeployed without deployment info: EOA fallback over the inner
///    signature.
///
/// The returned envelope lets settlement invoke the factory exactly once,
/// behind its deploy-on-settle switch, without re-parsing the wrapper.
///
/// # Errors
///
/// Returns an error for malformed signatures, a disallowed undeployed
/// wallet, or an underlying signer failure.
pub async fn verify_universal_signature<S: FacilitatorEvmSigner + ?Sized>(
    signer: &S,
    signer_address: Address,
    hash: B256,
    signature: &[u8],
    allow_undeployed: bool,
) -> Result<(bool, Erc6492SignatureData), SignatureVerificationError> {
    let sig_data = parse_erc6492_signature(signature)?;

    let is_eoa_signature =
        sig_data.inner_signature.len() == 65 && sig_data.factory == Address::ZERO;
    if is_eoa_signature {
        let valid = verify_eoa_signature(&hash, &sig_data.inner_signature, signer_address)?;
        return Ok((valid, sig_data));
    }

    let code = signer.get_code(signer_address).await?;
    let is_deployed = !code.is_empty();

    if !is_deployed {
        if sig_data.has_deployment_info() {
            if !allow_undeployed {
                return Err(SignatureVerificationError::UndeployedNotAllowed);
            }
            // Valid ERC-6492 envelope from an undeployed wallet; the
            // signature itself is checked on-chain after deployment.
            return Ok((true, sig_data));
        }

        // No deployment info: treat as an oddly-encoded EOA signature.
        let valid = verify_eoa_signature(&hash, &sig_data.inner_signature, signer_address)?;
        return Ok((valid, sig_data));
    }

    let valid =
        verify_eip1271_signature(signer, signer_address, hash, &sig_data.inner_signature).await?;
    Ok((valid, sig_data))
}
