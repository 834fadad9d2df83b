//! ECDSA signature verification for externally owned accounts.

use alloy_primitives::{Address, B256, Signature};

use super::SignatureVerificationError;

/// Verifies an ECDSA signature from an externally owned account.
///
/// Recovers the secp256k1 public key over `hash`, derives the signer address,
/// and compares it with `expected`. Both Ethereum-style `v ∈ {27, 28}` and
/// raw `v ∈ {0, 1}` recovery ids are accepted. Low-s is not enforced.
///
/// # Errors
///
/// Returns an error if the signature is not 65 bytes or recovery fails
/// (invalid curve point, malleable s, bad recovery id).
pub fn verify_eoa_signature(
    hash: &B256,
    signature: &[u8],
    expected: Address,
) -> Result<bool, SignatureVerificationError> {
    if signature.len() != 65 {
        return Err(SignatureVerificationError::InvalidEoaLength(
            signature.len(),
        ));
    }

    let parsed = Signature::from_raw(signature)
        .map_err(|e| SignatureVerificationError::Recovery(e.to_string()))?;
    let recovered = parsed
        .recover_address_from_prehash(hash)
        .map_err(|e| SignatureVerificationError::Recovery(e.to_string()))?;

    Ok(recovered == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signers::normalize_signature;
    use alloy_primitives::B256;
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    #[test]
    fn test_recovers_expected_address() {
        let signer = PrivateKeySigner::random();
        let hash = B256::repeat_byte(0x21);
        let signature = normalize_signature(&signer.sign_hash_sync(&hash).unwrap());

        assert!(verify_eoa_signature(&hash, &signature, signer.address()).unwrap());
    }

    #[test]
    fn test_wrong_address_is_invalid_not_error() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let hash = B256::repeat_byte(0x21);
        let signature = normalize_signature(&signer.sign_hash_sync(&hash).unwrap());

        assert!(!verify_eoa_signature(&hash, &signature, other.address()).unwrap());
    }

    #[test]
    fn test_accepts_both_v_encodings() {
        let signer = PrivateKeySigner::random();
        let hash = B256::repeat_byte(0x33);
        let mut signature = normalize_signature(&signer.sign_hash_sync(&hash).unwrap()).to_vec();

        // v ∈ {27, 28}
        assert!(verify_eoa_signature(&hash, &signature, signer.address()).unwrap());

        // The same signature with v ∈ {0, 1}
        signature[64] -= 27;
        assert!(verify_eoa_signature(&hash, &signature, signer.address()).unwrap());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let hash = B256::repeat_byte(0x44);
        let err = verify_eoa_signature(&hash, &[0u8; 64], Address::ZERO).unwrap_err();
        assert!(matches!(
            err,
            SignatureVerificationError::InvalidEoaLength(64)
        ));
    }
}
