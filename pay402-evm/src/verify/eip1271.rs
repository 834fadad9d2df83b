//! EIP-1271 signature verification for deployed smart contract wallets.

use alloy_primitives::{Address, B256, Bytes};
use alloy_sol_types::{SolCall, sol};

use crate::signers::{ContractReader, SignerError};

sol! {
    /// Minimal EIP-1271 interface.
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4);
}

/// Magic value returned by `isValidSignature` on success:
/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`.
pub const EIP1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

/// Verifies a signature against a deployed smart contract wallet.
///
/// Calls `isValidSignature(bytes32,bytes)` on `wallet` and checks that the
/// returned value equals [`EIP1271_MAGIC_VALUE`]. A non-magic return or a
/// revert carrying data means the wallet evaluated and rejected the
/// signature (`Ok(false)`); a revert without data or a transport failure
/// cannot be attributed to the wallet and propagates as an error.
///
/// # Errors
///
/// Returns [`SignerError`] on a data-less error response or a transport
/// failure.
pub async fn verify_eip1271_signature<R: ContractReader + ?Sized>(
    reader: &R,
    wallet: Address,
    hash: B256,
    signature: &[u8],
) -> Result<bool, SignerError> {
    let call = isValidSignatureCall {
        hash,
        signature: Bytes::copy_from_slice(signature),
    };

    match reader.call(wallet, call.abi_encode().into()).await {
        Ok(ret) => {
            if ret.len() < 4 {
                return Ok(false);
            }
            Ok(ret[..4] == EIP1271_MAGIC_VALUE)
        }
        // The wallet evaluated the signature and reverted with data:
        // invalid, not a system failure.
        Err(SignerError::Contract(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pay402::scheme::BoxFuture;

    enum FixedOutcome {
        Returns(Vec<u8>),
        RevertWithData(&'static str),
        BareRevert,
        TransportDown,
    }

    struct FixedReader {
        outcome: FixedOutcome,
    }

    impl ContractReader for FixedReader {
        fn call(&self, _to: Address, _calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
            Box::pin(async move {
                match &self.outcome {
                    FixedOutcome::Returns(ret) => Ok(Bytes::copy_from_slice(ret)),
                    FixedOutcome::RevertWithData(msg) => {
                        Err(SignerError::Contract((*msg).to_owned()))
                    }
                    FixedOutcome::BareRevert => {
                        Err(SignerError::Call("execution reverted".to_owned()))
                    }
                    FixedOutcome::TransportDown => {
                        Err(SignerError::Transport("connection refused".to_owned()))
                    }
                }
            })
        }
    }

    fn magic_return() -> Vec<u8> {
        // bytes4 return value, ABI-encoded into a 32-byte word
        let mut ret = vec![0u8; 32];
        ret[..4].copy_from_slice(&EIP1271_MAGIC_VALUE);
        ret
    }

    #[tokio::test]
    async fn test_magic_return_is_valid() {
        let reader = FixedReader {
            outcome: FixedOutcome::Returns(magic_return()),
        };
        let valid =
            verify_eip1271_signature(&reader, Address::ZERO, B256::repeat_byte(1), &[0u8; 65])
                .await
                .unwrap();
        assert!(valid);
    }

    #[tokio::test]
    async fn test_non_magic_return_is_invalid() {
        let reader = FixedReader {
            outcome: FixedOutcome::Returns(vec![0u8; 32]),
        };
        let valid =
            verify_eip1271_signature(&reader, Address::ZERO, B256::repeat_byte(1), &[0u8; 65])
                .await
                .unwrap();
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_revert_with_data_is_invalid() {
        let reader = FixedReader {
            outcome: FixedOutcome::RevertWithData("invalid signature"),
        };
        assert!(
            !verify_eip1271_signature(&reader, Address::ZERO, B256::ZERO, &[])
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_bare_revert_and_transport_failure_are_errors() {
        let bare = FixedReader {
            outcome: FixedOutcome::BareRevert,
        };
        assert!(
            verify_eip1271_signature(&bare, Address::ZERO, B256::ZERO, &[])
                .await
                .is_err()
        );

        let down = FixedReader {
            outcome: FixedOutcome::TransportDown,
        };
        assert!(
            verify_eip1271_signature(&down, Address::ZERO, B256::ZERO, &[])
                .await
                .is_err()
        );
    }
}
