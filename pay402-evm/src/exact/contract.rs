//! On-chain ABI surface used by the exact scheme.
//!
//! Only the entrypoints the scheme actually encodes are declared; calldata is
//! built with [`SolCall::abi_encode`](alloy_sol_types::SolCall) and submitted
//! through the signer abstractions.

use alloy_sol_types::sol;

sol! {
    /// ERC-20 subset used by the allowance-backed flow.
    function allowance(address owner, address spender) external view returns (uint256);
    function approve(address spender, uint256 value) external returns (bool);
    function balanceOf(address account) external view returns (uint256);
}

sol! {
    /// Facilitator settlement contract, EIP-712 domain `("Facilitator", "1")`.
    ///
    /// `settlePayment` handles both flows: for EIP-3009 tokens it forwards to
    /// the token's `transferWithAuthorization`; for plain ERC-20 tokens it
    /// verifies the `tokenTransferWithAuthorization` signature itself
    /// (SignatureChecker, supporting EIP-1271 and ERC-6492) and pulls the
    /// transfer from the payer's allowance. Authorization freshness and
    /// per-(token, authorizer) nonce uniqueness are enforced on-chain; the
    /// off-chain verify step is an optimistic pre-check.
    #[allow(clippy::too_many_arguments)]
    function settlePayment(
        address token,
        address from,
        address to,
        uint256 value,
        uint256 validAfter,
        uint256 validBefore,
        bytes32 nonce,
        bytes signature
    ) external;
    function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);
    function cancelAuthorization(address authorizer, bytes32 nonce, bytes signature) external;
}

sol! {
    /// EIP-3009 `transferWithAuthorization` in both forms. The bytes-signature
    /// variant (`_0`) serves smart wallets; the split (v, r, s) variant
    /// (`_1`) is the standard entrypoint for EOA signatures.
    #[allow(clippy::too_many_arguments)]
    interface IEip3009Token {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}
