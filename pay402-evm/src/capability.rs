//! EIP-3009 capability detection for token contracts.
//!
//! Not every ERC-20 implements `transferWithAuthorization`. The probe
//! simulates the call with zero values and a dummy signature and classifies
//! the way it fails: a token that evaluates the (garbage) signature clearly
//! has the entrypoint; a token whose fallback rejects the selector does not.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, sol};

use crate::chain::ChainId;
use crate::signers::{ContractReader, SignerError};

sol! {
    /// EIP-3009 `transferWithAuthorization`, (v, r, s) form — the standard
    /// entrypoint probed for capability detection.
    #[allow(clippy::too_many_arguments)]
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

/// Process-wide memo of probe results keyed by `(chainId, token)`.
///
/// Entries are write-once per key in practice; concurrent probes of an
/// absent key may both run, but they store the same value, so the race is
/// benign. The cache is bounded by the number of distinct tokens ever seen.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<(ChainId, Address), bool>>,
}

impl CapabilityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the cache in an [`Arc`] for sharing across schemes.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the cached capability for a token, if probed before.
    #[must_use]
    pub fn get(&self, chain_id: ChainId, token: Address) -> Option<bool> {
        self.entries
            .read()
            .ok()
            .and_then(|map| map.get(&(chain_id, token)).copied())
    }

    /// Stores a probe result.
    pub fn put(&self, chain_id: ChainId, token: Address, supported: bool) {
        if let Ok(mut map) = self.entries.write() {
            map.insert((chain_id, token), supported);
        }
    }
}

/// Checks whether a token contract supports EIP-3009
/// `transferWithAuthorization`.
///
/// Call sites should consult the static per-asset flag first; the probe is
/// the fallback for unknown tokens. The simulation uses zero addresses and a
/// garbage `v = 27` signature, so on a conforming token it always reverts —
/// but with a signature/authorization/nonce complaint, which is the tell:
///
/// | Simulation result | Conclusion |
/// |---|---|
/// | Reverts mentioning `signature`, `authorization`, or `nonce` | Supported |
/// | Reverts otherwise (selector not found, bare revert) | Unsupported |
/// | Succeeds unexpectedly | Supported |
///
/// A transport failure yields `false` without caching (the safer default:
/// the caller falls back to the universally-workable ERC-20 flow and the
/// probe retries next time). Classified results are memoized, so the
/// answer for a given `(chainId, token)` is stable across calls.
pub async fn verify_eip3009_support<R: ContractReader + ?Sized>(
    reader: &R,
    cache: &CapabilityCache,
    chain_id: ChainId,
    from: Address,
    token: Address,
) -> bool {
    if let Some(cached) = cache.get(chain_id, token) {
        return cached;
    }

    let call = transferWithAuthorizationCall {
        from,
        // Self-transfer for safety; the call is simulation-only anyway.
        to: from,
        value: U256::ZERO,
        validAfter: U256::ZERO,
        validBefore: U256::ZERO,
        nonce: B256::ZERO,
        v: 27,
        r: B256::ZERO,
        s: B256::ZERO,
    };

    let supported = match reader.call(token, call.abi_encode().into()).await {
        // Surprising success: the entrypoint exists (and accepts anything).
        Ok(_) => true,
        Err(SignerError::Contract(message)) => {
            let message = message.to_lowercase();
            message.contains("signature")
                || message.contains("authorization")
                || message.contains("nonce")
        }
        // Bare revert without data: selector not found or fallback rejected.
        Err(SignerError::Call(_)) => false,
        Err(_) => {
            // Transport failure: do not cache, report unsupported.
            return false;
        }
    };

    cache.put(chain_id, token, supported);
    supported
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use pay402::scheme::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum ProbeOutcome {
        Success,
        RevertWithData(&'static str),
        BareRevert,
        TransportDown,
    }

    struct ProbeReader {
        outcome: ProbeOutcome,
        calls: AtomicUsize,
    }

    impl ProbeReader {
        fn new(outcome: ProbeOutcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ContractReader for ProbeReader {
        fn call(&self, _to: Address, _calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                match &self.outcome {
                    ProbeOutcome::Success => Ok(Bytes::new()),
                    ProbeOutcome::RevertWithData(msg) => {
                        Err(SignerError::Contract((*msg).to_owned()))
                    }
                    ProbeOutcome::BareRevert => {
                        Err(SignerError::Call("execution reverted".to_owned()))
                    }
                    ProbeOutcome::TransportDown => {
                        Err(SignerError::Transport("connection refused".to_owned()))
                    }
                }
            })
        }
    }

    fn token() -> Address {
        "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_signature_revert_means_supported() {
        let reader = ProbeReader::new(ProbeOutcome::RevertWithData("FiatTokenV2: invalid signature"));
        let cache = CapabilityCache::new();
        assert!(verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await);
    }

    #[tokio::test]
    async fn test_expired_authorization_revert_means_supported() {
        let reader = ProbeReader::new(ProbeOutcome::RevertWithData(
            "FiatTokenV2: authorization is expired",
        ));
        let cache = CapabilityCache::new();
        assert!(verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await);
    }

    #[tokio::test]
    async fn test_unrelated_revert_means_unsupported() {
        let reader = ProbeReader::new(ProbeOutcome::RevertWithData("ERC20: paused"));
        let cache = CapabilityCache::new();
        assert!(!verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await);
    }

    #[tokio::test]
    async fn test_bare_revert_means_unsupported_and_is_cached() {
        let reader = ProbeReader::new(ProbeOutcome::BareRevert);
        let cache = CapabilityCache::new();
        assert!(!verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await);
        assert_eq!(cache.get(84532, token()), Some(false));
    }

    #[tokio::test]
    async fn test_unexpected_success_means_supported() {
        let reader = ProbeReader::new(ProbeOutcome::Success);
        let cache = CapabilityCache::new();
        assert!(verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await);
    }

    #[tokio::test]
    async fn test_result_is_cached_and_stable() {
        let reader = ProbeReader::new(ProbeOutcome::RevertWithData("invalid signature"));
        let cache = CapabilityCache::new();

        let first = verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await;
        let second = verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await;

        assert!(first && second);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_cached() {
        let reader = ProbeReader::new(ProbeOutcome::TransportDown);
        let cache = CapabilityCache::new();

        assert!(!verify_eip3009_support(&reader, &cache, 84532, Address::ZERO, token()).await);
        assert_eq!(cache.get(84532, token()), None);
    }

    #[tokio::test]
    async fn test_cache_is_keyed_per_chain() {
        let cache = CapabilityCache::new();
        cache.put(1, token(), true);
        assert_eq!(cache.get(1, token()), Some(true));
        assert_eq!(cache.get(8453, token()), None);
    }
}
