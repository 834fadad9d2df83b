//! End-to-end exercises of the exact scheme against an in-memory chain.
//!
//! A `ChainState` implements both signer capability sets over shared state:
//! contract code, ERC-20 allowances, EIP-3009 probe behavior, EIP-1271
//! wallets, and settlement/deployment outcomes. Client payloads are produced
//! by the real `ExactEvmClient` with a real private key, then pushed through
//! the real `ExactEvmFacilitator`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, B256, Bytes, FixedBytes, U256, address, hex};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use pay402::proto::{PaymentPayload, PaymentRequirements};
use pay402::scheme::{BoxFuture, SchemeClient, SchemeFacilitator};
use pay402_evm::capability::transferWithAuthorizationCall;
use pay402_evm::chain::{AssetInfo, NetworkConfig};
use pay402_evm::exact::contract::{allowanceCall, approveCall, settlePaymentCall};
use pay402_evm::exact::{ExactEvmClient, ExactEvmConfig, ExactEvmFacilitator, reason};
use pay402_evm::networks::{DEFAULT_FACILITATOR_CONTRACT, EvmNetworks};
use pay402_evm::signers::{
    ClientEvmSigner, ContractReader, FacilitatorEvmSigner, SignerError, TransactionReceipt,
    normalize_signature,
};
use pay402_evm::verify::eip1271::isValidSignatureCall;
use pay402_evm::verify::{EIP1271_MAGIC_VALUE, wrap_erc6492_signature};
use serde_json::Value;

const PAYEE: Address = address!("0x209693Bc6afc0C5328bA36FaF03C514EF312287C");
const FACTORY: Address = address!("0x4e59b44847b379578588920cA78FbF26c0B4956C");

/// Shared in-memory chain state.
#[derive(Default)]
struct ChainState {
    code: Mutex<HashMap<Address, Bytes>>,
    /// (token, owner, spender) -> allowance
    allowances: Mutex<HashMap<(Address, Address, Address), U256>>,
    /// Tokens whose probe revert mentions the signature (EIP-3009 capable).
    eip3009_tokens: HashSet<Address>,
    /// Wallets whose `isValidSignature` returns the magic value.
    valid_1271: HashSet<Address>,
    /// Wallet deployed when the factory is invoked.
    deploy_target: Option<Address>,
    deploy_reverts: bool,
    settle_reverts: bool,
    get_code_calls: AtomicUsize,
    sent: Mutex<Vec<(Address, Bytes)>>,
    tx_counter: AtomicUsize,
}

impl ChainState {
    fn read_call(&self, to: Address, calldata: &Bytes) -> Result<Bytes, SignerError> {
        if calldata.len() < 4 {
            return Err(SignerError::Contract("missing selector".to_owned()));
        }
        let selector: [u8; 4] = calldata[..4].try_into().expect("4-byte selector");

        if selector == allowanceCall::SELECTOR {
            let call = allowanceCall::abi_decode(calldata).expect("allowance args");
            let allowance = self
                .allowances
                .lock()
                .unwrap()
                .get(&(to, call.owner, call.spender))
                .copied()
                .unwrap_or(U256::ZERO);
            return Ok(allowanceCall::abi_encode_returns(&allowance).into());
        }

        if selector == isValidSignatureCall::SELECTOR {
            let magic = if self.valid_1271.contains(&to) {
                FixedBytes::<4>::from(EIP1271_MAGIC_VALUE)
            } else {
                FixedBytes::<4>::ZERO
            };
            return Ok(isValidSignatureCall::abi_encode_returns(&magic).into());
        }

        if selector == transferWithAuthorizationCall::SELECTOR {
            if self.eip3009_tokens.contains(&to) {
                return Err(SignerError::Contract(
                    "FiatTokenV2: invalid signature".to_owned(),
                ));
            }
            // A token without the entrypoint reverts bare, with no data.
            return Err(SignerError::Call("execution reverted".to_owned()));
        }

        Err(SignerError::Call("execution reverted".to_owned()))
    }

    fn apply_send(
        &self,
        owner: Address,
        to: Address,
        calldata: &Bytes,
    ) -> Result<TransactionReceipt, SignerError> {
        self.sent.lock().unwrap().push((to, calldata.clone()));
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        #[allow(clippy::cast_possible_truncation)]
        let receipt = |status: bool| TransactionReceipt {
            transaction_hash: B256::repeat_byte(n as u8),
            status,
            block_number: Some(n as u64),
        };

        if calldata.len() >= 4 {
            let selector: [u8; 4] = calldata[..4].try_into().expect("4-byte selector");

            if selector == approveCall::SELECTOR {
                let call = approveCall::abi_decode(calldata).expect("approve args");
                self.allowances
                    .lock()
                    .unwrap()
                    .insert((to, owner, call.spender), call.value);
                return Ok(receipt(true));
            }

            if selector == settlePaymentCall::SELECTOR {
                return Ok(receipt(!self.settle_reverts));
            }
        }

        if to == FACTORY {
            if self.deploy_reverts {
                return Ok(receipt(false));
            }
            if let Some(wallet) = self.deploy_target {
                self.code
                    .lock()
                    .unwrap()
                    .insert(wallet, Bytes::from(vec![0x60, 0x80]));
            }
            return Ok(receipt(true));
        }

        Ok(receipt(true))
    }
}

/// Facilitator-side mock signer over the shared chain.
struct MockFacilitatorSigner {
    chain: Arc<ChainState>,
    settle_from: Address,
}

impl ContractReader for MockFacilitatorSigner {
    fn call(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        Box::pin(async move { self.chain.read_call(to, &calldata) })
    }
}

impl FacilitatorEvmSigner for MockFacilitatorSigner {
    fn addresses(&self) -> Vec<Address> {
        vec![self.settle_from]
    }

    fn get_code(&self, address: Address) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        Box::pin(async move {
            self.chain.get_code_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .chain
                .code
                .lock()
                .unwrap()
                .get(&address)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn get_chain_id(&self) -> BoxFuture<'_, Result<u64, SignerError>> {
        Box::pin(async { Ok(84532) })
    }

    fn get_balance(
        &self,
        _account: Address,
        _token: Address,
    ) -> BoxFuture<'_, Result<U256, SignerError>> {
        Box::pin(async { Ok(U256::MAX) })
    }

    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>> {
        Box::pin(async move { self.chain.apply_send(self.settle_from, to, &calldata) })
    }
}

/// Client-side mock signer: real key, shared chain.
struct MockClientSigner {
    key: PrivateKeySigner,
    chain: Arc<ChainState>,
}

impl ContractReader for MockClientSigner {
    fn call(&self, to: Address, calldata: Bytes) -> BoxFuture<'_, Result<Bytes, SignerError>> {
        Box::pin(async move { self.chain.read_call(to, &calldata) })
    }
}

impl ClientEvmSigner for MockClientSigner {
    fn address(&self) -> Address {
        self.key.address()
    }

    fn sign_typed_data<'a>(
        &'a self,
        typed_data: &'a TypedData,
    ) -> BoxFuture<'a, Result<Bytes, SignerError>> {
        Box::pin(async move {
            let signature = self
                .key
                .sign_dynamic_typed_data(typed_data)
                .await
                .map_err(|e| SignerError::Signing(e.to_string()))?;
            Ok(normalize_signature(&signature))
        })
    }

    fn send_transaction(
        &self,
        to: Address,
        calldata: Bytes,
    ) -> BoxFuture<'_, Result<TransactionReceipt, SignerError>> {
        Box::pin(async move { self.chain.apply_send(self.key.address(), to, &calldata) })
    }
}

/// Test harness wiring a client and facilitator over one chain.
struct Harness {
    chain: Arc<ChainState>,
    client: ExactEvmClient<MockClientSigner>,
    facilitator: ExactEvmFacilitator<MockFacilitatorSigner>,
    payer: Address,
}

fn usdc_sepolia() -> Address {
    address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e")
}

fn networks_with_eip3009(supports: bool) -> Arc<EvmNetworks> {
    let asset = AssetInfo {
        address: usdc_sepolia(),
        name: "USDC".into(),
        version: "2".into(),
        decimals: 6,
        supports_eip3009: supports,
    };
    let mut supported_assets = HashMap::new();
    supported_assets.insert("USDC".to_owned(), asset.clone());
    EvmNetworks::with_configs(
        vec![NetworkConfig {
            network: "eip155:84532".into(),
            chain_id: 84532,
            default_asset: asset,
            supported_assets,
        }],
        DEFAULT_FACILITATOR_CONTRACT,
    )
    .shared()
}

fn harness(state: ChainState, networks: &Arc<EvmNetworks>, config: ExactEvmConfig) -> Harness {
    let key = PrivateKeySigner::random();
    let payer = key.address();
    let chain = Arc::new(state);

    let client = ExactEvmClient::new(
        MockClientSigner {
            key,
            chain: Arc::clone(&chain),
        },
        Arc::clone(networks),
    );
    let facilitator = ExactEvmFacilitator::with_config(
        MockFacilitatorSigner {
            chain: Arc::clone(&chain),
            settle_from: address!("0xFEED00000000000000000000000000000000FEED"),
        },
        Arc::clone(networks),
        config,
    );

    Harness {
        chain,
        client,
        facilitator,
        payer,
    }
}

fn requirements(amount: &str) -> PaymentRequirements {
    PaymentRequirements {
        scheme: "exact".into(),
        network: "eip155:84532".into(),
        amount: amount.into(),
        pay_to: PAYEE.to_string(),
        max_timeout_seconds: 300,
        asset: usdc_sepolia().to_string(),
        extra: serde_json::json!({"name": "USDC", "version": "2"}),
    }
}

async fn client_payload(harness: &Harness, req: &PaymentRequirements) -> PaymentPayload {
    let inner = harness.client.create_payment_payload(req).await.unwrap();
    PaymentPayload {
        x402_version: 2,
        accepted: req.clone(),
        payload: inner,
        resource: None,
        extensions: None,
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Builds a facilitator-side payload by hand (for smart-wallet scenarios and
/// boundary tweaks).
fn manual_payload(
    req: &PaymentRequirements,
    from: &str,
    value: &str,
    window: (u64, u64),
    signature: &[u8],
) -> PaymentPayload {
    let inner = serde_json::json!({
        "type": "authorizationEip3009",
        "signature": hex::encode_prefixed(signature),
        "authorization": {
            "from": from,
            "to": PAYEE.to_string(),
            "value": value,
            "validAfter": window.0.to_string(),
            "validBefore": window.1.to_string(),
            "nonce": hex::encode_prefixed([0x42u8; 32]),
        },
    });
    PaymentPayload {
        x402_version: 2,
        accepted: req.clone(),
        payload: inner,
        resource: None,
        extensions: None,
    }
}

fn invalid_reason(response: &pay402::proto::VerifyResponse) -> &str {
    response.invalid_reason.as_deref().unwrap_or("")
}

// --- Scenario 1: happy-path EIP-3009 ------------------------------------

#[tokio::test]
async fn test_happy_path_eip3009() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let payload = client_payload(&h, &req).await;

    assert_eq!(payload.payload["type"], "authorizationEip3009");

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(verify.is_valid, "verify failed: {verify:?}");
    assert_eq!(verify.payer.as_deref(), Some(h.payer.to_string().as_str()));

    // A 65-byte EOA signature never touches get_code.
    assert_eq!(h.chain.get_code_calls.load(Ordering::SeqCst), 0);

    let settle = h.facilitator.settle(&payload, &req).await.unwrap();
    assert!(settle.success, "settle failed: {settle:?}");
    assert!(!settle.transaction.is_empty());
    assert_eq!(settle.network, "eip155:84532");

    // Settlement went through the facilitator contract.
    let sent = h.chain.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, DEFAULT_FACILITATOR_CONTRACT);
    assert_eq!(&sent[0].1[..4], settlePaymentCall::SELECTOR.as_slice());
}

// --- Scenario 2: ERC-20 approve-then-pay ---------------------------------

#[tokio::test]
async fn test_erc20_approve_then_pay() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(false),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");

    let payload = client_payload(&h, &req).await;
    assert_eq!(payload.payload["type"], "authorization");
    assert_eq!(payload.payload["authorization"]["needApprove"], true);

    // The first payment triggered exactly one approve of the full amount.
    {
        let sent = h.chain.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, usdc_sepolia());
        assert_eq!(&sent[0].1[..4], approveCall::SELECTOR.as_slice());
    }
    let allowance = h
        .chain
        .allowances
        .lock()
        .unwrap()
        .get(&(usdc_sepolia(), h.payer, DEFAULT_FACILITATOR_CONTRACT))
        .copied();
    assert_eq!(allowance, Some(U256::from(1_000_000u64)));

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(verify.is_valid, "verify failed: {verify:?}");

    // A second payment of the same amount needs no second approve.
    let _second = client_payload(&h, &req).await;
    let approvals = h
        .chain
        .sent
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, data)| data.len() >= 4 && data[..4] == approveCall::SELECTOR)
        .count();
    assert_eq!(approvals, 1);

    let settle = h.facilitator.settle(&payload, &req).await.unwrap();
    assert!(settle.success, "settle failed: {settle:?}");
}

// --- Scenario 3: under-amount --------------------------------------------

#[tokio::test]
async fn test_under_amount_is_rejected() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let offered = requirements("999999");
    let payload = client_payload(&h, &offered).await;

    let required = requirements("1000000");
    let verify = h.facilitator.verify(&payload, &required).await.unwrap();
    assert!(!verify.is_valid);
    assert_eq!(invalid_reason(&verify), reason::INSUFFICIENT_AMOUNT);
    assert_eq!(verify.payer.as_deref(), Some(h.payer.to_string().as_str()));
}

// --- Scenario 4: deployed smart wallet (EIP-1271) ------------------------

#[tokio::test]
async fn test_deployed_smart_wallet_eip1271() {
    let wallet = address!("0x00000000000000000000000000000000000057A7");
    let mut state = ChainState::default();
    state.valid_1271.insert(wallet);
    state
        .code
        .lock()
        .unwrap()
        .insert(wallet, Bytes::from(vec![0x60, 0x80]));

    let h = harness(
        state,
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let now = unix_now();

    // 100 arbitrary signature bytes: not an EOA shape, so the wallet decides.
    let payload = manual_payload(
        &req,
        &wallet.to_string(),
        "1000000",
        (now - 30, now + 600),
        &[0x5au8; 100],
    );

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(verify.is_valid, "verify failed: {verify:?}");
    assert_eq!(verify.payer.as_deref(), Some(wallet.to_string().as_str()));
}

// --- Scenarios 5 & 6: counterfactual wallet (ERC-6492) -------------------

fn counterfactual_state(wallet: Address, deploy_reverts: bool) -> ChainState {
    let mut state = ChainState::default();
    state.valid_1271.insert(wallet);
    state.deploy_target = Some(wallet);
    state.deploy_reverts = deploy_reverts;
    state
}

fn counterfactual_payload(req: &PaymentRequirements, wallet: Address) -> PaymentPayload {
    let now = unix_now();
    let wrapped = wrap_erc6492_signature(
        FACTORY,
        Bytes::from(vec![0x01, 0x02, 0x03]),
        Bytes::from(vec![0x5au8; 100]),
    );
    manual_payload(
        req,
        &wallet.to_string(),
        "1000000",
        (now - 30, now + 600),
        &wrapped,
    )
}

#[tokio::test]
async fn test_counterfactual_wallet_with_deployment_enabled() {
    let wallet = address!("0x0000000000000000000000000000000000006492");
    let h = harness(
        counterfactual_state(wallet, false),
        &networks_with_eip3009(true),
        ExactEvmConfig {
            deploy_erc4337_with_eip6492: true,
        },
    );
    let req = requirements("1000000");
    let payload = counterfactual_payload(&req, wallet);

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(verify.is_valid, "verify failed: {verify:?}");

    let settle = h.facilitator.settle(&payload, &req).await.unwrap();
    assert!(settle.success, "settle failed: {settle:?}");

    // First the factory call, then settlePayment.
    let sent = h.chain.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, FACTORY);
    assert_eq!(sent[1].0, DEFAULT_FACILITATOR_CONTRACT);
}

#[tokio::test]
async fn test_counterfactual_wallet_with_deployment_disabled() {
    let wallet = address!("0x0000000000000000000000000000000000006492");
    let h = harness(
        counterfactual_state(wallet, false),
        &networks_with_eip3009(true),
        ExactEvmConfig {
            deploy_erc4337_with_eip6492: false,
        },
    );
    let req = requirements("1000000");
    let payload = counterfactual_payload(&req, wallet);

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(verify.is_valid);

    let settle = h.facilitator.settle(&payload, &req).await.unwrap();
    assert!(!settle.success);
    assert_eq!(
        settle.error_reason.as_deref(),
        Some(reason::UNDEPLOYED_SMART_WALLET)
    );

    // Nothing reached the chain.
    assert!(h.chain.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_counterfactual_deployment_revert_fails_settlement() {
    let wallet = address!("0x0000000000000000000000000000000000006492");
    let h = harness(
        counterfactual_state(wallet, true),
        &networks_with_eip3009(true),
        ExactEvmConfig {
            deploy_erc4337_with_eip6492: true,
        },
    );
    let req = requirements("1000000");
    let payload = counterfactual_payload(&req, wallet);

    let settle = h.facilitator.settle(&payload, &req).await.unwrap();
    assert!(!settle.success);
    assert_eq!(
        settle.error_reason.as_deref(),
        Some(reason::SMART_WALLET_DEPLOYMENT_FAILED)
    );
}

// --- Boundary cases ------------------------------------------------------

#[tokio::test]
async fn test_window_bounds_are_inclusive() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let now = unix_now();
    let key = PrivateKeySigner::random();
    let from = key.address().to_string();

    // validAfter == now: inside the window (the garbage signature fails
    // later, which tells us the window check passed).
    let payload = manual_payload(&req, &from, "1000000", (now, now + 600), &[0u8; 65]);
    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert_ne!(invalid_reason(&verify), reason::VALID_AFTER_IN_FUTURE);

    // validAfter in the future: rejected.
    let payload = manual_payload(&req, &from, "1000000", (now + 120, now + 600), &[0u8; 65]);
    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert_eq!(invalid_reason(&verify), reason::VALID_AFTER_IN_FUTURE);

    // validBefore in the past: rejected.
    let payload = manual_payload(&req, &from, "1000000", (now - 600, now - 120), &[0u8; 65]);
    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert_eq!(invalid_reason(&verify), reason::VALID_BEFORE_IN_PAST);
}

#[tokio::test]
async fn test_address_case_differences_compare_equal() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let mut req = requirements("1000000");
    req.pay_to = req.pay_to.to_lowercase();

    let payload = client_payload(&h, &req).await;
    // The client echoed the lowercase payTo; verify against the checksummed
    // form.
    let mut checksummed = req.clone();
    checksummed.pay_to = PAYEE.to_string();
    let verify = h.facilitator.verify(&payload, &checksummed).await.unwrap();
    assert!(verify.is_valid, "case difference rejected: {verify:?}");
}

#[tokio::test]
async fn test_both_v_encodings_verify() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let payload = client_payload(&h, &req).await;

    // v ∈ {27, 28} from the client.
    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(verify.is_valid);

    // Re-encode the same signature with v ∈ {0, 1}.
    let sig_hex = payload.payload["signature"].as_str().unwrap();
    let mut sig = hex::decode(sig_hex).unwrap();
    sig[64] -= 27;
    let mut altered = payload.clone();
    altered.payload["signature"] = Value::String(hex::encode_prefixed(&sig));

    let verify = h.facilitator.verify(&altered, &req).await.unwrap();
    assert!(verify.is_valid, "v=0/1 signature rejected: {verify:?}");
}

#[tokio::test]
async fn test_recipient_mismatch() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let payload = client_payload(&h, &req).await;

    let mut diverted = req.clone();
    diverted.pay_to = "0x00000000000000000000000000000000000000bb".into();
    let verify = h.facilitator.verify(&payload, &diverted).await.unwrap();
    assert!(!verify.is_valid);
    assert_eq!(invalid_reason(&verify), reason::RECIPIENT_MISMATCH);
}

#[tokio::test]
async fn test_tampered_value_is_rejected() {
    let h = harness(
        ChainState::default(),
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let mut payload = client_payload(&h, &req).await;

    // Inflate the authorized value after signing.
    payload.payload["authorization"]["value"] = Value::String("1000001".into());

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    assert!(!verify.is_valid);
    assert_eq!(invalid_reason(&verify), reason::INVALID_SIGNATURE);
}

#[tokio::test]
async fn test_untyped_payload_resolves_by_probe() {
    let mut state = ChainState::default();
    state.eip3009_tokens.insert(usdc_sepolia());

    // Static flag off, probe says supported: the untyped payload verifies on
    // the EIP-3009 path.
    let h = harness(
        state,
        &networks_with_eip3009(false),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let now = unix_now();
    let key = PrivateKeySigner::random();

    let mut payload = manual_payload(
        &req,
        &key.address().to_string(),
        "1000000",
        (now - 30, now + 600),
        &[0u8; 65],
    );
    payload.payload.as_object_mut().unwrap().remove("type");

    let verify = h.facilitator.verify(&payload, &req).await.unwrap();
    // The garbage signature fails EOA recovery with the EIP-3009 reason,
    // proving the probe routed the untyped payload onto that path.
    assert!(!verify.is_valid);
    assert_eq!(invalid_reason(&verify), reason::INVALID_SIGNATURE);
}

#[tokio::test]
async fn test_settlement_revert_reports_transaction_failed() {
    let mut state = ChainState::default();
    state.settle_reverts = true;
    let h = harness(
        state,
        &networks_with_eip3009(true),
        ExactEvmConfig::default(),
    );
    let req = requirements("1000000");
    let payload = client_payload(&h, &req).await;

    let settle = h.facilitator.settle(&payload, &req).await.unwrap();
    assert!(!settle.success);
    assert_eq!(
        settle.error_reason.as_deref(),
        Some(reason::TRANSACTION_FAILED)
    );
    assert!(!settle.transaction.is_empty());
}
