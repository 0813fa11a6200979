//! Relayer ingress and execution tests over a mock source chain.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};

use poolswap_chain::{HtlcChain, HtlcState, MockChain};
use poolswap_core::types::{ClaimId, ContractId, SwapId, TokenKey};
use poolswap_core::{
    ChainConfig, ClaimRequest, ClaimStatus, EventKind, FeeConfig, NodeConfig, PoolswapError,
    RateConfig, SourceLeg, Swap, SwapFees, SwapState, TargetLeg, TokenConfig,
};
use poolswap_crypto::{claim_digest, generate_secret, HotWallet};
use poolswap_relayer::{ClaimPayload, Relayer};
use poolswap_store::Store;

const CHAIN_X: u64 = 1;
const CHAIN_Y: u64 = 2;
const WAD: u64 = 1_000_000_000_000_000_000;

fn token_a() -> Address {
    Address::repeat_byte(0xa0)
}

fn token_b() -> Address {
    Address::repeat_byte(0xb0)
}

fn htlc_x() -> Address {
    Address::repeat_byte(0x0a)
}

fn config(emergency_threshold: U256) -> NodeConfig {
    NodeConfig {
        chains: vec![
            ChainConfig {
                name: "chain-x".into(),
                chain_id: CHAIN_X,
                rpc_url: "mock".into(),
                htlc_contract: htlc_x(),
                relayer_contract: Address::repeat_byte(0x0b),
                confirmations: 1,
                poll_interval_secs: 1,
                emergency_threshold,
            },
            ChainConfig {
                name: "chain-y".into(),
                chain_id: CHAIN_Y,
                rpc_url: "mock".into(),
                htlc_contract: Address::repeat_byte(0x0c),
                relayer_contract: Address::repeat_byte(0x0d),
                confirmations: 1,
                poll_interval_secs: 1,
                emergency_threshold: U256::ZERO,
            },
        ],
        tokens: vec![
            TokenConfig {
                chain_id: CHAIN_X,
                token: token_a(),
                symbol: "TKA".into(),
                decimals: 6,
                initial_liquidity: U256::ZERO,
                min_threshold: U256::ZERO,
                enabled: true,
            },
            TokenConfig {
                chain_id: CHAIN_Y,
                token: token_b(),
                symbol: "TKB".into(),
                decimals: 6,
                initial_liquidity: U256::ZERO,
                min_threshold: U256::ZERO,
                enabled: true,
            },
        ],
        rates: vec![RateConfig {
            from_chain: CHAIN_X,
            from_token: token_a(),
            to_chain: CHAIN_Y,
            to_token: token_b(),
            rate_wad: U256::from(WAD),
        }],
        fees: FeeConfig { exchange_fee_bps: 100, network_fee: U256::ZERO },
        timelocks: Default::default(),
        relayer: Default::default(),
        resolver: Default::default(),
        quote_ttl_secs: 120,
    }
}

struct Harness {
    relayer: Arc<Relayer>,
    store: Arc<Store>,
    chain_x: Arc<MockChain>,
    user: HotWallet,
}

fn harness(name: &str, emergency_threshold: U256) -> Harness {
    let dir = std::env::temp_dir().join(format!("poolswap_relayer_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    let store = Arc::new(Store::open(&dir).unwrap());
    let config = Arc::new(config(emergency_threshold));

    let chain_x = Arc::new(MockChain::new(CHAIN_X, htlc_x()));
    let chain_y = Arc::new(MockChain::new(CHAIN_Y, Address::repeat_byte(0x0c)));
    let mut chains: HashMap<u64, Arc<dyn HtlcChain>> = HashMap::new();
    chains.insert(CHAIN_X, chain_x.clone() as Arc<dyn HtlcChain>);
    chains.insert(CHAIN_Y, chain_y as Arc<dyn HtlcChain>);

    Harness {
        relayer: Arc::new(Relayer::new(config, Arc::clone(&store), chains)),
        store,
        chain_x,
        user: HotWallet::random(),
    }
}

/// Seed a POOL_FULFILLED swap with its source HTLC open on the mock chain.
fn seed_fulfilled_swap(h: &Harness, tag: u8) -> Swap {
    let now = chrono::Utc::now().timestamp();
    let (preimage, hash_lock) = generate_secret();
    let user_htlc = ContractId::from_bytes([tag; 32]);

    h.chain_x.user_fund(
        user_htlc,
        h.user.address(),
        h.user.address(),
        token_a(),
        U256::from(10_000_000u64),
        hash_lock,
        now + 7200,
    );

    let swap = Swap {
        id: SwapId::generate(),
        user_address: h.user.address(),
        beneficiary_address: h.user.address(),
        source: SourceLeg { chain_id: CHAIN_X, token: token_a(), amount: U256::from(10_000_000u64) },
        target: TargetLeg {
            chain_id: CHAIN_Y,
            token: token_b(),
            expected_amount: U256::from(9_900_000u64),
            min_receive_amount: U256::ZERO,
        },
        hash_lock,
        preimage: Some(preimage),
        user_htlc_id: Some(user_htlc),
        pool_htlc_id: Some(ContractId::from_bytes([tag.wrapping_add(1); 32])),
        state: SwapState::PoolFulfilled,
        source_funded_at: Some(now - 60),
        destination_funded_at: Some(now - 30),
        user_claimed_at: None,
        pool_claimed_at: None,
        refunded_at: None,
        source_timelock: now + 7200,
        destination_timelock: now + 5400,
        created_at: now - 120,
        expires_at: now + 3480,
        fees: SwapFees::default(),
        error_message: None,
        version: 0,
    };
    h.store.insert_swap(&swap).unwrap();
    swap
}

fn signed_payload(h: &Harness, swap: &Swap, nonce: u64) -> ClaimPayload {
    let now = chrono::Utc::now().timestamp();
    let request = ClaimRequest {
        id: ClaimId::generate(),
        swap_id: swap.id,
        htlc_contract: htlc_x(),
        contract_id: swap.user_htlc_id.unwrap(),
        preimage: swap.preimage.unwrap(),
        claimer: h.user.address(),
        max_gas_price: U256::from(100_000_000_000u64),
        gas_compensation: U256::from(1_000u64),
        nonce,
        deadline: now + 3600,
        signature: vec![],
        status: ClaimStatus::Pending,
        tx_hash: None,
        gas_used: None,
        gas_price: None,
        error_message: None,
        created_at: now,
        version: 0,
    };
    let digest = claim_digest(&request, CHAIN_X, Address::repeat_byte(0x0b));
    let signature = h.user.sign_digest(&digest).unwrap();

    ClaimPayload {
        swap_id: swap.id,
        htlc_contract: htlc_x(),
        contract_id: swap.user_htlc_id.unwrap(),
        preimage: swap.preimage.unwrap(),
        claimer: h.user.address(),
        max_gas_price: request.max_gas_price,
        gas_compensation: request.gas_compensation,
        nonce,
        deadline: request.deadline,
        signature,
    }
}

#[tokio::test]
async fn accepted_claim_executes_and_reveals_preimage() {
    let h = harness("execute", U256::ZERO);
    let swap = seed_fulfilled_swap(&h, 0x10);

    let accepted = h.relayer.submit_claim(signed_payload(&h, &swap, 0)).unwrap();
    assert_eq!(accepted.status, ClaimStatus::Pending);

    let now = chrono::Utc::now().timestamp();
    h.relayer.cycle(now).await.unwrap();

    let claim = h.store.get_claim(&accepted.id).unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Completed);
    assert!(claim.tx_hash.is_some());
    assert!(claim.gas_used.is_some());

    let updated = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(updated.state, SwapState::UserClaimed);
    assert!(updated.user_claimed_at.is_some());

    // On-chain: the source HTLC is claimed, its preimage public.
    let details = h.chain_x.details(&swap.user_htlc_id.unwrap()).unwrap();
    assert_eq!(details.state, HtlcState::Claimed);

    let kinds: Vec<EventKind> = h
        .store
        .list_events(&swap.id, None)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&EventKind::UserClaimed));
}

#[tokio::test]
async fn replayed_payload_is_rejected_without_second_transaction() {
    let h = harness("replay", U256::ZERO);
    let swap = seed_fulfilled_swap(&h, 0x20);

    let payload = signed_payload(&h, &swap, 0);
    h.relayer.submit_claim(payload.clone()).unwrap();
    h.relayer.cycle(chrono::Utc::now().timestamp()).await.unwrap();

    let err = h.relayer.submit_claim(payload).unwrap_err();
    assert!(err.to_string().contains("nonce_reused"), "got: {err}");

    // Exactly one claim row, one completed execution.
    assert_eq!(
        h.store.list_claims_by_status(ClaimStatus::Completed).unwrap().len(),
        1
    );
    assert!(h.store.list_claims_by_status(ClaimStatus::Pending).unwrap().is_empty());
}

#[tokio::test]
async fn tampered_gas_compensation_invalidates_signature() {
    let h = harness("tamper", U256::ZERO);
    let swap = seed_fulfilled_swap(&h, 0x30);

    let mut payload = signed_payload(&h, &swap, 0);
    payload.gas_compensation = U256::from(999_999u64);
    let err = h.relayer.submit_claim(payload).unwrap_err();
    assert!(matches!(err, PoolswapError::Validation(_)));
    assert!(err.to_string().contains("signer mismatch"));
}

#[tokio::test]
async fn foreign_signer_is_rejected() {
    let h = harness("foreign", U256::ZERO);
    let swap = seed_fulfilled_swap(&h, 0x40);

    // A different wallet signs an otherwise perfect payload.
    let attacker = HotWallet::random();
    let mut payload = signed_payload(&h, &swap, 0);
    let request = ClaimRequest {
        id: ClaimId::generate(),
        swap_id: payload.swap_id,
        htlc_contract: payload.htlc_contract,
        contract_id: payload.contract_id,
        preimage: payload.preimage,
        claimer: payload.claimer,
        max_gas_price: payload.max_gas_price,
        gas_compensation: payload.gas_compensation,
        nonce: payload.nonce,
        deadline: payload.deadline,
        signature: vec![],
        status: ClaimStatus::Pending,
        tx_hash: None,
        gas_used: None,
        gas_price: None,
        error_message: None,
        created_at: 0,
        version: 0,
    };
    let digest = claim_digest(&request, CHAIN_X, Address::repeat_byte(0x0b));
    payload.signature = attacker.sign_digest(&digest).unwrap();

    let err = h.relayer.submit_claim(payload).unwrap_err();
    assert!(err.to_string().contains("signer mismatch"));
}

#[tokio::test]
async fn stale_deadline_is_rejected() {
    let h = harness("deadline", U256::ZERO);
    let swap = seed_fulfilled_swap(&h, 0x50);

    let mut payload = signed_payload(&h, &swap, 0);
    payload.deadline = chrono::Utc::now().timestamp() + 5; // inside the margin
    // Deadline is part of the signed message, so re-sign.
    let request = ClaimRequest {
        id: ClaimId::generate(),
        swap_id: payload.swap_id,
        htlc_contract: payload.htlc_contract,
        contract_id: payload.contract_id,
        preimage: payload.preimage,
        claimer: payload.claimer,
        max_gas_price: payload.max_gas_price,
        gas_compensation: payload.gas_compensation,
        nonce: payload.nonce,
        deadline: payload.deadline,
        signature: vec![],
        status: ClaimStatus::Pending,
        tx_hash: None,
        gas_used: None,
        gas_price: None,
        error_message: None,
        created_at: 0,
        version: 0,
    };
    let digest = claim_digest(&request, CHAIN_X, Address::repeat_byte(0x0b));
    payload.signature = h.user.sign_digest(&digest).unwrap();

    let err = h.relayer.submit_claim(payload).unwrap_err();
    assert!(err.to_string().contains("deadline"));
}

#[tokio::test]
async fn high_gas_price_parks_instead_of_failing() {
    let h = harness("parked", U256::ZERO);
    let swap = seed_fulfilled_swap(&h, 0x60);

    let mut payload = signed_payload(&h, &swap, 0);
    payload.max_gas_price = U256::from(1u64); // below the mock's 50 gwei
    // max_gas_price is signed; re-sign.
    let request = ClaimRequest {
        id: ClaimId::generate(),
        swap_id: payload.swap_id,
        htlc_contract: payload.htlc_contract,
        contract_id: payload.contract_id,
        preimage: payload.preimage,
        claimer: payload.claimer,
        max_gas_price: payload.max_gas_price,
        gas_compensation: payload.gas_compensation,
        nonce: payload.nonce,
        deadline: payload.deadline,
        signature: vec![],
        status: ClaimStatus::Pending,
        tx_hash: None,
        gas_used: None,
        gas_price: None,
        error_message: None,
        created_at: 0,
        version: 0,
    };
    let digest = claim_digest(&request, CHAIN_X, Address::repeat_byte(0x0b));
    payload.signature = h.user.sign_digest(&digest).unwrap();

    let accepted = h.relayer.submit_claim(payload).unwrap();
    h.relayer.cycle(chrono::Utc::now().timestamp()).await.unwrap();

    // Parked, not failed; it will be retried next cycle.
    let claim = h.store.get_claim(&accepted.id).unwrap().unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(
        h.chain_x.details(&swap.user_htlc_id.unwrap()).unwrap().state,
        HtlcState::Open
    );
}

#[tokio::test]
async fn balance_collapse_triggers_emergency_stop_and_resume_continues() {
    // Threshold of 1 ETH on the source chain.
    let h = harness("emergency", U256::from(10u64).pow(U256::from(18u64)));
    let swap_a = seed_fulfilled_swap(&h, 0x70);
    let swap_b = seed_fulfilled_swap(&h, 0x80);

    // Claim A goes through while the balance is healthy.
    let claim_a = h.relayer.submit_claim(signed_payload(&h, &swap_a, 0)).unwrap();
    h.relayer.cycle(chrono::Utc::now().timestamp()).await.unwrap();
    assert_eq!(
        h.store.get_claim(&claim_a.id).unwrap().unwrap().status,
        ClaimStatus::Completed
    );

    let claim_b = h.relayer.submit_claim(signed_payload(&h, &swap_b, 1)).unwrap();

    // Balance collapses below the threshold; claim B must stay pending.
    let relayer_wallet = h.chain_x.wallet_address();
    h.chain_x.set_balance(relayer_wallet, U256::from(1u64));
    h.relayer.cycle(chrono::Utc::now().timestamp()).await.unwrap();

    assert!(h.relayer.is_paused());
    assert_eq!(
        h.store.get_claim(&claim_b.id).unwrap().unwrap().status,
        ClaimStatus::Pending
    );
    let kinds: Vec<EventKind> = h
        .store
        .list_events(&swap_b.id, None)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&EventKind::EmergencyStop));

    // While paused, cycles do nothing.
    h.relayer.cycle(chrono::Utc::now().timestamp()).await.unwrap();
    assert_eq!(
        h.store.get_claim(&claim_b.id).unwrap().unwrap().status,
        ClaimStatus::Pending
    );

    // Refill, resume: processing continues from the same queue.
    h.chain_x.set_balance(relayer_wallet, U256::from(10u64).pow(U256::from(19u64)));
    h.relayer.resume();
    h.relayer.cycle(chrono::Utc::now().timestamp()).await.unwrap();
    assert_eq!(
        h.store.get_claim(&claim_b.id).unwrap().unwrap().status,
        ClaimStatus::Completed
    );
}

#[tokio::test]
async fn claim_for_unfulfilled_swap_is_rejected() {
    let h = harness("unfulfilled", U256::ZERO);
    let mut swap = seed_fulfilled_swap(&h, 0x90);

    // Rewind the stored swap to SOURCE_LOCKED.
    let mut stored = h.store.get_swap(&swap.id).unwrap().unwrap();
    stored.state = SwapState::SourceLocked;
    h.store.update_swap(&stored).unwrap();
    swap.state = SwapState::SourceLocked;

    let err = h.relayer.submit_claim(signed_payload(&h, &swap, 0)).unwrap_err();
    assert!(err.to_string().contains("not claimable"));
}
