//! Swap lifecycle tests over mock chains: the happy path and the recovery
//! paths, driven deterministically through the workers' public cycle hooks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use tokio::sync::{mpsc, watch};

use poolswap_chain::{ChainEvent, HtlcChain, HtlcState, MockChain};
use poolswap_core::types::{ContractId, TokenKey};
use poolswap_core::{
    ChainConfig, EventKind, FeeConfig, NodeConfig, PoolswapError, RateConfig, SwapState,
    TokenConfig,
};
use poolswap_liquidity::LiquidityManager;
use poolswap_resolver::{DestinationFunder, FundingDetector, ResolverCtx, TimeoutSweeper};
use poolswap_service::{CreateSwapRequest, FixedRates, QuoteRequest, SwapService};
use poolswap_store::Store;

const WAD: u64 = 1_000_000_000_000_000_000;
const CHAIN_X: u64 = 1;
const CHAIN_Y: u64 = 2;

fn token_a() -> Address {
    Address::repeat_byte(0xa0)
}

fn token_b() -> Address {
    Address::repeat_byte(0xb0)
}

fn user() -> Address {
    Address::repeat_byte(0x11)
}

fn config() -> NodeConfig {
    NodeConfig {
        chains: vec![
            ChainConfig {
                name: "chain-x".into(),
                chain_id: CHAIN_X,
                rpc_url: "mock".into(),
                htlc_contract: Address::repeat_byte(0x0a),
                relayer_contract: Address::repeat_byte(0x0b),
                confirmations: 1,
                poll_interval_secs: 1,
                emergency_threshold: U256::ZERO,
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
        fees: FeeConfig {
            exchange_fee_bps: 100,
            network_fee: U256::ZERO,
        },
        timelocks: Default::default(),
        relayer: Default::default(),
        resolver: Default::default(),
        quote_ttl_secs: 120,
    }
}

struct Harness {
    service: SwapService,
    liquidity: Arc<LiquidityManager>,
    store: Arc<Store>,
    chain_x: Arc<MockChain>,
    chain_y: Arc<MockChain>,
    detector: FundingDetector,
    funder: DestinationFunder,
    sweeper: TimeoutSweeper,
    _events_tx: mpsc::Sender<(u64, ChainEvent)>,
    _shutdown_tx: watch::Sender<bool>,
}

fn harness(name: &str) -> Harness {
    let dir = std::env::temp_dir().join(format!("poolswap_lifecycle_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    let store = Arc::new(Store::open(&dir).unwrap());
    let config = Arc::new(config());
    let liquidity = Arc::new(LiquidityManager::new(Arc::clone(&store)));
    liquidity
        .deposit(
            TokenKey::new(CHAIN_Y, token_b()),
            U256::from(100_000_000u64),
            U256::ZERO,
        )
        .unwrap();

    let chain_x = Arc::new(MockChain::new(CHAIN_X, Address::repeat_byte(0x0a)));
    let chain_y = Arc::new(MockChain::new(CHAIN_Y, Address::repeat_byte(0x0c)));
    let mut chains: HashMap<u64, Arc<dyn HtlcChain>> = HashMap::new();
    chains.insert(CHAIN_X, chain_x.clone() as Arc<dyn HtlcChain>);
    chains.insert(CHAIN_Y, chain_y.clone() as Arc<dyn HtlcChain>);

    let ctx = Arc::new(ResolverCtx::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&liquidity),
        chains,
    ));

    let (events_tx, events_rx) = mpsc::channel(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let prices = Arc::new(FixedRates::new(Arc::clone(&config)));
    let service = SwapService::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&liquidity),
        prices,
    );

    Harness {
        service,
        liquidity,
        store,
        chain_x,
        chain_y,
        detector: FundingDetector::new(Arc::clone(&ctx), events_rx, shutdown_rx.clone()),
        funder: DestinationFunder::new(Arc::clone(&ctx), Duration::from_millis(10), shutdown_rx.clone()),
        sweeper: TimeoutSweeper::new(ctx, Duration::from_millis(10), shutdown_rx),
        _events_tx: events_tx,
        _shutdown_tx: shutdown_tx,
    }
}

fn create_swap(h: &Harness) -> poolswap_core::Swap {
    let quote = h
        .service
        .get_quote(&QuoteRequest {
            source_chain: CHAIN_X,
            source_token: token_a(),
            amount: U256::from(10_000_000u64),
            target_chain: CHAIN_Y,
            target_token: token_b(),
            min_receive_amount: U256::ZERO,
        })
        .unwrap();
    h.service
        .create_swap(&CreateSwapRequest {
            user_address: user(),
            beneficiary_address: user(),
            quote,
        })
        .unwrap()
}

/// Feed a user-funded source HTLC through the detector.
fn fund_source(h: &Harness, swap: &poolswap_core::Swap) -> ContractId {
    let contract_id = ContractId::from_bytes([0x51; 32]);
    h.chain_x.user_fund(
        contract_id,
        user(),
        user(),
        token_a(),
        swap.source.amount,
        swap.hash_lock,
        swap.source_timelock,
    );
    h.detector
        .process_event(
            CHAIN_X,
            &ChainEvent::Funded {
                contract_id,
                originator: user(),
                beneficiary: user(),
                token: token_a(),
                value: swap.source.amount,
                hash_lock: swap.hash_lock,
                timelock: swap.source_timelock,
                block: 2,
            },
        )
        .unwrap();
    contract_id
}

#[tokio::test]
async fn happy_path_reaches_user_claimed_and_pool_cleanup() {
    let mut h = harness("happy");
    let swap = create_swap(&h);

    // After reserve: 100 total, 9.9 reserved, 90.1 available.
    let key = TokenKey::new(CHAIN_Y, token_b());
    let snap = h.liquidity.snapshot(&key).unwrap();
    assert_eq!(snap.reserved, U256::from(9_900_000u64));
    assert_eq!(snap.available, U256::from(90_100_000u64));

    let user_htlc = fund_source(&h, &swap);
    let locked = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(locked.state, SwapState::SourceLocked);
    assert_eq!(locked.user_htlc_id, Some(user_htlc));

    // W2 funds the destination and commits the reservation.
    h.funder.cycle().await.unwrap();
    let fulfilled = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(fulfilled.state, SwapState::PoolFulfilled);
    let pool_htlc = fulfilled.pool_htlc_id.unwrap();
    let details = h.chain_y.details(&pool_htlc).unwrap();
    assert_eq!(details.state, HtlcState::Open);
    assert_eq!(details.value, U256::from(9_900_000u64));
    assert_eq!(details.beneficiary, user());

    let snap = h.liquidity.snapshot(&key).unwrap();
    assert_eq!(snap.total, U256::from(90_100_000u64));
    assert_eq!(snap.reserved, U256::ZERO);
    assert_eq!(snap.available, U256::from(90_100_000u64));

    // The user's source claim reveals the preimage on chain X.
    let preimage = fulfilled.preimage.unwrap();
    h.chain_x.external_claim(user_htlc, user(), preimage);
    h.detector
        .process_event(
            CHAIN_X,
            &ChainEvent::Claimed {
                contract_id: user_htlc,
                claimer: user(),
                preimage,
                block: 5,
            },
        )
        .unwrap();
    let claimed = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(claimed.state, SwapState::UserClaimed);

    // W3 collects the pool's counterpart on the destination chain.
    let now = chrono::Utc::now().timestamp();
    h.sweeper.cycle(now).await.unwrap();
    let done = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert!(done.pool_claimed_at.is_some());
    assert_eq!(h.chain_y.details(&pool_htlc).unwrap().state, HtlcState::Claimed);

    // Timeline order is the ordering oracle.
    let kinds: Vec<EventKind> = h
        .store
        .list_events(&swap.id, None)
        .unwrap()
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::SwapCreated,
            EventKind::SourceHtlcCreated,
            EventKind::DestinationHtlcCreated,
            EventKind::UserClaimed,
            EventKind::PoolClaimed,
        ]
    );

    // Timestamps are monotone along the lifecycle.
    assert!(done.source_funded_at <= done.destination_funded_at);
    assert!(done.destination_funded_at <= done.user_claimed_at);
}

#[tokio::test]
async fn unfunded_swap_expires_and_releases_reservation() {
    let h = harness("expire_unfunded");
    let swap = create_swap(&h);
    let key = TokenKey::new(CHAIN_Y, token_b());

    // Nothing happens before the deadline.
    h.sweeper.cycle(swap.expires_at - 1).await.unwrap();
    assert_eq!(
        h.store.get_swap(&swap.id).unwrap().unwrap().state,
        SwapState::Pending
    );

    h.sweeper.cycle(swap.expires_at + 1).await.unwrap();
    let expired = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(expired.state, SwapState::Expired);

    let snap = h.liquidity.snapshot(&key).unwrap();
    assert_eq!(snap.available, U256::from(100_000_000u64));
    assert_eq!(snap.reserved, U256::ZERO);

    // No chain action was performed.
    assert!(h.chain_y.latest_block().await.unwrap() <= 1);
}

#[tokio::test]
async fn source_locked_expires_after_source_timelock() {
    let h = harness("expire_locked");
    let swap = create_swap(&h);
    fund_source(&h, &swap);

    h.sweeper.cycle(swap.source_timelock + 1).await.unwrap();
    let expired = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(expired.state, SwapState::Expired);

    let snap = h
        .liquidity
        .snapshot(&TokenKey::new(CHAIN_Y, token_b()))
        .unwrap();
    assert_eq!(snap.available, U256::from(100_000_000u64));
}

#[tokio::test]
async fn abandoned_fulfillment_is_refunded_to_the_pool() {
    let mut h = harness("abandoned");
    let swap = create_swap(&h);
    fund_source(&h, &swap);
    h.funder.cycle().await.unwrap();

    let fulfilled = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(fulfilled.state, SwapState::PoolFulfilled);
    let pool_htlc = fulfilled.pool_htlc_id.unwrap();

    // Past the destination timelock the mock contract allows the refund.
    h.chain_y.set_now(swap.destination_timelock + 1);
    h.sweeper.cycle(swap.destination_timelock + 1).await.unwrap();

    let failed = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(failed.state, SwapState::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("user_did_not_claim"));
    assert_eq!(h.chain_y.details(&pool_htlc).unwrap().state, HtlcState::Refunded);

    // refund_in restored both total and available.
    let snap = h
        .liquidity
        .snapshot(&TokenKey::new(CHAIN_Y, token_b()))
        .unwrap();
    assert_eq!(snap.total, U256::from(100_000_000u64));
    assert_eq!(snap.available, U256::from(100_000_000u64));
    assert_eq!(snap.reserved, U256::ZERO);
}

#[tokio::test]
async fn non_retryable_funding_revert_fails_the_swap() {
    let mut h = harness("fund_revert");
    let swap = create_swap(&h);
    fund_source(&h, &swap);

    h.chain_y.script_fund_failure(PoolswapError::ChainReverted(
        "execution reverted: beneficiary is zero".into(),
    ));
    h.funder.cycle().await.unwrap();

    let failed = h.store.get_swap(&swap.id).unwrap().unwrap();
    assert_eq!(failed.state, SwapState::Failed);
    assert!(failed.error_message.unwrap().contains("destination_reverted"));

    let snap = h
        .liquidity
        .snapshot(&TokenKey::new(CHAIN_Y, token_b()))
        .unwrap();
    assert_eq!(snap.available, U256::from(100_000_000u64));
    assert_eq!(snap.reserved, U256::ZERO);
}

#[tokio::test]
async fn transient_funding_failure_retries_next_cycle() {
    let mut h = harness("fund_retry");
    let swap = create_swap(&h);
    fund_source(&h, &swap);

    h.chain_y
        .script_fund_failure(PoolswapError::ChainTransient("rpc timeout".into()));

    h.funder.cycle().await.unwrap();
    assert_eq!(
        h.store.get_swap(&swap.id).unwrap().unwrap().state,
        SwapState::SourceLocked,
        "transient failure leaves the swap leased for retry"
    );

    h.funder.cycle().await.unwrap();
    assert_eq!(
        h.store.get_swap(&swap.id).unwrap().unwrap().state,
        SwapState::PoolFulfilled
    );
}

#[tokio::test]
async fn unknown_hash_lock_is_ignored() {
    let h = harness("unknown_lock");
    let _swap = create_swap(&h);

    h.detector
        .process_event(
            CHAIN_X,
            &ChainEvent::Funded {
                contract_id: ContractId::from_bytes([0x99; 32]),
                originator: user(),
                beneficiary: user(),
                token: token_a(),
                value: U256::from(1u64),
                hash_lock: poolswap_core::types::HashLock::from_bytes([0x99; 32]),
                timelock: chrono::Utc::now().timestamp() + 10_000,
                block: 2,
            },
        )
        .unwrap();

    let swaps = h.store.list_swaps(None, None, None).unwrap();
    assert!(swaps.iter().all(|s| s.state == SwapState::Pending));
}
