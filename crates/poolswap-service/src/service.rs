use std::sync::Arc;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use poolswap_core::constants::BPS_DENOMINATOR;
use poolswap_core::types::{Address, Amount, ChainId, SwapId, Timestamp, TokenKey};
use poolswap_core::{
    EventKind, NodeConfig, PoolswapError, SourceLeg, Swap, SwapEvent, SwapFees, SwapState,
    TargetLeg, TokenHealth,
};
use poolswap_crypto::{generate_secret, verify_preimage};
use poolswap_liquidity::LiquidityManager;
use poolswap_store::Store;

use crate::price::PriceSource;

const WAD: u64 = 1_000_000_000_000_000_000;

// ── Requests / responses ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub source_chain: ChainId,
    pub source_token: Address,
    pub amount: Amount,
    pub target_chain: ChainId,
    pub target_token: Address,
    /// Floor for the net target amount; zero means "no floor".
    #[serde(default)]
    pub min_receive_amount: Amount,
}

/// A priced offer, valid until `expires_at`. Holds no reservation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    pub source_chain: ChainId,
    pub source_token: Address,
    pub amount: Amount,
    pub target_chain: ChainId,
    pub target_token: Address,
    /// Net amount the pool will lock on the destination chain.
    pub expected_amount: Amount,
    pub min_receive_amount: Amount,
    pub network_fee: Amount,
    pub exchange_fee: Amount,
    pub rate_wad: U256,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSwapRequest {
    pub user_address: Address,
    pub beneficiary_address: Address,
    pub quote: Quote,
}

// ── SwapService ──────────────────────────────────────────────────────────────

/// Facade over store, liquidity and pricing for external callers.
pub struct SwapService {
    config: Arc<NodeConfig>,
    store: Arc<Store>,
    liquidity: Arc<LiquidityManager>,
    prices: Arc<dyn PriceSource>,
}

impl SwapService {
    pub fn new(
        config: Arc<NodeConfig>,
        store: Arc<Store>,
        liquidity: Arc<LiquidityManager>,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        Self { config, store, liquidity, prices }
    }

    /// Price a swap. Reads liquidity but reserves nothing.
    pub fn get_quote(&self, req: &QuoteRequest) -> Result<Quote, PoolswapError> {
        if req.amount.is_zero() {
            return Err(PoolswapError::Validation("amount must be positive".into()));
        }
        let source_key = TokenKey::new(req.source_chain, req.source_token);
        let target_key = TokenKey::new(req.target_chain, req.target_token);
        self.require_supported(&source_key)?;
        self.require_supported(&target_key)?;

        let rate_wad = self.prices.rate_wad(&source_key, &target_key)?;
        let gross = req.amount * rate_wad / U256::from(WAD);
        let exchange_fee =
            gross * U256::from(self.config.fees.exchange_fee_bps) / U256::from(BPS_DENOMINATOR);
        let network_fee = self.config.fees.network_fee;
        let expected = gross
            .checked_sub(exchange_fee)
            .and_then(|v| v.checked_sub(network_fee))
            .filter(|v| !v.is_zero())
            .ok_or_else(|| {
                PoolswapError::Validation("amount too small to cover fees".into())
            })?;
        if expected < req.min_receive_amount {
            return Err(PoolswapError::Validation(format!(
                "quote output {expected} below requested minimum {}",
                req.min_receive_amount
            )));
        }

        // The pool must plausibly honor this quote right now.
        let snap = self.liquidity.snapshot(&target_key)?;
        if snap.health == TokenHealth::Unhealthy {
            return Err(PoolswapError::UnhealthyLiquidity { token: target_key });
        }
        if snap.available < expected {
            return Err(PoolswapError::InsufficientLiquidity {
                token: target_key,
                requested: expected,
                available: snap.available,
            });
        }

        let now = now();
        Ok(Quote {
            source_chain: req.source_chain,
            source_token: req.source_token,
            amount: req.amount,
            target_chain: req.target_chain,
            target_token: req.target_token,
            expected_amount: expected,
            min_receive_amount: req.min_receive_amount,
            network_fee,
            exchange_fee,
            rate_wad,
            created_at: now,
            expires_at: now + self.config.quote_ttl_secs,
        })
    }

    /// Turn a fresh quote into a PENDING swap: reserve target liquidity,
    /// generate the secret, persist, append `swap_created`.
    pub fn create_swap(&self, req: &CreateSwapRequest) -> Result<Swap, PoolswapError> {
        let quote = &req.quote;
        let now = now();
        if now >= quote.expires_at {
            return Err(PoolswapError::QuoteExpired);
        }
        if req.user_address == Address::ZERO || req.beneficiary_address == Address::ZERO {
            return Err(PoolswapError::Validation("zero address".into()));
        }
        if quote.expected_amount < quote.min_receive_amount {
            return Err(PoolswapError::Validation(
                "quote output below its own minimum".into(),
            ));
        }
        let target_key = TokenKey::new(quote.target_chain, quote.target_token);
        self.require_supported(&TokenKey::new(quote.source_chain, quote.source_token))?;
        self.require_supported(&target_key)?;

        let tl = &self.config.timelocks;
        let source_timelock = now + tl.source_timelock_secs;
        let destination_timelock = now + tl.destination_timelock_secs;
        if destination_timelock + tl.safety_window_secs > source_timelock {
            return Err(PoolswapError::TimelockWindowTooShort {
                destination: destination_timelock,
                source_timelock,
                safety_window: tl.safety_window_secs,
            });
        }

        self.liquidity.reserve(target_key, quote.expected_amount)?;

        let (preimage, hash_lock) = generate_secret();
        debug_assert!(verify_preimage(&preimage, &hash_lock));

        let swap = Swap {
            id: SwapId::generate(),
            user_address: req.user_address,
            beneficiary_address: req.beneficiary_address,
            source: SourceLeg {
                chain_id: quote.source_chain,
                token: quote.source_token,
                amount: quote.amount,
            },
            target: TargetLeg {
                chain_id: quote.target_chain,
                token: quote.target_token,
                expected_amount: quote.expected_amount,
                min_receive_amount: quote.min_receive_amount,
            },
            hash_lock,
            preimage: Some(preimage),
            user_htlc_id: None,
            pool_htlc_id: None,
            state: SwapState::Pending,
            source_funded_at: None,
            destination_funded_at: None,
            user_claimed_at: None,
            pool_claimed_at: None,
            refunded_at: None,
            source_timelock,
            destination_timelock,
            created_at: now,
            expires_at: now + tl.funding_ttl_secs,
            fees: SwapFees {
                network_fee: quote.network_fee,
                exchange_fee: quote.exchange_fee,
            },
            error_message: None,
            version: 0,
        };

        if let Err(e) = self.store.insert_swap(&swap) {
            // Creation failed after the reserve; hand the funds back.
            self.liquidity.release(target_key, quote.expected_amount)?;
            return Err(e);
        }
        self.store.append_event(
            swap.id,
            EventKind::SwapCreated,
            json!({
                "user": format!("{}", swap.user_address),
                "source_chain": swap.source.chain_id,
                "target_chain": swap.target.chain_id,
                "amount": swap.source.amount.to_string(),
                "expected_amount": swap.target.expected_amount.to_string(),
                "hash_lock": swap.hash_lock.to_hex(),
                "expires_at": swap.expires_at,
            }),
            now,
        )?;

        info!(swap = %swap.id, user = %swap.user_address, "swap created");
        Ok(swap)
    }

    pub fn get_swap(&self, id: &SwapId) -> Result<Option<Swap>, PoolswapError> {
        self.store.get_swap(id)
    }

    pub fn list_swaps(
        &self,
        state: Option<SwapState>,
        user_address: Option<Address>,
        chain_id: Option<ChainId>,
    ) -> Result<Vec<Swap>, PoolswapError> {
        self.store.list_swaps(state, user_address, chain_id)
    }

    pub fn list_events(
        &self,
        id: &SwapId,
        after: Option<u64>,
    ) -> Result<Vec<SwapEvent>, PoolswapError> {
        self.store.list_events(id, after)
    }

    fn require_supported(&self, key: &TokenKey) -> Result<(), PoolswapError> {
        match self.config.token(key) {
            Some(token) if token.enabled => Ok(()),
            Some(_) => Err(PoolswapError::Validation(format!(
                "token {key} is disabled"
            ))),
            None => Err(PoolswapError::Validation(format!(
                "unsupported token {key}"
            ))),
        }
    }
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::FixedRates;
    use poolswap_core::{ChainConfig, FeeConfig, RateConfig, TokenConfig};

    fn config() -> NodeConfig {
        let source_token = Address::repeat_byte(0xa0);
        let target_token = Address::repeat_byte(0xb0);
        NodeConfig {
            chains: vec![
                ChainConfig {
                    name: "chain-x".into(),
                    chain_id: 1,
                    rpc_url: "http://127.0.0.1:1".into(),
                    htlc_contract: Address::repeat_byte(0x0a),
                    relayer_contract: Address::repeat_byte(0x0b),
                    confirmations: 1,
                    poll_interval_secs: 1,
                    emergency_threshold: U256::ZERO,
                },
                ChainConfig {
                    name: "chain-y".into(),
                    chain_id: 2,
                    rpc_url: "http://127.0.0.1:2".into(),
                    htlc_contract: Address::repeat_byte(0x0c),
                    relayer_contract: Address::repeat_byte(0x0d),
                    confirmations: 1,
                    poll_interval_secs: 1,
                    emergency_threshold: U256::ZERO,
                },
            ],
            tokens: vec![
                TokenConfig {
                    chain_id: 1,
                    token: source_token,
                    symbol: "TKA".into(),
                    decimals: 6,
                    initial_liquidity: U256::ZERO,
                    min_threshold: U256::ZERO,
                    enabled: true,
                },
                TokenConfig {
                    chain_id: 2,
                    token: target_token,
                    symbol: "TKB".into(),
                    decimals: 6,
                    initial_liquidity: U256::ZERO,
                    min_threshold: U256::ZERO,
                    enabled: true,
                },
            ],
            rates: vec![RateConfig {
                from_chain: 1,
                from_token: source_token,
                to_chain: 2,
                to_token: target_token,
                rate_wad: U256::from(WAD), // 1:1
            }],
            fees: FeeConfig {
                exchange_fee_bps: 100, // 1%
                network_fee: U256::ZERO,
            },
            timelocks: Default::default(),
            relayer: Default::default(),
            resolver: Default::default(),
            quote_ttl_secs: 120,
        }
    }

    fn service(name: &str) -> (SwapService, Arc<LiquidityManager>) {
        let dir = std::env::temp_dir().join(format!("poolswap_service_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        let store = Arc::new(Store::open(&dir).unwrap());
        let config = Arc::new(config());
        let liquidity = Arc::new(LiquidityManager::new(Arc::clone(&store)));
        liquidity
            .deposit(
                TokenKey::new(2, Address::repeat_byte(0xb0)),
                U256::from(100_000_000u64), // 100 units at 6 decimals
                U256::ZERO,
            )
            .unwrap();
        let prices = Arc::new(FixedRates::new(Arc::clone(&config)));
        (
            SwapService::new(config, store, Arc::clone(&liquidity), prices),
            liquidity,
        )
    }

    fn quote_request(amount: u64) -> QuoteRequest {
        QuoteRequest {
            source_chain: 1,
            source_token: Address::repeat_byte(0xa0),
            amount: U256::from(amount),
            target_chain: 2,
            target_token: Address::repeat_byte(0xb0),
            min_receive_amount: U256::ZERO,
        }
    }

    #[test]
    fn quote_applies_one_percent_fee() {
        let (svc, _) = service("quote_fee");
        // 10 units of token A at 6 decimals, 1:1 rate, 1% fee → 9.9 units.
        let quote = svc.get_quote(&quote_request(10_000_000)).unwrap();
        assert_eq!(quote.expected_amount, U256::from(9_900_000u64));
        assert_eq!(quote.exchange_fee, U256::from(100_000u64));
        assert!(quote.expires_at > quote.created_at);
    }

    #[test]
    fn quote_enforces_min_receive() {
        let (svc, _) = service("quote_min");
        let mut req = quote_request(10_000_000);
        req.min_receive_amount = U256::from(9_950_000u64);
        assert!(matches!(
            svc.get_quote(&req),
            Err(PoolswapError::Validation(_))
        ));
    }

    #[test]
    fn quote_rejects_unsupported_token() {
        let (svc, _) = service("quote_unsupported");
        let mut req = quote_request(1_000_000);
        req.target_token = Address::repeat_byte(0xee);
        assert!(matches!(
            svc.get_quote(&req),
            Err(PoolswapError::Validation(_))
        ));
    }

    #[test]
    fn quote_refuses_more_than_available() {
        let (svc, _) = service("quote_depth");
        // Pool holds 100 units; ask to receive ~198.
        let err = svc.get_quote(&quote_request(200_000_000)).unwrap_err();
        assert!(matches!(err, PoolswapError::InsufficientLiquidity { .. }));
    }

    #[test]
    fn create_swap_reserves_and_persists() {
        let (svc, liquidity) = service("create");
        let quote = svc.get_quote(&quote_request(10_000_000)).unwrap();
        let swap = svc
            .create_swap(&CreateSwapRequest {
                user_address: Address::repeat_byte(0x11),
                beneficiary_address: Address::repeat_byte(0x11),
                quote,
            })
            .unwrap();

        assert_eq!(swap.state, SwapState::Pending);
        assert!(swap.preimage.is_some());
        assert!(verify_preimage(&swap.preimage.unwrap(), &swap.hash_lock));
        assert!(swap.destination_timelock + 1800 <= swap.source_timelock);

        // Scenario: 100 total, 9.9 reserved, 90.1 available.
        let snap = liquidity
            .snapshot(&TokenKey::new(2, Address::repeat_byte(0xb0)))
            .unwrap();
        assert_eq!(snap.total, U256::from(100_000_000u64));
        assert_eq!(snap.reserved, U256::from(9_900_000u64));
        assert_eq!(snap.available, U256::from(90_100_000u64));

        let events = svc.list_events(&swap.id, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SwapCreated);

        let loaded = svc.get_swap(&swap.id).unwrap().unwrap();
        assert_eq!(loaded.hash_lock, swap.hash_lock);
    }

    #[test]
    fn create_swap_rejects_stale_quote() {
        let (svc, liquidity) = service("stale_quote");
        let mut quote = svc.get_quote(&quote_request(10_000_000)).unwrap();
        quote.expires_at = now() - 1;
        let err = svc
            .create_swap(&CreateSwapRequest {
                user_address: Address::repeat_byte(0x11),
                beneficiary_address: Address::repeat_byte(0x11),
                quote,
            })
            .unwrap_err();
        assert!(matches!(err, PoolswapError::QuoteExpired));

        // Nothing reserved.
        let snap = liquidity
            .snapshot(&TokenKey::new(2, Address::repeat_byte(0xb0)))
            .unwrap();
        assert_eq!(snap.reserved, U256::ZERO);
    }
}
