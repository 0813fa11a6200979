use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use alloy_primitives::U256;
use async_trait::async_trait;

use poolswap_core::types::{
    Address, Amount, ChainId, ContractId, HashLock, Preimage, Timestamp, TxHash,
};
use poolswap_core::PoolswapError;
use poolswap_crypto::{keccak256_bytes, verify_preimage, HotWallet};

use crate::adapter::{ChainEvent, FundRequest, HtlcChain, TxOutcome};
use crate::htlc::{HtlcDetails, HtlcState};

/// In-memory chain with a real HTLC state machine: enforces the same
/// open/claim/refund rules as the contract, logs the same events, and lets
/// tests script failures. Also backs the `--mock-chains` dev node.
pub struct MockChain {
    chain_id: ChainId,
    htlc: Address,
    wallet: Address,
    inner: Mutex<Inner>,
}

struct Inner {
    block: u64,
    now: Timestamp,
    htlcs: HashMap<[u8; 32], HtlcDetails>,
    events: Vec<ChainEvent>,
    balances: HashMap<Address, U256>,
    gas_price: U256,
    scripted_fund_failures: VecDeque<PoolswapError>,
    tx_counter: u64,
}

impl MockChain {
    pub fn new(chain_id: ChainId, htlc: Address) -> Self {
        Self {
            chain_id,
            htlc,
            wallet: HotWallet::random().address(),
            inner: Mutex::new(Inner {
                block: 1,
                now: chrono::Utc::now().timestamp(),
                htlcs: HashMap::new(),
                events: Vec::new(),
                balances: HashMap::new(),
                // 50 gwei
                gas_price: U256::from(50_000_000_000u64),
                scripted_fund_failures: VecDeque::new(),
                tx_counter: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Test / dev hooks ─────────────────────────────────────────────────────

    /// Simulate a user funding an HTLC from their own wallet (the action the
    /// coordinator only ever observes, never performs).
    #[allow(clippy::too_many_arguments)]
    pub fn user_fund(
        &self,
        contract_id: ContractId,
        originator: Address,
        beneficiary: Address,
        token: Address,
        value: Amount,
        hash_lock: HashLock,
        timelock: Timestamp,
    ) {
        let mut inner = self.lock();
        inner.block += 1;
        let block = inner.block;
        inner.htlcs.insert(
            *contract_id.as_bytes(),
            HtlcDetails {
                contract_id,
                token,
                beneficiary,
                originator,
                hash_lock,
                timelock,
                value,
                state: HtlcState::Open,
            },
        );
        inner.events.push(ChainEvent::Funded {
            contract_id,
            originator,
            beneficiary,
            token,
            value,
            hash_lock,
            timelock,
            block,
        });
    }

    /// Simulate a third party claiming an HTLC directly on chain (e.g. the
    /// user claiming without the relayer). Panics on contract-rule violations
    /// because tests drive it.
    pub fn external_claim(&self, contract_id: ContractId, claimer: Address, preimage: Preimage) {
        let mut inner = self.lock();
        inner.block += 1;
        let block = inner.block;
        let entry = inner
            .htlcs
            .get_mut(contract_id.as_bytes())
            .expect("unknown contract id");
        assert_eq!(entry.state, HtlcState::Open);
        assert!(verify_preimage(&preimage, &entry.hash_lock));
        entry.state = HtlcState::Claimed;
        inner.events.push(ChainEvent::Claimed { contract_id, claimer, preimage, block });
    }

    pub fn set_balance(&self, address: Address, balance: Amount) {
        self.lock().balances.insert(address, balance);
    }

    pub fn set_gas_price(&self, price: Amount) {
        self.lock().gas_price = price;
    }

    /// Pin the mock clock (contract-side timelock checks read this).
    pub fn set_now(&self, now: Timestamp) {
        self.lock().now = now;
    }

    /// Queue an error for the next `fund` call; consumed in FIFO order.
    pub fn script_fund_failure(&self, err: PoolswapError) {
        self.lock().scripted_fund_failures.push_back(err);
    }

    pub fn details(&self, contract_id: &ContractId) -> Option<HtlcDetails> {
        self.lock().htlcs.get(contract_id.as_bytes()).copied()
    }

    fn next_outcome(inner: &mut Inner) -> TxOutcome {
        inner.block += 1;
        inner.tx_counter += 1;
        let hash = keccak256_bytes(&inner.tx_counter.to_be_bytes());
        TxOutcome {
            tx_hash: TxHash::from_bytes(hash),
            block_number: inner.block,
            gas_used: 60_000,
            effective_gas_price: inner.gas_price,
        }
    }
}

#[async_trait]
impl HtlcChain for MockChain {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn htlc_address(&self) -> Address {
        self.htlc
    }

    fn wallet_address(&self) -> Address {
        self.wallet
    }

    async fn fund(&self, req: FundRequest) -> Result<TxOutcome, PoolswapError> {
        let mut inner = self.lock();
        if let Some(err) = inner.scripted_fund_failures.pop_front() {
            return Err(err);
        }
        if inner.htlcs.contains_key(req.contract_id.as_bytes()) {
            return Err(PoolswapError::ChainReverted("contract id exists".into()));
        }
        if req.beneficiary == Address::ZERO {
            return Err(PoolswapError::ChainReverted("beneficiary is zero".into()));
        }
        if req.value.is_zero() {
            return Err(PoolswapError::ChainReverted("value is zero".into()));
        }

        let outcome = Self::next_outcome(&mut inner);
        let block = inner.block;
        inner.htlcs.insert(
            *req.contract_id.as_bytes(),
            HtlcDetails {
                contract_id: req.contract_id,
                token: req.token,
                beneficiary: req.beneficiary,
                originator: self.wallet,
                hash_lock: req.hash_lock,
                timelock: req.timelock,
                value: req.value,
                state: HtlcState::Open,
            },
        );
        inner.events.push(ChainEvent::Funded {
            contract_id: req.contract_id,
            originator: self.wallet,
            beneficiary: req.beneficiary,
            token: req.token,
            value: req.value,
            hash_lock: req.hash_lock,
            timelock: req.timelock,
            block,
        });
        Ok(outcome)
    }

    async fn claim(
        &self,
        contract_id: ContractId,
        preimage: Preimage,
    ) -> Result<TxOutcome, PoolswapError> {
        let mut inner = self.lock();
        let now = inner.now;
        let entry = inner
            .htlcs
            .get_mut(contract_id.as_bytes())
            .ok_or_else(|| PoolswapError::ChainReverted("unknown contract id".into()))?;
        if entry.state != HtlcState::Open {
            return Err(PoolswapError::ChainReverted("not open".into()));
        }
        if now >= entry.timelock {
            return Err(PoolswapError::ChainReverted("timelock expired".into()));
        }
        if !verify_preimage(&preimage, &entry.hash_lock) {
            return Err(PoolswapError::ChainReverted("invalid preimage".into()));
        }
        entry.state = HtlcState::Claimed;

        let outcome = Self::next_outcome(&mut inner);
        let block = inner.block;
        let claimer = self.wallet;
        inner.events.push(ChainEvent::Claimed { contract_id, claimer, preimage, block });
        Ok(outcome)
    }

    async fn refund(&self, contract_id: ContractId) -> Result<TxOutcome, PoolswapError> {
        let mut inner = self.lock();
        let now = inner.now;
        let entry = inner
            .htlcs
            .get_mut(contract_id.as_bytes())
            .ok_or_else(|| PoolswapError::ChainReverted("unknown contract id".into()))?;
        if entry.state != HtlcState::Open {
            return Err(PoolswapError::ChainReverted("not open".into()));
        }
        if now < entry.timelock {
            return Err(PoolswapError::ChainReverted("timelock not expired".into()));
        }
        entry.state = HtlcState::Refunded;

        let outcome = Self::next_outcome(&mut inner);
        let block = inner.block;
        let refunder = self.wallet;
        inner.events.push(ChainEvent::Refunded { contract_id, refunder, block });
        Ok(outcome)
    }

    async fn get_details(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<HtlcDetails>, PoolswapError> {
        Ok(self.details(&contract_id))
    }

    async fn poll_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, PoolswapError> {
        let inner = self.lock();
        Ok(inner
            .events
            .iter()
            .filter(|e| e.block() >= from_block && e.block() <= to_block)
            .copied()
            .collect())
    }

    async fn latest_block(&self) -> Result<u64, PoolswapError> {
        Ok(self.lock().block)
    }

    async fn balance(&self, address: Address) -> Result<Amount, PoolswapError> {
        // Unset balances default to a comfortably funded wallet.
        Ok(self
            .lock()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_else(|| U256::from(10u64).pow(U256::from(21u64))))
    }

    async fn gas_price(&self) -> Result<Amount, PoolswapError> {
        Ok(self.lock().gas_price)
    }
}
