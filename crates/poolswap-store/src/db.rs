use std::path::Path;

use poolswap_core::types::{
    Address, ChainId, ClaimId, HashLock, SwapId, Timestamp, TokenKey,
};
use poolswap_core::{
    ClaimRequest, ClaimStatus, EventKind, PoolLiquidity, PoolswapError, Swap, SwapEvent,
    SwapState, TokenConfig,
};

/// Persistent coordinator state.
///
/// Named trees:
///   swaps            — SwapId bytes (uuid)        → bincode(Swap)
///   pool_liquidity   — TokenKey bytes             → bincode(PoolLiquidity)
///   claim_requests   — ClaimId bytes (uuid)       → bincode(ClaimRequest)
///   claim_nonces     — claimer address bytes      → u64 be (next expected nonce)
///   events           — SwapId bytes ‖ seq be      → json(SwapEvent)
///   supported_tokens — TokenKey bytes             → bincode(TokenConfig)
///   meta             — utf8 key bytes             → raw bytes (block cursors, counters)
pub struct Store {
    _db: sled::Db,
    swaps: sled::Tree,
    pool_liquidity: sled::Tree,
    claim_requests: sled::Tree,
    claim_nonces: sled::Tree,
    events: sled::Tree,
    supported_tokens: sled::Tree,
    meta: sled::Tree,
}

fn storage_err(e: sled::Error) -> PoolswapError {
    PoolswapError::Storage(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, PoolswapError> {
    bincode::serialize(value).map_err(|e| PoolswapError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, PoolswapError> {
    bincode::deserialize(bytes).map_err(|e| PoolswapError::Serialization(e.to_string()))
}

// `SwapEvent` carries a `serde_json::Value` payload, whose `Deserialize` impl
// requires `deserialize_any`, which bincode's deserializer does not support.
// The events tree therefore uses JSON encoding instead of bincode.
fn encode_event(value: &SwapEvent) -> Result<Vec<u8>, PoolswapError> {
    serde_json::to_vec(value).map_err(|e| PoolswapError::Serialization(e.to_string()))
}

fn decode_event(bytes: &[u8]) -> Result<SwapEvent, PoolswapError> {
    serde_json::from_slice(bytes).map_err(|e| PoolswapError::Serialization(e.to_string()))
}

impl Store {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PoolswapError> {
        let db = sled::open(path).map_err(storage_err)?;
        let swaps            = db.open_tree("swaps").map_err(storage_err)?;
        let pool_liquidity   = db.open_tree("pool_liquidity").map_err(storage_err)?;
        let claim_requests   = db.open_tree("claim_requests").map_err(storage_err)?;
        let claim_nonces     = db.open_tree("claim_nonces").map_err(storage_err)?;
        let events           = db.open_tree("events").map_err(storage_err)?;
        let supported_tokens = db.open_tree("supported_tokens").map_err(storage_err)?;
        let meta             = db.open_tree("meta").map_err(storage_err)?;
        Ok(Self { _db: db, swaps, pool_liquidity, claim_requests, claim_nonces,
                  events, supported_tokens, meta })
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), PoolswapError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }

    // ── Swaps ────────────────────────────────────────────────────────────────

    pub fn get_swap(&self, id: &SwapId) -> Result<Option<Swap>, PoolswapError> {
        match self.swaps.get(id.0.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a brand-new swap. Fails if the id already exists; the inserted
    /// row always starts at version 0.
    pub fn insert_swap(&self, swap: &Swap) -> Result<(), PoolswapError> {
        let mut row = swap.clone();
        row.version = 0;
        let bytes = encode(&row)?;
        let prev = self
            .swaps
            .compare_and_swap(swap.id.0.as_bytes(), None as Option<&[u8]>, Some(bytes))
            .map_err(storage_err)?;
        if prev.is_err() {
            return Err(PoolswapError::Validation(format!(
                "swap {} already exists",
                swap.id
            )));
        }
        Ok(())
    }

    /// Compare-and-swap update. `swap.version` must equal the stored version;
    /// the persisted row gets `version + 1`. Returns the persisted row.
    ///
    /// This is the lease primitive: whichever worker wins the CAS owns the
    /// swap for that step.
    pub fn update_swap(&self, swap: &Swap) -> Result<Swap, PoolswapError> {
        let key = swap.id.0.as_bytes();
        let current = self
            .swaps
            .get(key)
            .map_err(storage_err)?
            .ok_or_else(|| PoolswapError::NotFound(format!("swap {}", swap.id)))?;
        let stored: Swap = decode(&current)?;
        if stored.version != swap.version {
            return Err(PoolswapError::VersionConflict(format!(
                "swap {} at v{}, caller had v{}",
                swap.id, stored.version, swap.version
            )));
        }

        let mut next = swap.clone();
        next.version = swap.version + 1;
        let next_bytes = encode(&next)?;
        let swapped = self
            .swaps
            .compare_and_swap(key, Some(current), Some(next_bytes))
            .map_err(storage_err)?;
        if swapped.is_err() {
            return Err(PoolswapError::VersionConflict(format!(
                "swap {} moved during update",
                swap.id
            )));
        }
        Ok(next)
    }

    pub fn list_swaps_by_state(&self, state: SwapState) -> Result<Vec<Swap>, PoolswapError> {
        let mut out = Vec::new();
        for item in self.swaps.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let swap: Swap = decode(&bytes)?;
            if swap.state == state {
                out.push(swap);
            }
        }
        out.sort_by_key(|s| s.created_at);
        Ok(out)
    }

    /// Match an on-chain `Funded` event to its swap. Only swaps still in
    /// `state` qualify, so stale or unknown locks are ignored by the caller.
    pub fn find_swap_by_hash_lock(
        &self,
        hash_lock: &HashLock,
        state: SwapState,
    ) -> Result<Option<Swap>, PoolswapError> {
        for item in self.swaps.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let swap: Swap = decode(&bytes)?;
            if swap.hash_lock == *hash_lock && swap.state == state {
                return Ok(Some(swap));
            }
        }
        Ok(None)
    }

    /// Match a chain-side contract id to the swap that owns it, on either the
    /// user (source) or pool (destination) leg.
    pub fn find_swap_by_htlc_id(
        &self,
        contract_id: &poolswap_core::types::ContractId,
    ) -> Result<Option<Swap>, PoolswapError> {
        for item in self.swaps.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let swap: Swap = decode(&bytes)?;
            if swap.user_htlc_id == Some(*contract_id) || swap.pool_htlc_id == Some(*contract_id) {
                return Ok(Some(swap));
            }
        }
        Ok(None)
    }

    /// Filtered listing for the read API. All filters are conjunctive.
    pub fn list_swaps(
        &self,
        state: Option<SwapState>,
        user_address: Option<Address>,
        chain_id: Option<ChainId>,
    ) -> Result<Vec<Swap>, PoolswapError> {
        let mut out = Vec::new();
        for item in self.swaps.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let swap: Swap = decode(&bytes)?;
            if let Some(st) = state {
                if swap.state != st {
                    continue;
                }
            }
            if let Some(user) = user_address {
                if swap.user_address != user {
                    continue;
                }
            }
            if let Some(chain) = chain_id {
                if swap.source.chain_id != chain && swap.target.chain_id != chain {
                    continue;
                }
            }
            out.push(swap);
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    // ── Pool liquidity ───────────────────────────────────────────────────────

    pub fn get_liquidity(&self, token: &TokenKey) -> Result<Option<PoolLiquidity>, PoolswapError> {
        match self
            .pool_liquidity
            .get(token.to_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a fresh liquidity row (version forced to 0). Fails if present.
    pub fn insert_liquidity(&self, liq: &PoolLiquidity) -> Result<(), PoolswapError> {
        let mut row = liq.clone();
        row.version = 0;
        let bytes = encode(&row)?;
        let prev = self
            .pool_liquidity
            .compare_and_swap(liq.token.to_bytes(), None as Option<&[u8]>, Some(bytes))
            .map_err(storage_err)?;
        if prev.is_err() {
            return Err(PoolswapError::Validation(format!(
                "liquidity row {} already exists",
                liq.token
            )));
        }
        Ok(())
    }

    /// Versioned CAS update, same contract as [`Store::update_swap`].
    pub fn update_liquidity(&self, liq: &PoolLiquidity) -> Result<PoolLiquidity, PoolswapError> {
        let key = liq.token.to_bytes();
        let current = self
            .pool_liquidity
            .get(key)
            .map_err(storage_err)?
            .ok_or_else(|| PoolswapError::NotFound(format!("liquidity {}", liq.token)))?;
        let stored: PoolLiquidity = decode(&current)?;
        if stored.version != liq.version {
            return Err(PoolswapError::VersionConflict(format!(
                "liquidity {} at v{}, caller had v{}",
                liq.token, stored.version, liq.version
            )));
        }

        let mut next = liq.clone();
        next.version = liq.version + 1;
        let next_bytes = encode(&next)?;
        let swapped = self
            .pool_liquidity
            .compare_and_swap(key, Some(current), Some(next_bytes))
            .map_err(storage_err)?;
        if swapped.is_err() {
            return Err(PoolswapError::VersionConflict(format!(
                "liquidity {} moved during update",
                liq.token
            )));
        }
        Ok(next)
    }

    pub fn list_liquidity(&self) -> Result<Vec<PoolLiquidity>, PoolswapError> {
        let mut out = Vec::new();
        for item in self.pool_liquidity.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Claim requests ───────────────────────────────────────────────────────

    pub fn get_claim(&self, id: &ClaimId) -> Result<Option<ClaimRequest>, PoolswapError> {
        match self
            .claim_requests
            .get(id.0.as_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn insert_claim(&self, claim: &ClaimRequest) -> Result<(), PoolswapError> {
        let mut row = claim.clone();
        row.version = 0;
        let bytes = encode(&row)?;
        let prev = self
            .claim_requests
            .compare_and_swap(claim.id.0.as_bytes(), None as Option<&[u8]>, Some(bytes))
            .map_err(storage_err)?;
        if prev.is_err() {
            return Err(PoolswapError::Validation(format!(
                "claim {} already exists",
                claim.id
            )));
        }
        Ok(())
    }

    pub fn update_claim(&self, claim: &ClaimRequest) -> Result<ClaimRequest, PoolswapError> {
        let key = claim.id.0.as_bytes();
        let current = self
            .claim_requests
            .get(key)
            .map_err(storage_err)?
            .ok_or_else(|| PoolswapError::NotFound(format!("claim {}", claim.id)))?;
        let stored: ClaimRequest = decode(&current)?;
        if stored.version != claim.version {
            return Err(PoolswapError::VersionConflict(format!(
                "claim {} at v{}, caller had v{}",
                claim.id, stored.version, claim.version
            )));
        }

        let mut next = claim.clone();
        next.version = claim.version + 1;
        let next_bytes = encode(&next)?;
        let swapped = self
            .claim_requests
            .compare_and_swap(key, Some(current), Some(next_bytes))
            .map_err(storage_err)?;
        if swapped.is_err() {
            return Err(PoolswapError::VersionConflict(format!(
                "claim {} moved during update",
                claim.id
            )));
        }
        Ok(next)
    }

    pub fn list_claims_by_status(
        &self,
        status: ClaimStatus,
    ) -> Result<Vec<ClaimRequest>, PoolswapError> {
        let mut out = Vec::new();
        for item in self.claim_requests.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let claim: ClaimRequest = decode(&bytes)?;
            if claim.status == status {
                out.push(claim);
            }
        }
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }

    /// Claims completed at or after `since` — the relayer's rate-limit window.
    pub fn count_completed_claims_since(
        &self,
        since: Timestamp,
        claimer: Option<Address>,
    ) -> Result<usize, PoolswapError> {
        let mut n = 0;
        for item in self.claim_requests.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let claim: ClaimRequest = decode(&bytes)?;
            if claim.status != ClaimStatus::Completed || claim.created_at < since {
                continue;
            }
            if let Some(addr) = claimer {
                if claim.claimer != addr {
                    continue;
                }
            }
            n += 1;
        }
        Ok(n)
    }

    // ── Claim nonces ─────────────────────────────────────────────────────────

    /// Next nonce expected from `claimer` (0 for a new user).
    pub fn next_nonce(&self, claimer: &Address) -> Result<u64, PoolswapError> {
        match self
            .claim_nonces
            .get(claimer.as_slice())
            .map_err(storage_err)?
        {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes[..8]);
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// Consume `nonce` for `claimer` atomically. Strict monotonicity: the
    /// nonce must equal the stored expectation exactly. Reuse yields
    /// `nonce_reused`, skipping ahead yields `nonce_gap`.
    pub fn consume_nonce(&self, claimer: &Address, nonce: u64) -> Result<(), PoolswapError> {
        let key = claimer.as_slice();
        let current = self.claim_nonces.get(key).map_err(storage_err)?;
        let expected = match &current {
            Some(bytes) => {
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&bytes[..8]);
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        if nonce < expected {
            return Err(PoolswapError::Validation("nonce_reused".into()));
        }
        if nonce > expected {
            return Err(PoolswapError::Validation("nonce_gap".into()));
        }

        let next = (expected + 1).to_be_bytes().to_vec();
        let swapped = self
            .claim_nonces
            .compare_and_swap(key, current, Some(next))
            .map_err(storage_err)?;
        if swapped.is_err() {
            // A concurrent ingress consumed it first; that submission won.
            return Err(PoolswapError::Validation("nonce_reused".into()));
        }
        Ok(())
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Append an event for `swap_id`, assigning the next per-swap sequence
    /// number. The append is the ordering oracle for a swap's timeline.
    pub fn append_event(
        &self,
        swap_id: SwapId,
        kind: EventKind,
        data: serde_json::Value,
        timestamp: Timestamp,
    ) -> Result<SwapEvent, PoolswapError> {
        loop {
            let seq = self.next_event_seq(&swap_id)?;
            let event = SwapEvent { swap_id, seq, kind, data: data.clone(), timestamp };
            let mut key = swap_id.0.as_bytes().to_vec();
            key.extend_from_slice(&seq.to_be_bytes());
            let bytes = encode_event(&event)?;
            let prev = self
                .events
                .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))
                .map_err(storage_err)?;
            if prev.is_ok() {
                return Ok(event);
            }
            // Lost a race for this seq; take the next one.
        }
    }

    fn next_event_seq(&self, swap_id: &SwapId) -> Result<u64, PoolswapError> {
        let prefix = swap_id.0.as_bytes();
        let last = self.events.scan_prefix(prefix).last();
        match last {
            Some(item) => {
                let (key, _) = item.map_err(storage_err)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&key[key.len() - 8..]);
                Ok(u64::from_be_bytes(arr) + 1)
            }
            None => Ok(0),
        }
    }

    /// Events for one swap with `seq > after`, ascending. `after = None`
    /// returns the full timeline.
    pub fn list_events(
        &self,
        swap_id: &SwapId,
        after: Option<u64>,
    ) -> Result<Vec<SwapEvent>, PoolswapError> {
        let mut out = Vec::new();
        for item in self.events.scan_prefix(swap_id.0.as_bytes()) {
            let (_, bytes) = item.map_err(storage_err)?;
            let ev: SwapEvent = decode_event(&bytes)?;
            if let Some(after) = after {
                if ev.seq <= after {
                    continue;
                }
            }
            out.push(ev);
        }
        Ok(out)
    }

    // ── Supported tokens ─────────────────────────────────────────────────────

    pub fn put_supported_token(&self, token: &TokenConfig) -> Result<(), PoolswapError> {
        let bytes = encode(token)?;
        self.supported_tokens
            .insert(token.key().to_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_supported_token(
        &self,
        key: &TokenKey,
    ) -> Result<Option<TokenConfig>, PoolswapError> {
        match self
            .supported_tokens
            .get(key.to_bytes())
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_supported_tokens(&self) -> Result<Vec<TokenConfig>, PoolswapError> {
        let mut out = Vec::new();
        for item in self.supported_tokens.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    // ── Block cursors ────────────────────────────────────────────────────────

    /// The watcher cursor for `chain_id`: the last block whose logs were
    /// fully processed, and when the cursor last advanced. Watchers resume
    /// from `block + 1` after a restart; the timestamp feeds the health
    /// endpoint's staleness signal.
    pub fn cursor(&self, chain_id: ChainId) -> Result<Option<(u64, Timestamp)>, PoolswapError> {
        let key = format!("cursor:{chain_id}");
        match self.meta.get(key.as_bytes()).map_err(storage_err)? {
            Some(bytes) => {
                if bytes.len() < 16 {
                    return Err(PoolswapError::Serialization(format!(
                        "cursor row for chain {chain_id} is {} bytes, want 16",
                        bytes.len()
                    )));
                }
                let mut block = [0u8; 8];
                block.copy_from_slice(&bytes[..8]);
                let mut at = [0u8; 8];
                at.copy_from_slice(&bytes[8..16]);
                Ok(Some((u64::from_be_bytes(block), i64::from_be_bytes(at))))
            }
            None => Ok(None),
        }
    }

    /// The cursor's block number alone.
    pub fn last_processed_block(&self, chain_id: ChainId) -> Result<Option<u64>, PoolswapError> {
        Ok(self.cursor(chain_id)?.map(|(block, _)| block))
    }

    /// Advance the cursor, stamping `now` as the advance time. Written only
    /// after every log in the block has been handled, so a crash replays the
    /// block rather than skipping it.
    pub fn set_last_processed_block(
        &self,
        chain_id: ChainId,
        block: u64,
        now: Timestamp,
    ) -> Result<(), PoolswapError> {
        let key = format!("cursor:{chain_id}");
        let mut value = Vec::with_capacity(16);
        value.extend_from_slice(&block.to_be_bytes());
        value.extend_from_slice(&now.to_be_bytes());
        self.meta
            .insert(key.as_bytes(), value)
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;
    use poolswap_core::{SourceLeg, SwapFees, TargetLeg};

    fn temp_store(name: &str) -> Store {
        let dir = std::env::temp_dir().join(format!("poolswap_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        Store::open(&dir).expect("open temp store")
    }

    fn sample_swap() -> Swap {
        Swap {
            id: SwapId::generate(),
            user_address: Address::repeat_byte(0x11),
            beneficiary_address: Address::repeat_byte(0x11),
            source: SourceLeg {
                chain_id: 1,
                token: Address::repeat_byte(0xa0),
                amount: U256::from(10u64),
            },
            target: TargetLeg {
                chain_id: 2,
                token: Address::repeat_byte(0xb0),
                expected_amount: U256::from(9u64),
                min_receive_amount: U256::from(9u64),
            },
            hash_lock: HashLock::from_bytes([1u8; 32]),
            preimage: None,
            user_htlc_id: None,
            pool_htlc_id: None,
            state: SwapState::Pending,
            source_funded_at: None,
            destination_funded_at: None,
            user_claimed_at: None,
            pool_claimed_at: None,
            refunded_at: None,
            source_timelock: 2_000_000,
            destination_timelock: 1_998_000,
            created_at: 1_000_000,
            expires_at: 1_003_600,
            fees: SwapFees::default(),
            error_message: None,
            version: 0,
        }
    }

    #[test]
    fn insert_and_get_swap() {
        let store = temp_store("insert_get");
        let swap = sample_swap();
        store.insert_swap(&swap).unwrap();
        let loaded = store.get_swap(&swap.id).unwrap().unwrap();
        assert_eq!(loaded, swap);
        assert!(store.insert_swap(&swap).is_err(), "double insert must fail");
    }

    #[test]
    fn update_swap_bumps_version_and_detects_conflicts() {
        let store = temp_store("cas");
        let swap = sample_swap();
        store.insert_swap(&swap).unwrap();

        let mut a = store.get_swap(&swap.id).unwrap().unwrap();
        let b = a.clone();

        a.state = SwapState::SourceLocked;
        let a = store.update_swap(&a).unwrap();
        assert_eq!(a.version, 1);

        // b still has version 0 — its update must lose.
        let mut b = b;
        b.state = SwapState::Expired;
        assert!(matches!(
            store.update_swap(&b),
            Err(PoolswapError::VersionConflict(_))
        ));
    }

    #[test]
    fn find_by_hash_lock_only_matches_requested_state() {
        let store = temp_store("hashlock");
        let swap = sample_swap();
        store.insert_swap(&swap).unwrap();

        let found = store
            .find_swap_by_hash_lock(&swap.hash_lock, SwapState::Pending)
            .unwrap();
        assert_eq!(found.unwrap().id, swap.id);

        let none = store
            .find_swap_by_hash_lock(&swap.hash_lock, SwapState::SourceLocked)
            .unwrap();
        assert!(none.is_none());

        let unknown = store
            .find_swap_by_hash_lock(&HashLock::from_bytes([9u8; 32]), SwapState::Pending)
            .unwrap();
        assert!(unknown.is_none());
    }

    #[test]
    fn list_swaps_applies_filters() {
        let store = temp_store("filters");
        let mut a = sample_swap();
        a.user_address = Address::repeat_byte(0x21);
        let b = sample_swap();
        store.insert_swap(&a).unwrap();
        store.insert_swap(&b).unwrap();

        let all = store.list_swaps(None, None, None).unwrap();
        assert_eq!(all.len(), 2);

        let only_a = store
            .list_swaps(None, Some(Address::repeat_byte(0x21)), None)
            .unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, a.id);

        let chain_hits = store.list_swaps(None, None, Some(2)).unwrap();
        assert_eq!(chain_hits.len(), 2, "target chain matches too");

        let none = store.list_swaps(Some(SwapState::Failed), None, None).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn nonce_is_strictly_monotonic() {
        let store = temp_store("nonces");
        let user = Address::repeat_byte(0x42);

        assert_eq!(store.next_nonce(&user).unwrap(), 0);
        store.consume_nonce(&user, 0).unwrap();
        assert_eq!(store.next_nonce(&user).unwrap(), 1);

        let reuse = store.consume_nonce(&user, 0).unwrap_err();
        assert!(reuse.to_string().contains("nonce_reused"));

        let gap = store.consume_nonce(&user, 5).unwrap_err();
        assert!(gap.to_string().contains("nonce_gap"));

        store.consume_nonce(&user, 1).unwrap();
    }

    #[test]
    fn events_get_sequential_ids_per_swap() {
        let store = temp_store("events");
        let id = SwapId::generate();
        let other = SwapId::generate();

        let e0 = store
            .append_event(id, EventKind::SwapCreated, serde_json::json!({}), 1)
            .unwrap();
        let e1 = store
            .append_event(id, EventKind::SourceHtlcCreated, serde_json::json!({}), 2)
            .unwrap();
        let o0 = store
            .append_event(other, EventKind::SwapCreated, serde_json::json!({}), 3)
            .unwrap();

        assert_eq!((e0.seq, e1.seq, o0.seq), (0, 1, 0));

        let all = store.list_events(&id, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, EventKind::SwapCreated);

        let resumed = store.list_events(&id, Some(0)).unwrap();
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].seq, 1);
    }

    #[test]
    fn block_cursor_tracks_block_and_advance_time() {
        let store = temp_store("cursor");
        assert_eq!(store.cursor(5).unwrap(), None);
        assert_eq!(store.last_processed_block(5).unwrap(), None);

        store.set_last_processed_block(5, 1234, 1_000_000).unwrap();
        assert_eq!(store.cursor(5).unwrap(), Some((1234, 1_000_000)));
        assert_eq!(store.last_processed_block(5).unwrap(), Some(1234));

        // A later advance replaces both the block and the stamp.
        store.set_last_processed_block(5, 1235, 1_000_030).unwrap();
        assert_eq!(store.cursor(5).unwrap(), Some((1235, 1_000_030)));
    }

    #[test]
    fn liquidity_cas_round_trip() {
        let store = temp_store("liquidity");
        let key = TokenKey::new(2, Address::repeat_byte(0xb0));
        let mut liq = PoolLiquidity::new(key, U256::ZERO, 0);
        liq.total = U256::from(100u64);
        liq.available = U256::from(100u64);
        store.insert_liquidity(&liq).unwrap();

        let mut loaded = store.get_liquidity(&key).unwrap().unwrap();
        loaded.reserved = U256::from(10u64);
        loaded.available = U256::from(90u64);
        let updated = store.update_liquidity(&loaded).unwrap();
        assert_eq!(updated.version, 1);

        // Stale writer loses.
        let mut stale = store.get_liquidity(&key).unwrap().unwrap();
        stale.version = 0;
        assert!(matches!(
            store.update_liquidity(&stale),
            Err(PoolswapError::VersionConflict(_))
        ));
    }
}
