use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PoolswapError;
use crate::types::{
    Address, Amount, ChainId, ContractId, HashLock, Preimage, SwapId, Timestamp, TokenKey,
};

// ── SwapState ────────────────────────────────────────────────────────────────

/// Lifecycle state of a single cross-chain swap.
///
/// Initial: `Pending`. Terminal: `UserClaimed`, `Expired`, `Failed`.
/// Transitions are authorized exclusively by [`transition`]; the store
/// persists a new state only when that function returns `Ok`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapState {
    /// Created, liquidity reserved, waiting for the user to fund source.
    Pending,
    /// User's source HTLC observed and accepted.
    SourceLocked,
    /// Pool's destination HTLC funded and committed.
    PoolFulfilled,
    /// Relayer executed the user's source claim; preimage is public.
    UserClaimed,
    /// Timed out before fulfillment; reservation released, user refunds source.
    Expired,
    /// Unrecoverable error with funds safe; pool-side recovery handled it.
    Failed,
}

impl SwapState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapState::UserClaimed | SwapState::Expired | SwapState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapState::Pending => "PENDING",
            SwapState::SourceLocked => "SOURCE_LOCKED",
            SwapState::PoolFulfilled => "POOL_FULFILLED",
            SwapState::UserClaimed => "USER_CLAIMED",
            SwapState::Expired => "EXPIRED",
            SwapState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SwapState::Pending),
            "SOURCE_LOCKED" => Some(SwapState::SourceLocked),
            "POOL_FULFILLED" => Some(SwapState::PoolFulfilled),
            "USER_CLAIMED" => Some(SwapState::UserClaimed),
            "EXPIRED" => Some(SwapState::Expired),
            "FAILED" => Some(SwapState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Transition events ────────────────────────────────────────────────────────

/// The inputs of the pure transition function. Guards (timelock windows,
/// hash-lock checks, lease ownership) are enforced by the caller before the
/// event is fed in; the function only decides graph membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapTransition {
    /// User's source HTLC confirmed with an acceptable timelock.
    SourceFunded,
    /// Pool's destination HTLC confirmed.
    DestinationFunded,
    /// Relayer's source-side claim confirmed.
    UserClaimed,
    /// `expires_at` or `source_timelock` passed before fulfillment.
    TimedOut,
    /// Unrecoverable error; funds are safe or recovered pool-side.
    Aborted,
}

impl fmt::Display for SwapTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwapTransition::SourceFunded => "source_funded",
            SwapTransition::DestinationFunded => "destination_funded",
            SwapTransition::UserClaimed => "user_claimed",
            SwapTransition::TimedOut => "timed_out",
            SwapTransition::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// The swap state machine. Pure: no clocks, no I/O.
///
/// Concurrent writers race through the store's version CAS — at most one
/// transition per version wins, losers re-read and retry.
pub fn transition(state: SwapState, event: SwapTransition) -> Result<SwapState, PoolswapError> {
    use SwapState as S;
    use SwapTransition as E;

    let next = match (state, event) {
        (S::Pending, E::SourceFunded) => S::SourceLocked,
        (S::SourceLocked, E::DestinationFunded) => S::PoolFulfilled,
        (S::PoolFulfilled, E::UserClaimed) => S::UserClaimed,
        (S::Pending, E::TimedOut) | (S::SourceLocked, E::TimedOut) => S::Expired,
        (S::Pending, E::Aborted) | (S::SourceLocked, E::Aborted) | (S::PoolFulfilled, E::Aborted) => {
            S::Failed
        }
        (from, ev) => {
            return Err(PoolswapError::InvalidTransition {
                from: from.to_string(),
                event: ev.to_string(),
            })
        }
    };
    Ok(next)
}

// ── Swap legs and fees ───────────────────────────────────────────────────────

/// What the user locks on the source chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLeg {
    pub chain_id: ChainId,
    pub token: Address,
    pub amount: Amount,
}

impl SourceLeg {
    pub fn token_key(&self) -> TokenKey {
        TokenKey::new(self.chain_id, self.token)
    }
}

/// What the pool pays out on the destination chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLeg {
    pub chain_id: ChainId,
    pub token: Address,
    /// The amount the pool reserves and locks (quote output).
    pub expected_amount: Amount,
    /// User-supplied floor; a quote below this is rejected at creation.
    pub min_receive_amount: Amount,
}

impl TargetLeg {
    pub fn token_key(&self) -> TokenKey {
        TokenKey::new(self.chain_id, self.token)
    }
}

/// Fees computed at quote time and frozen into the swap at creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapFees {
    /// Flat fee covering destination-side gas, in target-token units.
    pub network_fee: Amount,
    /// Percentage fee retained by the pool, in target-token units.
    pub exchange_fee: Amount,
}

// ── Swap ─────────────────────────────────────────────────────────────────────

/// A single cross-chain exchange between the user and the liquidity pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Swap {
    pub id: SwapId,

    /// Source-chain identity of the originator; also the only address allowed
    /// to authorize the relayed claim.
    pub user_address: Address,
    /// Destination-chain recipient; may equal `user_address`.
    pub beneficiary_address: Address,

    pub source: SourceLeg,
    pub target: TargetLeg,

    /// SHA-256 digest of `preimage`. Both HTLCs lock to this value.
    pub hash_lock: HashLock,
    /// Present from creation; leaves the coordinator only inside the user's
    /// signed claim and the pool's destination-side claim.
    pub preimage: Option<Preimage>,

    /// Contract-side id of the user's source HTLC, once observed.
    pub user_htlc_id: Option<ContractId>,
    /// Contract-side id of the pool's destination HTLC, once funded.
    pub pool_htlc_id: Option<ContractId>,

    pub state: SwapState,

    // Monotonic lifecycle timestamps (Unix seconds, UTC).
    pub source_funded_at: Option<Timestamp>,
    pub destination_funded_at: Option<Timestamp>,
    pub user_claimed_at: Option<Timestamp>,
    pub pool_claimed_at: Option<Timestamp>,
    pub refunded_at: Option<Timestamp>,

    /// Absolute Unix seconds. Invariant: `destination_timelock + Δ <= source_timelock`.
    pub source_timelock: Timestamp,
    pub destination_timelock: Timestamp,

    pub created_at: Timestamp,
    /// Deadline for the user to fund the source HTLC.
    pub expires_at: Timestamp,

    pub fees: SwapFees,

    /// Categorical failure reason, set when `state` is `Failed`.
    pub error_message: Option<String>,

    /// Optimistic-concurrency counter, bumped on every persisted mutation.
    pub version: u64,
}

impl Swap {
    /// States that hold a liquidity reservation for `target`.
    pub fn holds_reservation(&self) -> bool {
        matches!(self.state, SwapState::Pending | SwapState::SourceLocked)
    }
}
