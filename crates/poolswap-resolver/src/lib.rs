//! poolswap-resolver
//!
//! The event-driven fulfillment engine: three cooperative workers sharing a
//! [`ResolverCtx`].
//!
//!   W1 [`FundingDetector`] — consumes decoded chain events, matches source
//!      funding to PENDING swaps by hash lock, observes claims.
//!   W2 [`DestinationFunder`] — leases SOURCE_LOCKED swaps via store CAS and
//!      funds the pool's destination HTLC.
//!   W3 [`TimeoutSweeper`] — timer-driven recovery: expiries, pool refunds,
//!      and the pool-side destination claim once the preimage is public.
//!
//! No worker holds a lock across I/O; exclusivity comes from winning the
//! swap row's version CAS.

pub mod ctx;
pub mod detector;
pub mod funder;
pub mod sweeper;

pub use ctx::ResolverCtx;
pub use detector::FundingDetector;
pub use funder::DestinationFunder;
pub use sweeper::TimeoutSweeper;

use poolswap_core::constants::CAS_MAX_RETRIES;
use poolswap_core::types::SwapId;
use poolswap_core::{transition, PoolswapError, Swap, SwapTransition};
use poolswap_store::Store;

/// Read–transition–mutate–CAS with bounded retry. The transition function
/// authorizes the state change on every attempt, so a swap that moved
/// underneath us is re-judged, not blindly overwritten.
pub(crate) fn apply_transition<F>(
    store: &Store,
    id: &SwapId,
    event: SwapTransition,
    mutate: F,
) -> Result<Swap, PoolswapError>
where
    F: Fn(&mut Swap),
{
    for _ in 0..CAS_MAX_RETRIES {
        let mut swap = store
            .get_swap(id)?
            .ok_or_else(|| PoolswapError::NotFound(format!("swap {id}")))?;
        swap.state = transition(swap.state, event)?;
        mutate(&mut swap);
        match store.update_swap(&swap) {
            Ok(updated) => return Ok(updated),
            Err(PoolswapError::VersionConflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(PoolswapError::VersionConflict(format!(
        "transition {event} on {id}: {CAS_MAX_RETRIES} attempts"
    )))
}

/// Field-only CAS update (no state transition), same retry contract.
pub(crate) fn update_fields<F>(
    store: &Store,
    id: &SwapId,
    mutate: F,
) -> Result<Swap, PoolswapError>
where
    F: Fn(&mut Swap),
{
    for _ in 0..CAS_MAX_RETRIES {
        let mut swap = store
            .get_swap(id)?
            .ok_or_else(|| PoolswapError::NotFound(format!("swap {id}")))?;
        mutate(&mut swap);
        match store.update_swap(&swap) {
            Ok(updated) => return Ok(updated),
            Err(PoolswapError::VersionConflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(PoolswapError::VersionConflict(format!(
        "field update on {id}: {CAS_MAX_RETRIES} attempts"
    )))
}
