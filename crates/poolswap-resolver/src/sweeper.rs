use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use poolswap_chain::HtlcState;
use poolswap_core::types::Timestamp;
use poolswap_core::{EventKind, PoolswapError, Swap, SwapState, SwapTransition};

use crate::ctx::ResolverCtx;
use crate::{apply_transition, update_fields};

/// W3 — the timer-driven recovery worker. Single-threaded by design: every
/// pass re-reads state, so an action lost to a CAS race is simply retried on
/// the next tick.
pub struct TimeoutSweeper {
    ctx: Arc<ResolverCtx>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl TimeoutSweeper {
    pub fn new(ctx: Arc<ResolverCtx>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { ctx, interval, shutdown }
    }

    pub async fn run(mut self) {
        info!("timeout sweeper started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("timeout sweeper stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = self.cycle(now).await {
                        warn!(error = %e, "sweep cycle failed");
                    }
                }
            }
        }
    }

    /// One full sweep at time `now` (injectable for tests).
    pub async fn cycle(&self, now: Timestamp) -> Result<(), PoolswapError> {
        self.expire_unfunded(now)?;
        self.expire_source_locked(now)?;
        self.refund_abandoned(now).await?;
        self.claim_destinations(now).await?;
        Ok(())
    }

    /// PENDING past `expires_at`: never funded, no chain action needed.
    fn expire_unfunded(&self, now: Timestamp) -> Result<(), PoolswapError> {
        for swap in self.ctx.store.list_swaps_by_state(SwapState::Pending)? {
            if now <= swap.expires_at {
                continue;
            }
            self.expire_swap(&swap, now, "funding_window_elapsed")?;
        }
        Ok(())
    }

    /// SOURCE_LOCKED past the source timelock: the user can refund their own
    /// HTLC now; we only release the reservation. Source refund is the
    /// user's action, not the pool's.
    fn expire_source_locked(&self, now: Timestamp) -> Result<(), PoolswapError> {
        for swap in self.ctx.store.list_swaps_by_state(SwapState::SourceLocked)? {
            if now <= swap.source_timelock {
                continue;
            }
            self.expire_swap(&swap, now, "source_timelock_elapsed")?;
        }
        Ok(())
    }

    fn expire_swap(&self, swap: &Swap, now: Timestamp, reason: &str) -> Result<(), PoolswapError> {
        debug_assert!(swap.holds_reservation());
        let updated = match apply_transition(
            &self.ctx.store,
            &swap.id,
            SwapTransition::TimedOut,
            |_| {},
        ) {
            Ok(s) => s,
            // Raced with the detector/funder and lost: leave it to them.
            Err(PoolswapError::InvalidTransition { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.ctx
            .liquidity
            .release(updated.target.token_key(), updated.target.expected_amount)?;
        self.ctx.store.append_event(
            updated.id,
            EventKind::Expired,
            json!({ "reason": reason }),
            now,
        )?;
        info!(swap = %updated.id, reason, "swap expired; reservation released");
        Ok(())
    }

    /// POOL_FULFILLED past the destination timelock with the HTLC still open:
    /// the user never claimed, so the pool takes its tokens back.
    async fn refund_abandoned(&self, now: Timestamp) -> Result<(), PoolswapError> {
        for swap in self.ctx.store.list_swaps_by_state(SwapState::PoolFulfilled)? {
            if now <= swap.destination_timelock {
                continue;
            }
            let Some(pool_htlc_id) = swap.pool_htlc_id else {
                continue;
            };
            let chain = self.ctx.chain(swap.target.chain_id)?;
            let details = chain.get_details(pool_htlc_id).await?;
            match details.map(|d| d.state) {
                Some(HtlcState::Open) => {}
                // Claimed late or already refunded; other paths own those.
                _ => continue,
            }

            match chain.refund(pool_htlc_id).await {
                Ok(tx) => {
                    self.ctx
                        .liquidity
                        .refund_in(swap.target.token_key(), swap.target.expected_amount)?;
                    let updated = apply_transition(
                        &self.ctx.store,
                        &swap.id,
                        SwapTransition::Aborted,
                        |s| {
                            s.refunded_at = Some(now);
                            s.error_message = Some("user_did_not_claim".into());
                        },
                    )?;
                    self.ctx.store.append_event(
                        updated.id,
                        EventKind::Refunded,
                        json!({
                            "contract_id": pool_htlc_id.to_hex(),
                            "tx_hash": tx.tx_hash.to_hex(),
                            "leg": "destination",
                        }),
                        now,
                    )?;
                    self.ctx.store.append_event(
                        updated.id,
                        EventKind::SwapFailed,
                        json!({ "reason": "user_did_not_claim" }),
                        now,
                    )?;
                    info!(swap = %updated.id, "destination HTLC refunded to pool");
                }
                Err(e) => {
                    warn!(swap = %swap.id, error = %e, "destination refund failed; will retry");
                }
            }
        }
        Ok(())
    }

    /// USER_CLAIMED with the destination still unclaimed: the preimage is
    /// public, collect the pool's counterpart. This is pool-side cleanup —
    /// the user's economic outcome is already final.
    async fn claim_destinations(&self, now: Timestamp) -> Result<(), PoolswapError> {
        for swap in self.ctx.store.list_swaps_by_state(SwapState::UserClaimed)? {
            if swap.pool_claimed_at.is_some() {
                continue;
            }
            let (Some(pool_htlc_id), Some(preimage)) = (swap.pool_htlc_id, swap.preimage) else {
                continue;
            };
            let chain = self.ctx.chain(swap.target.chain_id)?;

            if let Some(details) = chain.get_details(pool_htlc_id).await? {
                if details.state == HtlcState::Claimed {
                    // Already claimed (possibly observed by the detector
                    // before this tick); just record it.
                    update_fields(&self.ctx.store, &swap.id, |s| {
                        s.pool_claimed_at = Some(now);
                    })?;
                    continue;
                }
            }

            match chain.claim(pool_htlc_id, preimage).await {
                Ok(tx) => {
                    update_fields(&self.ctx.store, &swap.id, |s| {
                        s.pool_claimed_at = Some(now);
                    })?;
                    self.ctx.store.append_event(
                        swap.id,
                        EventKind::PoolClaimed,
                        json!({
                            "contract_id": pool_htlc_id.to_hex(),
                            "tx_hash": tx.tx_hash.to_hex(),
                        }),
                        now,
                    )?;
                    info!(swap = %swap.id, "destination HTLC claimed for the pool");
                }
                Err(e) => {
                    warn!(swap = %swap.id, error = %e, "destination claim failed; will retry");
                }
            }
        }
        Ok(())
    }
}
