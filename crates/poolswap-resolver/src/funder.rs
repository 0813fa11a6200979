use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use poolswap_chain::FundRequest;
use poolswap_core::constants::{FUNDER_BATCH_SIZE, FUND_MAX_ATTEMPTS};
use poolswap_core::types::{SwapId, Timestamp};
use poolswap_core::{EventKind, PoolswapError, Swap, SwapState, SwapTransition};
use poolswap_crypto::derive_contract_id;

use crate::ctx::ResolverCtx;
use crate::{apply_transition, update_fields};

/// W2 — funds the pool's destination HTLC for swaps whose source leg is
/// locked. Each swap is leased through a CAS field write before any chain
/// side effect, so parallel funder instances never double-fund.
pub struct DestinationFunder {
    ctx: Arc<ResolverCtx>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
    /// Funding attempts per swap; feeds the contract-id nonce so a retry
    /// never collides with a half-landed previous attempt.
    attempts: HashMap<SwapId, u32>,
}

impl DestinationFunder {
    pub fn new(ctx: Arc<ResolverCtx>, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { ctx, interval, shutdown, attempts: HashMap::new() }
    }

    pub async fn run(mut self) {
        info!("destination funder started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("destination funder stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.cycle().await {
                        warn!(error = %e, "funder cycle failed");
                    }
                }
            }
        }
    }

    /// One pass: oldest SOURCE_LOCKED swaps first, bounded batch.
    pub async fn cycle(&mut self) -> Result<(), PoolswapError> {
        let batch: Vec<Swap> = self
            .ctx
            .store
            .list_swaps_by_state(SwapState::SourceLocked)?
            .into_iter()
            .take(FUNDER_BATCH_SIZE)
            .collect();

        for swap in batch {
            if let Err(e) = self.fund_one(&swap).await {
                warn!(swap = %swap.id, error = %e, "funding attempt failed");
            }
        }
        Ok(())
    }

    async fn fund_one(&mut self, swap: &Swap) -> Result<(), PoolswapError> {
        let safety = self.ctx.config.timelocks.safety_window_secs;
        // Refuse to fund when the refund windows no longer nest; the swap is
        // aborted and its reservation handed back.
        if swap.destination_timelock + safety > swap.source_timelock {
            warn!(swap = %swap.id, "timelock window collapsed; aborting before submission");
            return self.fail_swap(swap.id, "timelock_window_too_short");
        }

        let attempt = *self.attempts.get(&swap.id).unwrap_or(&0);
        if attempt >= FUND_MAX_ATTEMPTS {
            self.attempts.remove(&swap.id);
            return self.fail_swap(swap.id, "destination_funding_failed");
        }

        let chain = self.ctx.chain(swap.target.chain_id)?;
        let contract_id = derive_contract_id(
            chain.wallet_address(),
            swap.beneficiary_address,
            &swap.hash_lock,
            swap.destination_timelock,
            swap.target.token,
            swap.target.expected_amount,
            attempt as u64,
        );

        // Lease: winning this CAS write makes us the only funder for the
        // swap's current version.
        let leased = match update_fields(&self.ctx.store, &swap.id, |s| {
            s.pool_htlc_id = Some(contract_id);
        }) {
            Ok(s) => s,
            Err(PoolswapError::VersionConflict(_)) => return Ok(()), // another worker owns it
            Err(e) => return Err(e),
        };
        if leased.state != SwapState::SourceLocked {
            return Ok(()); // moved on while we leased
        }

        let outcome = chain
            .fund(FundRequest {
                contract_id,
                token: swap.target.token,
                beneficiary: swap.beneficiary_address,
                hash_lock: swap.hash_lock,
                timelock: swap.destination_timelock,
                value: swap.target.expected_amount,
            })
            .await;

        match outcome {
            Ok(tx) => {
                self.attempts.remove(&swap.id);
                // Funds have left the pool wallet: account first, then flip
                // state so a crash in between over-counts outflow rather than
                // double-spending the reservation.
                self.ctx
                    .liquidity
                    .commit(swap.target.token_key(), swap.target.expected_amount)?;
                let now = now();
                let updated = apply_transition(
                    &self.ctx.store,
                    &swap.id,
                    SwapTransition::DestinationFunded,
                    |s| {
                        s.pool_htlc_id = Some(contract_id);
                        s.destination_funded_at = Some(now);
                    },
                )?;
                self.ctx.store.append_event(
                    updated.id,
                    EventKind::DestinationHtlcCreated,
                    json!({
                        "contract_id": contract_id.to_hex(),
                        "tx_hash": tx.tx_hash.to_hex(),
                        "value": swap.target.expected_amount.to_string(),
                        "timelock": swap.destination_timelock,
                    }),
                    now,
                )?;
                info!(swap = %updated.id, contract = %contract_id, "destination HTLC funded");
                Ok(())
            }
            Err(PoolswapError::ChainReverted(reason)) => {
                self.attempts.remove(&swap.id);
                warn!(swap = %swap.id, %reason, "destination funding reverted");
                self.fail_swap(swap.id, &format!("destination_reverted: {reason}"))
            }
            Err(e) => {
                // Transient: leave SOURCE_LOCKED, try again next cycle with a
                // fresh contract id.
                *self.attempts.entry(swap.id).or_insert(0) += 1;
                Err(e)
            }
        }
    }

    /// Abort a swap that still holds its reservation: FAILED + release.
    fn fail_swap(&self, id: SwapId, reason: &str) -> Result<(), PoolswapError> {
        let now = now();
        let updated = apply_transition(&self.ctx.store, &id, SwapTransition::Aborted, |s| {
            s.error_message = Some(reason.to_string());
        })?;
        self.ctx
            .liquidity
            .release(updated.target.token_key(), updated.target.expected_amount)?;
        self.ctx.store.append_event(
            id,
            EventKind::SwapFailed,
            json!({ "reason": reason }),
            now,
        )?;
        Ok(())
    }
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}
