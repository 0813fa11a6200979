use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use poolswap_chain::ChainEvent;
use poolswap_core::types::{Address, ChainId, ContractId, Timestamp};
use poolswap_core::{EventKind, PoolswapError, SwapState, SwapTransition};

use crate::ctx::ResolverCtx;
use crate::{apply_transition, update_fields};

/// W1 — matches source-side `Funded` logs to PENDING swaps by hash lock and
/// tracks claim/refund observations for both legs. Events for locks the
/// coordinator never created are ignored.
pub struct FundingDetector {
    ctx: Arc<ResolverCtx>,
    events_rx: mpsc::Receiver<(ChainId, ChainEvent)>,
    shutdown: watch::Receiver<bool>,
}

impl FundingDetector {
    pub fn new(
        ctx: Arc<ResolverCtx>,
        events_rx: mpsc::Receiver<(ChainId, ChainEvent)>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { ctx, events_rx, shutdown }
    }

    /// Drive the event loop. Run in a dedicated tokio task.
    pub async fn run(mut self) {
        info!("funding detector started");
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("funding detector stopping");
                        return;
                    }
                }
                maybe = self.events_rx.recv() => {
                    let Some((chain_id, event)) = maybe else {
                        info!("event channel closed; funding detector stopping");
                        return;
                    };
                    if let Err(e) = self.process_event(chain_id, &event) {
                        warn!(chain = chain_id, error = %e, "event handling failed");
                    }
                }
            }
        }
    }

    /// Handle one decoded chain event. Public so tests (and replay at
    /// startup) can drive the detector deterministically.
    pub fn process_event(
        &self,
        chain_id: ChainId,
        event: &ChainEvent,
    ) -> Result<(), PoolswapError> {
        match *event {
            ChainEvent::Funded {
                contract_id,
                originator,
                token,
                value,
                hash_lock,
                timelock,
                ..
            } => self.on_funded(chain_id, contract_id, originator, token, value, hash_lock, timelock),
            ChainEvent::Claimed { contract_id, claimer, .. } => {
                self.on_claimed(chain_id, contract_id, claimer)
            }
            ChainEvent::Refunded { contract_id, refunder, .. } => {
                self.on_refunded(contract_id, refunder)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_funded(
        &self,
        chain_id: ChainId,
        contract_id: ContractId,
        originator: Address,
        token: Address,
        value: poolswap_core::types::Amount,
        hash_lock: poolswap_core::types::HashLock,
        timelock: Timestamp,
    ) -> Result<(), PoolswapError> {
        let Some(swap) = self
            .ctx
            .store
            .find_swap_by_hash_lock(&hash_lock, SwapState::Pending)?
        else {
            debug!(chain = chain_id, lock = %hash_lock, "funding for unknown hash lock ignored");
            return Ok(());
        };

        // Our own destination funding carries the same hash lock; only the
        // source leg makes a swap SOURCE_LOCKED.
        if swap.source.chain_id != chain_id {
            return Ok(());
        }
        if token != swap.source.token {
            warn!(swap = %swap.id, "funded with wrong token; ignoring");
            return Ok(());
        }
        if value < swap.source.amount {
            warn!(swap = %swap.id, %value, "underfunded source HTLC; ignoring");
            return Ok(());
        }
        let required = swap.destination_timelock + self.ctx.config.timelocks.safety_window_secs;
        if timelock < required {
            warn!(
                swap = %swap.id, timelock, required,
                "source timelock too short; ignoring (swap will expire)"
            );
            return Ok(());
        }

        let now = now();
        let updated = apply_transition(
            &self.ctx.store,
            &swap.id,
            SwapTransition::SourceFunded,
            |s| {
                s.user_htlc_id = Some(contract_id);
                s.source_funded_at = Some(now);
                // The contract's word wins over the quote-time estimate.
                s.source_timelock = timelock;
            },
        )?;
        self.ctx.store.append_event(
            updated.id,
            EventKind::SourceHtlcCreated,
            json!({
                "contract_id": contract_id.to_hex(),
                "originator": format!("{originator}"),
                "value": value.to_string(),
                "timelock": timelock,
            }),
            now,
        )?;
        info!(swap = %updated.id, contract = %contract_id, "source HTLC locked");
        Ok(())
    }

    fn on_claimed(
        &self,
        chain_id: ChainId,
        contract_id: ContractId,
        claimer: Address,
    ) -> Result<(), PoolswapError> {
        let Some(swap) = self.ctx.store.find_swap_by_htlc_id(&contract_id)? else {
            return Ok(());
        };

        if swap.user_htlc_id == Some(contract_id) {
            // Preimage is now public on the source chain. The relayer usually
            // records USER_CLAIMED first; this path covers direct claims.
            if swap.state == SwapState::PoolFulfilled {
                let now = now();
                let updated = apply_transition(
                    &self.ctx.store,
                    &swap.id,
                    SwapTransition::UserClaimed,
                    |s| s.user_claimed_at = Some(now),
                )?;
                self.ctx.store.append_event(
                    updated.id,
                    EventKind::UserClaimed,
                    json!({
                        "contract_id": contract_id.to_hex(),
                        "claimer": format!("{claimer}"),
                        "via_relayer": false,
                    }),
                    now,
                )?;
                info!(swap = %updated.id, chain = chain_id, "user claimed source directly");
            }
        } else if swap.pool_htlc_id == Some(contract_id) && swap.pool_claimed_at.is_none() {
            // Confirmation of the pool's own destination claim.
            let now = now();
            update_fields(&self.ctx.store, &swap.id, |s| {
                s.pool_claimed_at = Some(now);
            })?;
        }
        Ok(())
    }

    fn on_refunded(&self, contract_id: ContractId, refunder: Address) -> Result<(), PoolswapError> {
        let Some(swap) = self.ctx.store.find_swap_by_htlc_id(&contract_id)? else {
            return Ok(());
        };
        // The user reclaiming their expired source HTLC is their own action;
        // record it on the timeline only.
        if swap.user_htlc_id == Some(contract_id) {
            self.ctx.store.append_event(
                swap.id,
                EventKind::Refunded,
                json!({
                    "contract_id": contract_id.to_hex(),
                    "refunder": format!("{refunder}"),
                    "leg": "source",
                }),
                now(),
            )?;
        }
        Ok(())
    }
}

fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}
