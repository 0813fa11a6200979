use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use poolswap_core::types::Timestamp;
use poolswap_core::{
    transition, ClaimRequest, ClaimStatus, EventKind, PoolswapError, SwapState, SwapTransition,
};

use crate::Relayer;

impl Relayer {
    /// Background executor loop.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("relayer executor started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("relayer executor stopping");
                        return;
                    }
                }
                _ = tokio::time::sleep(interval) => {
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = self.cycle(now).await {
                        warn!(error = %e, "relayer cycle failed");
                    }
                }
            }
        }
    }

    /// One execution pass: up to `batch_size` PENDING claims, oldest first,
    /// submitted sequentially so the wallet nonce order never forks.
    pub async fn cycle(&self, now: Timestamp) -> Result<(), PoolswapError> {
        if self.is_paused() {
            return Ok(());
        }
        let batch: Vec<ClaimRequest> = self
            .store
            .list_claims_by_status(ClaimStatus::Pending)?
            .into_iter()
            .take(self.config.relayer.batch_size)
            .collect();

        for claim in batch {
            match self.execute_claim(&claim, now).await {
                Ok(ClaimOutcome::EmergencyStopped) => return Ok(()),
                Ok(_) => {}
                Err(e) => warn!(claim = %claim.id, error = %e, "claim execution failed"),
            }
        }
        Ok(())
    }

    async fn execute_claim(
        &self,
        claim: &ClaimRequest,
        now: Timestamp,
    ) -> Result<ClaimOutcome, PoolswapError> {
        let Some(swap) = self.store.get_swap(&claim.swap_id)? else {
            self.finish_claim(claim, ClaimStatus::Failed, None, Some("swap_missing"))?;
            return Ok(ClaimOutcome::Failed);
        };
        if swap.state != SwapState::PoolFulfilled {
            self.finish_claim(claim, ClaimStatus::Failed, None, Some("swap_not_claimable"))?;
            return Ok(ClaimOutcome::Failed);
        }
        if now >= claim.deadline {
            self.finish_claim(claim, ClaimStatus::Failed, None, Some("deadline_expired"))?;
            return Ok(ClaimOutcome::Failed);
        }

        let chain = self.chain(swap.source.chain_id)?;
        let chain_cfg = self
            .config
            .chain(swap.source.chain_id)
            .ok_or_else(|| PoolswapError::NotFound(format!("chain {}", swap.source.chain_id)))?;

        // Gas parking: above the signed ceiling the request waits, it does
        // not fail.
        let gas_price = chain.gas_price().await?;
        if gas_price > claim.max_gas_price {
            return Ok(ClaimOutcome::Parked);
        }

        // Emergency-stop guard, checked before every submission.
        let balance = chain.balance(chain.wallet_address()).await?;
        if balance < chain_cfg.emergency_threshold {
            warn!(
                chain = swap.source.chain_id, %balance,
                threshold = %chain_cfg.emergency_threshold,
                "relayer balance below threshold; pausing"
            );
            self.pause();
            self.store.append_event(
                swap.id,
                EventKind::EmergencyStop,
                json!({
                    "balance": balance.to_string(),
                    "threshold": chain_cfg.emergency_threshold.to_string(),
                    "chain_id": swap.source.chain_id,
                }),
                now,
            )?;
            return Ok(ClaimOutcome::EmergencyStopped);
        }

        let mut in_progress = claim.clone();
        in_progress.status = ClaimStatus::InProgress;
        let in_progress = match self.store.update_claim(&in_progress) {
            Ok(c) => c,
            // Another executor instance took it.
            Err(PoolswapError::VersionConflict(_)) => return Ok(ClaimOutcome::Skipped),
            Err(e) => return Err(e),
        };

        match chain.claim(claim.contract_id, claim.preimage).await {
            Ok(outcome) => {
                let mut done = in_progress;
                done.status = ClaimStatus::Completed;
                done.tx_hash = Some(outcome.tx_hash);
                done.gas_used = Some(outcome.gas_used);
                done.gas_price = Some(outcome.effective_gas_price);
                self.store.update_claim(&done)?;

                self.record_user_claimed(&swap.id, claim, now)?;
                info!(claim = %claim.id, swap = %swap.id, tx = %outcome.tx_hash, "claim completed");
                Ok(ClaimOutcome::Completed)
            }
            Err(PoolswapError::ChainReverted(reason)) => {
                // Deterministic failure: the swap stays POOL_FULFILLED and
                // the user may submit a fresh claim.
                let mut failed = in_progress;
                failed.status = ClaimStatus::Failed;
                failed.error_message = Some(reason.clone());
                self.store.update_claim(&failed)?;
                warn!(claim = %claim.id, %reason, "claim reverted");
                Ok(ClaimOutcome::Failed)
            }
            Err(e) => {
                // Transient: requeue for the next cycle.
                let mut retry = in_progress;
                retry.status = ClaimStatus::Pending;
                self.store.update_claim(&retry)?;
                Err(e)
            }
        }
    }

    /// Move the swap to USER_CLAIMED and log the event. A concurrent
    /// detector observation of the same on-chain claim may win the race;
    /// that is the same outcome, so the conflict is ignored.
    fn record_user_claimed(
        &self,
        swap_id: &poolswap_core::types::SwapId,
        claim: &ClaimRequest,
        now: Timestamp,
    ) -> Result<(), PoolswapError> {
        for _ in 0..poolswap_core::constants::CAS_MAX_RETRIES {
            let Some(mut swap) = self.store.get_swap(swap_id)? else {
                return Ok(());
            };
            if swap.state == SwapState::UserClaimed {
                return Ok(());
            }
            swap.state = transition(swap.state, SwapTransition::UserClaimed)?;
            swap.user_claimed_at = Some(now);
            match self.store.update_swap(&swap) {
                Ok(updated) => {
                    self.store.append_event(
                        updated.id,
                        EventKind::UserClaimed,
                        json!({
                            "claim_id": claim.id.to_string(),
                            "claimer": format!("{}", claim.claimer),
                            "nonce": claim.nonce,
                            "via_relayer": true,
                        }),
                        now,
                    )?;
                    return Ok(());
                }
                Err(PoolswapError::VersionConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(PoolswapError::VersionConflict(format!(
            "user_claimed on {swap_id}"
        )))
    }

    fn finish_claim(
        &self,
        claim: &ClaimRequest,
        status: ClaimStatus,
        tx_hash: Option<poolswap_core::types::TxHash>,
        error: Option<&str>,
    ) -> Result<(), PoolswapError> {
        let mut updated = claim.clone();
        updated.status = status;
        updated.tx_hash = tx_hash;
        updated.error_message = error.map(str::to_string);
        self.store.update_claim(&updated)?;
        Ok(())
    }
}

enum ClaimOutcome {
    Completed,
    Failed,
    Parked,
    Skipped,
    EmergencyStopped,
}
