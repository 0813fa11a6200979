use tracing::{info, warn};

use poolswap_core::types::{Address, Amount, ClaimId, ContractId, Preimage, SwapId, Timestamp};
use poolswap_core::{ClaimRequest, ClaimStatus, PoolswapError, SwapState};
use poolswap_crypto::{claim_digest, recover_signer, verify_preimage};

use crate::Relayer;

/// A claim authorization as it arrives at the HTTP boundary. Signature
/// production is an external (wallet-side) concern; this is pure input.
#[derive(Clone, Debug)]
pub struct ClaimPayload {
    pub swap_id: SwapId,
    pub htlc_contract: Address,
    pub contract_id: ContractId,
    pub preimage: Preimage,
    pub claimer: Address,
    pub max_gas_price: Amount,
    pub gas_compensation: Amount,
    pub nonce: u64,
    pub deadline: Timestamp,
    /// 65-byte EIP-712 signature.
    pub signature: Vec<u8>,
}

impl Relayer {
    /// Validate and enqueue a signed claim.
    ///
    /// Check order matters: signature first (nothing downstream is
    /// trustworthy without it), then nonce — so a replayed payload always
    /// reports `nonce_reused` — then deadline, preimage, rate limits and
    /// claimability. The nonce is consumed only once everything has passed,
    /// so a rejected payload leaves no state behind.
    pub fn submit_claim(&self, payload: ClaimPayload) -> Result<ClaimRequest, PoolswapError> {
        if self.is_paused() {
            return Err(PoolswapError::EmergencyStop);
        }
        let now = chrono::Utc::now().timestamp();
        let relayer_cfg = &self.config.relayer;

        let swap = self
            .store
            .get_swap(&payload.swap_id)?
            .ok_or_else(|| PoolswapError::NotFound(format!("swap {}", payload.swap_id)))?;

        // The claim must target the user's source-side lock, nothing else.
        let source_chain = self
            .config
            .chain(swap.source.chain_id)
            .ok_or_else(|| PoolswapError::NotFound(format!("chain {}", swap.source.chain_id)))?;
        if payload.htlc_contract != source_chain.htlc_contract {
            return Err(PoolswapError::Validation("wrong HTLC contract".into()));
        }
        if Some(payload.contract_id) != swap.user_htlc_id {
            return Err(PoolswapError::Validation("wrong contract id".into()));
        }

        // Recovered signer must be the claimer, and the claimer the swap's
        // originator.
        let request = ClaimRequest {
            id: ClaimId::generate(),
            swap_id: payload.swap_id,
            htlc_contract: payload.htlc_contract,
            contract_id: payload.contract_id,
            preimage: payload.preimage,
            claimer: payload.claimer,
            max_gas_price: payload.max_gas_price,
            gas_compensation: payload.gas_compensation,
            nonce: payload.nonce,
            deadline: payload.deadline,
            signature: payload.signature.clone(),
            status: ClaimStatus::Pending,
            tx_hash: None,
            gas_used: None,
            gas_price: None,
            error_message: None,
            created_at: now,
            version: 0,
        };
        let digest = claim_digest(
            &request,
            swap.source.chain_id,
            source_chain.relayer_contract,
        );
        let signer = recover_signer(&digest, &payload.signature)?;
        if signer != payload.claimer || payload.claimer != swap.user_address {
            warn!(swap = %swap.id, %signer, claimer = %payload.claimer, "claim signer mismatch");
            return Err(PoolswapError::Validation("signer mismatch".into()));
        }

        // Strict per-user monotonicity; replays die here as nonce_reused.
        let expected_nonce = self.store.next_nonce(&payload.claimer)?;
        if payload.nonce < expected_nonce {
            return Err(PoolswapError::Validation("nonce_reused".into()));
        }
        if payload.nonce > expected_nonce {
            return Err(PoolswapError::Validation("nonce_gap".into()));
        }

        if payload.deadline <= now + relayer_cfg.deadline_margin_secs {
            return Err(PoolswapError::Validation("deadline too close".into()));
        }

        if !verify_preimage(&payload.preimage, &swap.hash_lock) {
            return Err(PoolswapError::Validation(
                "preimage does not match hash lock".into(),
            ));
        }

        // Rolling-hour rate limits, per user then global.
        let hour_ago = now - 3600;
        let user_count = self
            .store
            .count_completed_claims_since(hour_ago, Some(payload.claimer))?;
        if user_count >= relayer_cfg.max_user_claims_per_hour {
            return Err(PoolswapError::Validation("user rate limit exceeded".into()));
        }
        let global_count = self.store.count_completed_claims_since(hour_ago, None)?;
        if global_count >= relayer_cfg.max_global_claims_per_hour {
            return Err(PoolswapError::Validation("global rate limit exceeded".into()));
        }

        if swap.state != SwapState::PoolFulfilled {
            return Err(PoolswapError::Validation(format!(
                "swap is {}, not claimable",
                swap.state
            )));
        }

        // All checks passed: consume the nonce (atomically — a concurrent
        // duplicate loses with nonce_reused) and persist.
        self.store.consume_nonce(&payload.claimer, payload.nonce)?;
        self.store.insert_claim(&request)?;

        info!(claim = %request.id, swap = %request.swap_id, nonce = request.nonce, "claim accepted");
        Ok(request)
    }
}
