use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{
    Address, Amount, ClaimId, ContractId, Preimage, SwapId, Timestamp, TxHash,
};

// ── ClaimStatus ──────────────────────────────────────────────────────────────

/// Processing state of a relayed claim request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// Accepted at ingress, queued (or parked on gas price).
    Pending,
    /// Picked up by the executor; a transaction may be in flight.
    InProgress,
    /// On-chain claim confirmed; the swap reached USER_CLAIMED.
    Completed,
    /// Confirmed revert or policy failure; the user may submit a fresh claim.
    Failed,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Pending => "PENDING",
            ClaimStatus::InProgress => "IN_PROGRESS",
            ClaimStatus::Completed => "COMPLETED",
            ClaimStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── ClaimRequest ─────────────────────────────────────────────────────────────

/// A signed authorization for the relayer to execute the user's source-side
/// HTLC claim and reveal the preimage, gas paid by the relayer wallet.
///
/// All fields up to and including `deadline` are covered by the EIP-712
/// signature; mutating any of them (including `gas_compensation`) invalidates
/// it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub id: ClaimId,
    pub swap_id: SwapId,

    /// HTLC contract address on the source chain.
    pub htlc_contract: Address,
    /// HTLC entry being claimed (the user's source-side lock).
    pub contract_id: ContractId,
    /// The secret; must hash to the swap's hash lock.
    pub preimage: Preimage,
    /// Must equal the swap's `user_address` and the recovered signer.
    pub claimer: Address,

    /// Execution is parked (not failed) while observed gas exceeds this.
    pub max_gas_price: Amount,
    /// Reimbursement the relayer contract pays itself, in wei. Signed, so the
    /// user has endorsed the exact amount.
    pub gas_compensation: Amount,
    /// Strictly monotonic per claimer.
    pub nonce: u64,
    /// Absolute Unix seconds; rejected at ingress when too close or past.
    pub deadline: Timestamp,

    /// 65-byte EIP-712 signature (r ‖ s ‖ v) by `claimer`.
    pub signature: Vec<u8>,

    pub status: ClaimStatus,
    pub tx_hash: Option<TxHash>,
    pub gas_used: Option<u64>,
    /// Effective gas price paid, recorded on completion.
    pub gas_price: Option<Amount>,
    pub error_message: Option<String>,

    pub created_at: Timestamp,
    pub version: u64,
}
