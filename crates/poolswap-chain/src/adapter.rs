use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use poolswap_core::types::{
    Address, Amount, ChainId, ContractId, HashLock, Preimage, Timestamp, TxHash,
};
use poolswap_core::PoolswapError;

use crate::htlc::HtlcDetails;

/// Result of a confirmed transaction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: Amount,
}

/// Inputs of an HTLC `fund` call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FundRequest {
    pub contract_id: ContractId,
    pub token: Address,
    pub beneficiary: Address,
    pub hash_lock: HashLock,
    pub timelock: Timestamp,
    pub value: Amount,
}

/// A decoded HTLC log, tagged with the block it was found in. The watcher
/// feeds these to the resolver in block order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChainEvent {
    Funded {
        contract_id: ContractId,
        originator: Address,
        beneficiary: Address,
        token: Address,
        value: Amount,
        hash_lock: HashLock,
        timelock: Timestamp,
        block: u64,
    },
    Claimed {
        contract_id: ContractId,
        claimer: Address,
        preimage: Preimage,
        block: u64,
    },
    Refunded {
        contract_id: ContractId,
        refunder: Address,
        block: u64,
    },
}

impl ChainEvent {
    pub fn block(&self) -> u64 {
        match self {
            ChainEvent::Funded { block, .. }
            | ChainEvent::Claimed { block, .. }
            | ChainEvent::Refunded { block, .. } => *block,
        }
    }

    pub fn contract_id(&self) -> ContractId {
        match self {
            ChainEvent::Funded { contract_id, .. }
            | ChainEvent::Claimed { contract_id, .. }
            | ChainEvent::Refunded { contract_id, .. } => *contract_id,
        }
    }
}

/// Uniform chain access. One instance per configured chain.
///
/// Failure semantics: implementations retry transient faults internally
/// (returning `ChainTransient` only once the retry budget is spent) and
/// surface deterministic reverts as `ChainReverted` verbatim — a revert is
/// final for the caller.
///
/// All outgoing transactions of one instance are serialized through a single
/// writer so the sender's nonce sequence never forks.
#[async_trait]
pub trait HtlcChain: Send + Sync {
    fn chain_id(&self) -> ChainId;

    /// Address of the deployed HTLC contract.
    fn htlc_address(&self) -> Address;

    /// Pool-side signer for this chain (destination funder / relayer wallet).
    fn wallet_address(&self) -> Address;

    /// Fund a new HTLC entry. Confirmed success means the entry is OPEN.
    async fn fund(&self, req: FundRequest) -> Result<TxOutcome, PoolswapError>;

    /// Claim an entry by revealing its preimage.
    async fn claim(
        &self,
        contract_id: ContractId,
        preimage: Preimage,
    ) -> Result<TxOutcome, PoolswapError>;

    /// Refund an entry whose timelock has passed.
    async fn refund(&self, contract_id: ContractId) -> Result<TxOutcome, PoolswapError>;

    /// Read an entry. `None` when the contract has never seen the id.
    async fn get_details(
        &self,
        contract_id: ContractId,
    ) -> Result<Option<HtlcDetails>, PoolswapError>;

    /// Decoded HTLC logs in `[from_block, to_block]`, ascending by block.
    async fn poll_events(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainEvent>, PoolswapError>;

    async fn latest_block(&self) -> Result<u64, PoolswapError>;

    /// Native balance of `address` in wei.
    async fn balance(&self, address: Address) -> Result<Amount, PoolswapError>;

    /// Current gas price estimate in wei.
    async fn gas_price(&self) -> Result<Amount, PoolswapError>;
}
