//! The canonical HTLC contract surface. Every other crate goes through the
//! typed methods on [`HtlcChain`](crate::adapter::HtlcChain); nothing else in
//! the workspace defines ABI fragments.

use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};

use poolswap_core::types::{Address, Amount, ContractId, HashLock, Timestamp};
use poolswap_core::PoolswapError;

sol! {
    /// Hash-time-locked escrow deployed on every supported chain.
    ///
    /// The contract verifies claims with `sha256(abi.encodePacked(preimage))`
    /// — SHA-256, not keccak. State encoding: 0 = INVALID, 1 = OPEN,
    /// 2 = CLAIMED, 3 = REFUNDED.
    interface IHtlc {
        function fund(
            bytes32 contractId,
            address token,
            address beneficiary,
            bytes32 hashLock,
            uint256 timelock,
            uint256 value
        ) external payable;

        function claim(bytes32 contractId, bytes32 preimage) external;

        function refund(bytes32 contractId) external;

        function getDetails(bytes32 contractId)
            external
            view
            returns (
                address token,
                address beneficiary,
                address originator,
                bytes32 hashLock,
                uint256 timelock,
                uint256 value,
                uint8 state
            );

        event Funded(
            bytes32 indexed contractId,
            address indexed originator,
            address indexed beneficiary,
            address token,
            uint256 value,
            bytes32 hashLock,
            uint256 timelock
        );

        event Claimed(bytes32 indexed contractId, address indexed claimer, bytes32 preimage);

        event Refunded(bytes32 indexed contractId, address indexed refunder);
    }
}

// ── HtlcState ────────────────────────────────────────────────────────────────

/// Contract-side lifecycle of one HTLC entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HtlcState {
    Invalid,
    Open,
    Claimed,
    Refunded,
}

impl HtlcState {
    pub fn from_u8(v: u8) -> Result<Self, PoolswapError> {
        match v {
            0 => Ok(HtlcState::Invalid),
            1 => Ok(HtlcState::Open),
            2 => Ok(HtlcState::Claimed),
            3 => Ok(HtlcState::Refunded),
            other => Err(PoolswapError::Serialization(format!(
                "unknown HTLC state encoding {other}"
            ))),
        }
    }
}

// ── HtlcDetails ──────────────────────────────────────────────────────────────

/// Decoded `getDetails` response.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HtlcDetails {
    pub contract_id: ContractId,
    pub token: Address,
    pub beneficiary: Address,
    pub originator: Address,
    pub hash_lock: HashLock,
    pub timelock: Timestamp,
    pub value: Amount,
    pub state: HtlcState,
}
