use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, Eip712Domain, SolStruct};

use poolswap_core::constants::{EIP712_DOMAIN_NAME, EIP712_DOMAIN_VERSION};
use poolswap_core::types::ChainId;
use poolswap_core::ClaimRequest;

sol! {
    /// The typed-data message a user signs to authorize a relayed claim.
    /// Field order and names are fixed by the deployed relayer contract.
    struct Claim {
        address htlcContract;
        bytes32 contractId;
        bytes32 preimage;
        address beneficiary;
        uint256 maxGasPrice;
        uint256 gasCompensation;
        uint256 nonce;
        uint256 deadline;
    }
}

pub use Claim as ClaimMessage;

fn domain(chain_id: ChainId, verifying_contract: Address) -> Eip712Domain {
    Eip712Domain::new(
        Some(EIP712_DOMAIN_NAME.into()),
        Some(EIP712_DOMAIN_VERSION.into()),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

/// The 32-byte digest the user's wallet signed:
/// `keccak256("\x19\x01" ‖ domainSeparator ‖ hashStruct(Claim))`.
pub fn claim_digest(req: &ClaimRequest, chain_id: ChainId, verifying_contract: Address) -> B256 {
    let message = Claim {
        htlcContract: req.htlc_contract,
        contractId: B256::from(*req.contract_id.as_bytes()),
        preimage: B256::from(*req.preimage.as_bytes()),
        beneficiary: req.claimer,
        maxGasPrice: req.max_gas_price,
        gasCompensation: req.gas_compensation,
        nonce: U256::from(req.nonce),
        deadline: U256::from(req.deadline as u64),
    };
    message.eip712_signing_hash(&domain(chain_id, verifying_contract))
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolswap_core::types::{ClaimId, ContractId, Preimage, SwapId};
    use poolswap_core::{ClaimStatus, ClaimRequest};

    fn request() -> ClaimRequest {
        ClaimRequest {
            id: ClaimId::generate(),
            swap_id: SwapId::generate(),
            htlc_contract: Address::repeat_byte(0xaa),
            contract_id: ContractId::from_bytes([1u8; 32]),
            preimage: Preimage::from_bytes([2u8; 32]),
            claimer: Address::repeat_byte(0xbb),
            max_gas_price: U256::from(50_000_000_000u64),
            gas_compensation: U256::from(1_000u64),
            nonce: 0,
            deadline: 1_900_000_000,
            signature: vec![],
            status: ClaimStatus::Pending,
            tx_hash: None,
            gas_used: None,
            gas_price: None,
            error_message: None,
            created_at: 0,
            version: 0,
        }
    }

    #[test]
    fn digest_is_stable_for_identical_requests() {
        let verifying = Address::repeat_byte(0xcc);
        let a = claim_digest(&request(), 1, verifying);
        let b = claim_digest(&request(), 1, verifying);
        assert_eq!(a, b);
    }

    #[test]
    fn digest_binds_every_signed_field() {
        let verifying = Address::repeat_byte(0xcc);
        let base = claim_digest(&request(), 1, verifying);

        let mut r = request();
        r.gas_compensation = U256::from(2_000u64);
        assert_ne!(base, claim_digest(&r, 1, verifying), "gas_compensation must be signed");

        let mut r = request();
        r.nonce = 1;
        assert_ne!(base, claim_digest(&r, 1, verifying));

        let mut r = request();
        r.preimage = Preimage::from_bytes([3u8; 32]);
        assert_ne!(base, claim_digest(&r, 1, verifying));

        // Domain binding: a different chain or verifying contract changes it.
        assert_ne!(base, claim_digest(&request(), 2, verifying));
        assert_ne!(base, claim_digest(&request(), 1, Address::repeat_byte(0xdd)));
    }
}
