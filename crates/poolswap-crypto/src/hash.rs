use sha2::{Digest, Sha256};
use sha3::Keccak256;

use alloy_primitives::{Address, U256};
use poolswap_core::types::{ContractId, HashLock, Preimage, Timestamp};

/// SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    digest.into()
}

/// keccak-256 of arbitrary bytes → 32-byte array.
pub fn keccak256_bytes(data: &[u8]) -> [u8; 32] {
    let digest = Keccak256::digest(data);
    digest.into()
}

/// The hash lock corresponding to a preimage: `SHA256(preimage)`, matching
/// the contract's `sha256(abi.encodePacked(preimage))`.
pub fn hash_lock_of(preimage: &Preimage) -> HashLock {
    HashLock::from_bytes(sha256_bytes(preimage.as_bytes()))
}

/// True iff `SHA256(preimage) == hash_lock`.
pub fn verify_preimage(preimage: &Preimage, hash_lock: &HashLock) -> bool {
    &hash_lock_of(preimage) == hash_lock
}

/// Deterministic destination-side contract id:
/// `keccak256(originator ‖ beneficiary ‖ hash_lock ‖ timelock ‖ token ‖ amount ‖ nonce)`
/// with integers encoded as 32-byte big-endian words (abi.encodePacked).
///
/// `nonce` disambiguates retries of the same logical funding.
pub fn derive_contract_id(
    originator: Address,
    beneficiary: Address,
    hash_lock: &HashLock,
    timelock: Timestamp,
    token: Address,
    amount: U256,
    nonce: u64,
) -> ContractId {
    let mut packed = Vec::with_capacity(20 + 20 + 32 + 32 + 20 + 32 + 32);
    packed.extend_from_slice(originator.as_slice());
    packed.extend_from_slice(beneficiary.as_slice());
    packed.extend_from_slice(hash_lock.as_bytes());
    packed.extend_from_slice(&U256::from(timelock as u64).to_be_bytes::<32>());
    packed.extend_from_slice(token.as_slice());
    packed.extend_from_slice(&amount.to_be_bytes::<32>());
    packed.extend_from_slice(&U256::from(nonce).to_be_bytes::<32>());
    ContractId::from_bytes(keccak256_bytes(&packed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA256("abc")
        let d = sha256_bytes(b"abc");
        assert_eq!(
            hex::encode(d),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn keccak_known_vector() {
        // keccak256("")
        let d = keccak256_bytes(b"");
        assert_eq!(
            hex::encode(d),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn preimage_verification() {
        let pre = Preimage::from_bytes([7u8; 32]);
        let lock = hash_lock_of(&pre);
        assert!(verify_preimage(&pre, &lock));
        assert!(!verify_preimage(&Preimage::from_bytes([8u8; 32]), &lock));
    }

    #[test]
    fn contract_id_is_deterministic_and_nonce_sensitive() {
        let a = Address::repeat_byte(0x11);
        let b = Address::repeat_byte(0x22);
        let t = Address::repeat_byte(0x33);
        let hl = HashLock::from_bytes([9u8; 32]);

        let id0 = derive_contract_id(a, b, &hl, 1_700_000_000, t, U256::from(5u64), 0);
        let id0_again = derive_contract_id(a, b, &hl, 1_700_000_000, t, U256::from(5u64), 0);
        let id1 = derive_contract_id(a, b, &hl, 1_700_000_000, t, U256::from(5u64), 1);

        assert_eq!(id0, id0_again);
        assert_ne!(id0, id1);
    }
}
