//! poolswap-crypto
//!
//! Hashing, preimage generation, EIP-712 claim digests, signature recovery
//! and the hot wallet used for pool/relayer transaction signing.
//!
//! Hash conventions are deliberately split: hash locks are SHA-256 (the HTLC
//! contracts verify `sha256(preimage)`), while keccak-256 appears only where
//! Ethereum forces it — ABI selectors, EIP-712 and contract-id derivation.

pub mod eip712;
pub mod hash;
pub mod secret;
pub mod wallet;

pub use eip712::{claim_digest, ClaimMessage};
pub use hash::{derive_contract_id, keccak256_bytes, sha256_bytes, verify_preimage};
pub use secret::generate_secret;
pub use wallet::{recover_signer, HotWallet};
