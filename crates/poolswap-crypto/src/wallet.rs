use alloy_primitives::{Address, Signature, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SECP256K1};
use zeroize::Zeroizing;

use poolswap_core::PoolswapError;

use crate::hash::keccak256_bytes;

// ── Signature recovery ───────────────────────────────────────────────────────

/// Recover the signing address from a 65-byte `r ‖ s ‖ v` signature over a
/// 32-byte digest. Accepts `v` as 0/1 or 27/28.
pub fn recover_signer(digest: &B256, signature: &[u8]) -> Result<Address, PoolswapError> {
    if signature.len() != 65 {
        return Err(PoolswapError::Validation(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let v = signature[64];
    let rec_id = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => {
            return Err(PoolswapError::Validation(format!(
                "invalid recovery id {other}"
            )))
        }
    };
    let rec_id = RecoveryId::from_i32(rec_id as i32)
        .map_err(|e| PoolswapError::Validation(format!("invalid recovery id: {e}")))?;
    let sig = RecoverableSignature::from_compact(&signature[..64], rec_id)
        .map_err(|e| PoolswapError::Validation(format!("malformed signature: {e}")))?;
    let msg = Message::from_digest_slice(digest.as_slice())
        .map_err(|e| PoolswapError::Validation(format!("bad digest: {e}")))?;
    let pubkey = SECP256K1
        .recover_ecdsa(&msg, &sig)
        .map_err(|e| PoolswapError::Validation(format!("signature recovery failed: {e}")))?;

    // address = last 20 bytes of keccak256(uncompressed pubkey without the 0x04 tag)
    let hash = keccak256_bytes(&pubkey.serialize_uncompressed()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

// ── HotWallet ────────────────────────────────────────────────────────────────

/// The pool/relayer signing key for one chain.
///
/// Key bytes are wiped from intermediate buffers on load; the wallet never
/// exposes them again.
pub struct HotWallet {
    signer: PrivateKeySigner,
}

impl HotWallet {
    /// Load from a hex-encoded 32-byte secret key (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self, PoolswapError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = Zeroizing::new(
            hex::decode(stripped)
                .map_err(|e| PoolswapError::Validation(format!("invalid key hex: {e}")))?,
        );
        let signer = PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| PoolswapError::Validation(format!("invalid secret key: {e}")))?;
        Ok(Self { signer })
    }

    /// Fresh random wallet. Dev mode and tests only.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a 32-byte digest, returning the structured signature used for
    /// transaction envelopes.
    pub fn sign_hash(&self, digest: &B256) -> Result<Signature, PoolswapError> {
        self.signer
            .sign_hash_sync(digest)
            .map_err(|e| PoolswapError::Other(format!("signing failed: {e}")))
    }

    /// Sign a 32-byte digest, returning 65 raw `r ‖ s ‖ v` bytes.
    pub fn sign_digest(&self, digest: &B256) -> Result<Vec<u8>, PoolswapError> {
        Ok(self.sign_hash(digest)?.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for HotWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HotWallet {{ address: {} }}", self.address())
    }
}
