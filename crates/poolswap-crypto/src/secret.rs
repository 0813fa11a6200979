use rand::RngCore;

use poolswap_core::types::{HashLock, Preimage};

use crate::hash::hash_lock_of;

/// Generate a fresh `(preimage, hash_lock)` pair from the OS RNG.
///
/// Called once per swap at creation. The preimage stays inside the
/// coordinator until the user's signed claim carries it on chain.
pub fn generate_secret() -> (Preimage, HashLock) {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let preimage = Preimage::from_bytes(bytes);
    let hash_lock = hash_lock_of(&preimage);
    (preimage, hash_lock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::verify_preimage;

    #[test]
    fn generated_pair_verifies() {
        let (pre, lock) = generate_secret();
        assert!(verify_preimage(&pre, &lock));
    }

    #[test]
    fn secrets_are_unique() {
        let (a, _) = generate_secret();
        let (b, _) = generate_secret();
        assert_ne!(a, b);
    }
}
