//! poolswap-keygen — print a fresh relayer/pool wallet.
//!
//! The secret key is written to stdout once and never stored; pipe it into
//! your secret manager and export it as `POOLSWAP_RELAYER_KEY`.

use poolswap_crypto::HotWallet;
use rand::RngCore;

fn main() {
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    let hex_key = format!("0x{}", hex::encode(secret));

    match HotWallet::from_hex(&hex_key) {
        Ok(wallet) => {
            println!("address: {}", wallet.address());
            println!("secret:  {hex_key}");
        }
        Err(e) => {
            // Astronomically unlikely (key outside the curve order); rerun.
            eprintln!("generated key rejected: {e}; run again");
            std::process::exit(1);
        }
    }
}
